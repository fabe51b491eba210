use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetMemoryParams {
    #[schemars(description = "ID of the memory to fetch. Superseded memories are returned as stored.")]
    pub id: String,
}
