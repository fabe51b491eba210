use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateMemoryParams {
    #[schemars(description = "ID of the current memory to replace")]
    pub id: String,

    #[schemars(description = "Replacement content. The old memory is kept and points at the new one.")]
    pub content: String,

    #[schemars(description = "Metadata for the new version. Not merged with the old metadata.")]
    pub metadata: Option<serde_json::Value>,
}
