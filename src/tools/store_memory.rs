use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::Metadata;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct StoreMemoryParams {
    #[schemars(description = "The text content of the memory. Must not be empty.")]
    pub content: String,

    #[schemars(description = "Optional JSON object of arbitrary metadata (tags, source, ...)")]
    pub metadata: Option<serde_json::Value>,
}

/// Accept a missing or null value as empty metadata; anything else must be an object.
pub fn into_metadata(value: Option<serde_json::Value>) -> Result<Metadata, String> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Metadata::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(other) => Err(format!("metadata must be a JSON object, got {other}")),
    }
}
