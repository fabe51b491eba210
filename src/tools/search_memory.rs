use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::filters::FilterParams;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchMemoryParams {
    #[schemars(description = "Natural language query")]
    pub query: String,

    #[schemars(description = "Maximum number of results. Defaults to the configured default (10).")]
    pub limit: Option<usize>,

    #[schemars(description = "Only return memories matching these tags and dates")]
    pub filters: Option<FilterParams>,
}
