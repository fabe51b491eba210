use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::filters::FilterParams;
use crate::memory::types::SortOrder;

pub const DEFAULT_LIST_LIMIT: usize = 50;
pub const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    #[schemars(description = "Page size, 1-500 (default: 50)")]
    pub limit: Option<usize>,

    #[schemars(description = "Number of memories to skip (default: 0)")]
    pub offset: Option<usize>,

    #[schemars(description = "Include superseded and deleted memories (default: false)")]
    pub include_inactive: Option<bool>,

    #[schemars(description = "newest_first (default) or oldest_first")]
    pub order: Option<SortOrder>,

    #[schemars(description = "Only return memories matching these tags and dates")]
    pub filters: Option<FilterParams>,
}
