use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::types::MemoryFilter;

/// Optional narrowing shared by `search_memory` and `list_memories`.
#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct FilterParams {
    #[schemars(description = "Keep memories whose metadata.tags contains any of these")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Earliest created_at, inclusive. RFC 3339 or YYYY-MM-DD.")]
    pub start: Option<String>,

    #[schemars(description = "Latest created_at, inclusive. RFC 3339 or YYYY-MM-DD (whole day).")]
    pub end: Option<String>,
}

impl FilterParams {
    pub fn into_filter(self) -> Result<MemoryFilter, String> {
        let created_after = self
            .start
            .as_deref()
            .map(|s| parse_bound(s, NaiveTime::MIN))
            .transpose()?;
        let created_before = self
            .end
            .as_deref()
            .map(|s| parse_bound(s, end_of_day()))
            .transpose()?;
        if let (Some(start), Some(end)) = (created_after, created_before) {
            if start > end {
                return Err(format!("filter start {start} is after end {end}"));
            }
        }
        Ok(MemoryFilter {
            tags: self.tags.unwrap_or_default(),
            created_after,
            created_before,
        })
    }
}

/// `None` becomes the empty filter.
pub fn resolve_filter(params: Option<FilterParams>) -> Result<MemoryFilter, String> {
    params.map_or_else(|| Ok(MemoryFilter::default()), FilterParams::into_filter)
}

/// A bare date is pinned to `time_of_day` in UTC.
fn parse_bound(s: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(time_of_day).and_utc())
        .map_err(|_| format!("invalid date {s:?}, expected RFC 3339 or YYYY-MM-DD"))
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}
