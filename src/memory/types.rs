//! Core memory type definitions.
//!
//! Defines [`Memory`] (a full record), [`Supersession`] (where a non-current
//! memory's chain pointer leads), and the request/response shapes used by
//! listing and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open metadata mapping attached to a memory. No required keys.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Sentinel stored in `superseded_by` for a logically deleted memory.
///
/// Identifiers are UUIDs, so this value can never collide with one.
pub const TOMBSTONE: &str = "forgotten";

/// Non-null state of a memory's `superseded_by` pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Supersession {
    /// The memory was deleted.
    Tombstone,
    /// The memory was replaced by the memory with this ID.
    Memory(String),
}

impl Supersession {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Tombstone => TOMBSTONE,
            Self::Memory(id) => id,
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

impl From<String> for Supersession {
    fn from(s: String) -> Self {
        if s == TOMBSTONE {
            Self::Tombstone
        } else {
            Self::Memory(s)
        }
    }
}

impl From<Supersession> for String {
    fn from(s: Supersession) -> Self {
        match s {
            Supersession::Tombstone => TOMBSTONE.to_string(),
            Supersession::Memory(id) => id,
        }
    }
}

impl std::fmt::Display for Supersession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A memory record, matching the `memories` table plus its vector row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// The full text content. Never empty, never mutated after creation.
    pub content: String,
    /// Arbitrary JSON metadata.
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    /// Equal to `created_at` until the record is deleted or superseded.
    pub updated_at: DateTime<Utc>,
    /// `None` while this memory is live and current.
    pub superseded_by: Option<Supersession>,
    /// Vector derived from `content` at creation time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl Memory {
    /// Build a fresh, live memory with a new UUID v7 and `created_at == updated_at == now`.
    pub fn new(content: impl Into<String>, metadata: Metadata, embedding: Vec<f32>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            content: content.into(),
            metadata,
            created_at: now,
            updated_at: now,
            superseded_by: None,
            embedding,
        }
    }

    /// `true` if this memory is the current version (not superseded, not deleted).
    pub fn is_live(&self) -> bool {
        self.superseded_by.is_none()
    }

    pub fn is_tombstoned(&self) -> bool {
        self.superseded_by
            .as_ref()
            .is_some_and(Supersession::is_tombstone)
    }

    /// Drop the embedding, e.g. before handing a record to a caller that only needs text.
    pub fn without_embedding(mut self) -> Self {
        self.embedding = Vec::new();
        self
    }
}

/// One nearest-neighbor hit: a memory ID and its distance to the query (smaller = closer).
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub distance: f64,
}

/// Metadata key holding a memory's tags: a JSON array of strings, or a single string.
pub const TAGS_KEY: &str = "tags";

/// Narrows search and list results. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryFilter {
    /// Match memories carrying at least one of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Inclusive lower bound on `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_after: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_before: Option<DateTime<Utc>>,
}

impl MemoryFilter {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.created_after.is_none() && self.created_before.is_none()
    }

    pub fn matches(&self, memory: &Memory) -> bool {
        if self.created_after.is_some_and(|start| memory.created_at < start) {
            return false;
        }
        if self.created_before.is_some_and(|end| memory.created_at > end) {
            return false;
        }
        self.tags.is_empty() || memory_tags(memory).any(|tag| self.tags.iter().any(|t| t == tag))
    }
}

/// String tags found under [`TAGS_KEY`]. Non-string entries are ignored.
pub fn memory_tags(memory: &Memory) -> impl Iterator<Item = &str> {
    let values: &[serde_json::Value] = match memory.metadata.get(TAGS_KEY) {
        Some(serde_json::Value::Array(items)) => items,
        Some(single @ serde_json::Value::String(_)) => std::slice::from_ref(single),
        _ => &[],
    };
    values.iter().filter_map(serde_json::Value::as_str)
}

/// Order of listed memories by `created_at`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Paging options for [`MemoryStore::list`](crate::memory::store::MemoryStore::list).
#[derive(Debug, Clone)]
pub struct ListQuery {
    pub limit: usize,
    pub offset: usize,
    /// Also return superseded and tombstoned records.
    pub include_inactive: bool,
    pub order: SortOrder,
    pub filter: MemoryFilter,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            include_inactive: false,
            order: SortOrder::default(),
            filter: MemoryFilter::default(),
        }
    }
}

/// A page of listed memories in the requested order.
#[derive(Debug, Serialize)]
pub struct ListPage {
    pub memories: Vec<Memory>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supersession_round_trips_through_string() {
        assert_eq!(Supersession::from(TOMBSTONE.to_string()), Supersession::Tombstone);
        assert_eq!(
            Supersession::from("0190-abc".to_string()),
            Supersession::Memory("0190-abc".into())
        );
        assert_eq!(String::from(Supersession::Tombstone), "forgotten");
    }

    #[test]
    fn new_memory_is_live_with_equal_timestamps() {
        let m = Memory::new("hello", Metadata::new(), vec![1.0, 0.0]);
        assert!(m.is_live());
        assert!(!m.is_tombstoned());
        assert_eq!(m.created_at, m.updated_at);
        assert!(uuid::Uuid::parse_str(&m.id).is_ok());
    }

    #[test]
    fn serializes_superseded_by_as_plain_string() {
        let mut m = Memory::new("x", Metadata::new(), vec![]);
        m.superseded_by = Some(Supersession::Tombstone);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["superseded_by"], "forgotten");
        assert!(json.get("embedding").is_none());

        m.superseded_by = None;
        let json = serde_json::to_value(&m).unwrap();
        assert!(json["superseded_by"].is_null());
    }

    fn tagged(tags: serde_json::Value) -> Memory {
        let mut metadata = Metadata::new();
        metadata.insert(TAGS_KEY.into(), tags);
        Memory::new("tagged", metadata, vec![])
    }

    #[test]
    fn tag_filter_matches_any_tag() {
        let filter = MemoryFilter {
            tags: vec!["rust".into(), "db".into()],
            ..Default::default()
        };
        assert!(filter.matches(&tagged(serde_json::json!(["python", "db"]))));
        assert!(filter.matches(&tagged(serde_json::json!("rust"))));
        assert!(!filter.matches(&tagged(serde_json::json!(["python"]))));
        assert!(!filter.matches(&tagged(serde_json::json!(42))));
        assert!(!filter.matches(&Memory::new("untagged", Metadata::new(), vec![])));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let m = Memory::new("dated", Metadata::new(), vec![]);
        let exact = MemoryFilter {
            created_after: Some(m.created_at),
            created_before: Some(m.created_at),
            ..Default::default()
        };
        assert!(exact.matches(&m));

        let later = MemoryFilter {
            created_after: Some(m.created_at + chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!later.matches(&m));

        let earlier = MemoryFilter {
            created_before: Some(m.created_at - chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!earlier.matches(&m));
        assert!(MemoryFilter::default().matches(&m));
        assert!(MemoryFilter::default().is_empty());
    }

    #[test]
    fn filter_deserializes_rfc3339_bounds() {
        let filter: MemoryFilter = serde_json::from_value(serde_json::json!({
            "tags": ["a"],
            "created_after": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(filter.tags, vec!["a".to_string()]);
        assert!(filter.created_after.is_some());
        assert!(filter.created_before.is_none());
    }
}
