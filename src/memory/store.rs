//! The persistence contract consumed by [`MemoryService`](super::service::MemoryService).
//!
//! A backend provides keyed record storage plus a nearest-neighbor primitive.
//! No method filters by supersession state; visibility rules belong to the
//! service.

use anyhow::Result;

use super::types::{ListPage, ListQuery, Memory, Neighbor};

/// Durable keyed storage for memory records and their vectors.
///
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`. Each method is individually atomic with
/// respect to concurrent readers.
pub trait MemoryStore: Send + Sync {
    /// Write a new record and its vector association. The ID must be unused.
    fn insert(&self, memory: &Memory) -> Result<()>;

    /// Point lookup, including the embedding. Returns live, superseded, and
    /// tombstoned records alike.
    fn find_by_id(&self, id: &str) -> Result<Option<Memory>>;

    /// Set `superseded_by` to the tombstone and refresh `updated_at`.
    ///
    /// Returns `false` if `id` does not exist. Idempotent: deleting an already
    /// tombstoned record returns `true`.
    fn mark_deleted(&self, id: &str) -> Result<bool>;

    /// Up to `k` nearest stored vectors, ascending by distance.
    fn find_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Insert `memory` and point `old_id` at it, as one atomic write.
    ///
    /// Only a live `old_id` is replaced. Returns `false` (and writes nothing)
    /// if `old_id` is missing or no longer live.
    fn insert_superseding(&self, memory: &Memory, old_id: &str) -> Result<bool>;

    /// Page through records matching `query.filter` in `query.order`.
    ///
    /// Any `limit` and `offset` are accepted; neither may overflow.
    fn list(&self, query: &ListQuery) -> Result<ListPage>;
}
