//! Memory lifecycle and retrieval.
//!
//! [`MemoryService`] ties an [`EmbeddingProvider`] to a [`MemoryStore`] and
//! implements the visibility rules the store leaves out: search answers only
//! with live chain heads, each at most once, in order of their closest
//! matching candidate.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::chain::{follow_chain, ChainEnd};
use super::error::MemoryError;
use super::store::MemoryStore;
use super::types::{ListPage, ListQuery, Memory, MemoryFilter, Metadata};
use crate::embedding::EmbeddingProvider;

/// Results returned by [`MemoryService::search`] when the caller has no preference.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Nearest-neighbor candidates requested per wanted result.
pub const DEFAULT_OVERFETCH_FACTOR: usize = 3;

const MIN_OVERFETCH_FACTOR: usize = 2;

type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Clone)]
pub struct MemoryService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn MemoryStore>,
    overfetch_factor: usize,
}

impl MemoryService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn MemoryStore>) -> Self {
        Self {
            embedder,
            store,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
        }
    }

    /// Values below 2 are raised to 2.
    pub fn with_overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor.max(MIN_OVERFETCH_FACTOR);
        self
    }

    pub fn overfetch_factor(&self) -> usize {
        self.overfetch_factor
    }

    /// Embed and persist a new live memory, returning it with its embedding.
    pub fn store(&self, content: &str, metadata: Metadata) -> Result<Memory> {
        validate_content(content)?;
        let embedding = self.embed(content)?;
        let memory = Memory::new(content, metadata, embedding);
        self.store.insert(&memory).map_err(MemoryError::Storage)?;
        info!(id = %memory.id, len = content.len(), "memory stored");
        Ok(memory)
    }

    /// Exact lookup. Superseded and tombstoned records are returned as stored.
    pub fn get(&self, id: &str) -> Result<Option<Memory>> {
        self.store.find_by_id(id).map_err(MemoryError::Storage)
    }

    /// Soft-delete. `false` means no such memory.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.store.mark_deleted(id).map_err(MemoryError::Storage)?;
        if deleted {
            info!(id = %id, "memory forgotten");
        } else {
            debug!(id = %id, "delete of unknown memory");
        }
        Ok(deleted)
    }

    /// Up to `limit` live memories, most similar first, no ID repeated.
    ///
    /// Candidates come from the vector index over every stored embedding,
    /// including superseded ones. Each candidate is resolved to the live head
    /// of its chain; candidates whose chain ends in a tombstone, a missing
    /// record or a cycle are dropped.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Memory>> {
        self.search_filtered(query, limit, &MemoryFilter::default())
    }

    /// [`search`](Self::search) restricted to heads matching `filter`.
    ///
    /// The filter sees the resolved head, not the candidate that led to it,
    /// and rejected heads do not count toward `limit`.
    pub fn search_filtered(
        &self,
        query: &str,
        limit: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<Memory>> {
        if query.trim().is_empty() {
            return Err(MemoryError::validation("query must not be empty"));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embed(query)?;
        let k = limit.saturating_mul(self.overfetch_factor);
        let candidates = self
            .store
            .find_similar(&embedding, k)
            .map_err(MemoryError::Storage)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(limit.min(candidates.len()));

        for candidate in &candidates {
            if results.len() >= limit {
                break;
            }
            let Some(head) = self.resolve_candidate(&candidate.id)? else {
                continue;
            };
            if !filter.matches(&head) {
                debug!(candidate = %candidate.id, head = %head.id, "head filtered out");
                continue;
            }
            if seen.insert(head.id.clone()) {
                debug!(candidate = %candidate.id, head = %head.id, distance = candidate.distance, "search hit");
                results.push(head);
            } else {
                debug!(candidate = %candidate.id, head = %head.id, "duplicate head skipped");
            }
        }

        debug!(
            limit,
            candidates = candidates.len(),
            returned = results.len(),
            "search complete"
        );
        Ok(results)
    }

    /// Replace a live memory with new content, linking the old record to the new one.
    ///
    /// Returns `None` if `id` does not exist. A superseded or deleted target is
    /// a validation error, as is losing a race with another writer.
    pub fn update(&self, id: &str, content: &str, metadata: Metadata) -> Result<Option<Memory>> {
        validate_content(content)?;
        let Some(old) = self.get(id)? else {
            return Ok(None);
        };
        if let Some(pointer) = &old.superseded_by {
            return Err(MemoryError::validation(format!(
                "memory {id} is not current (superseded_by = {pointer})"
            )));
        }

        let embedding = self.embed(content)?;
        let memory = Memory::new(content, metadata, embedding);
        let replaced = self
            .store
            .insert_superseding(&memory, id)
            .map_err(MemoryError::Storage)?;
        if !replaced {
            return Err(MemoryError::validation(format!(
                "memory {id} was superseded or deleted concurrently"
            )));
        }

        info!(old = %id, new = %memory.id, "memory superseded");
        Ok(Some(memory))
    }

    pub fn list(&self, query: &ListQuery) -> Result<ListPage> {
        self.store.list(query).map_err(MemoryError::Storage)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(text).map_err(MemoryError::Provider)?;
        let expected = self.embedder.dimensions();
        if embedding.len() != expected {
            return Err(MemoryError::Provider(anyhow::anyhow!(
                "embedding has {} dimensions, expected {expected}",
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    /// The live memory a search candidate stands for, if any.
    fn resolve_candidate(&self, id: &str) -> Result<Option<Memory>> {
        let Some(record) = self.get(id)? else {
            warn!(candidate = %id, "index returned an id with no record");
            return Ok(None);
        };
        if record.is_live() {
            return Ok(Some(record));
        }

        match follow_chain(self.store.as_ref(), record).map_err(MemoryError::Storage)? {
            ChainEnd::Head(head) => Ok(Some(head)),
            ChainEnd::Deleted => Ok(None),
            ChainEnd::Dangling { missing } => {
                warn!(candidate = %id, missing = %missing, "dangling supersession pointer, candidate dropped");
                Ok(None)
            }
            ChainEnd::Cycle { at } => {
                warn!(candidate = %id, at = %at, "supersession cycle, candidate dropped");
                Ok(None)
            }
        }
    }
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(MemoryError::validation("content must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::backend::in_memory::InMemoryStore;
    use crate::memory::types::Supersession;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Looks texts up in a table, falling back to a fixed vector. Counts calls.
    struct TableEmbedder {
        table: HashMap<String, Vec<f32>>,
        fallback: Vec<f32>,
        calls: AtomicUsize,
    }

    impl TableEmbedder {
        fn new(entries: &[(&str, [f32; 2])]) -> Self {
            Self {
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_vec()))
                    .collect(),
                fallback: vec![0.0, 0.0],
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl EmbeddingProvider for TableEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.get(text).cloned().unwrap_or_else(|| self.fallback.clone()))
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "table"
        }
    }

    struct BrokenEmbedder {
        output: Option<Vec<f32>>,
    }

    impl EmbeddingProvider for BrokenEmbedder {
        fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            self.output
                .clone()
                .ok_or_else(|| anyhow::anyhow!("model unavailable"))
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    struct Fixture {
        service: MemoryService,
        store: Arc<InMemoryStore>,
        embedder: Arc<TableEmbedder>,
    }

    fn fixture(entries: &[(&str, [f32; 2])]) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(TableEmbedder::new(entries));
        let service = MemoryService::new(embedder.clone(), store.clone());
        Fixture {
            service,
            store,
            embedder,
        }
    }

    impl Fixture {
        /// Insert a record with a chosen embedding, bypassing the embedder.
        fn put(&self, content: &str, embedding: [f32; 2]) -> Memory {
            let m = Memory::new(content, Metadata::new(), embedding.to_vec());
            self.store.insert(&m).unwrap();
            m
        }

        fn put_tagged(&self, content: &str, embedding: [f32; 2], tag: &str) -> Memory {
            let mut metadata = Metadata::new();
            metadata.insert("tags".into(), serde_json::json!([tag]));
            let m = Memory::new(content, metadata, embedding.to_vec());
            self.store.insert(&m).unwrap();
            m
        }

        fn link(&self, from: &Memory, to: &Memory) {
            self.store
                .set_superseded_by(&from.id, Some(Supersession::Memory(to.id.clone())))
                .unwrap();
        }

        fn search_ids(&self, query: &str, limit: usize) -> Vec<String> {
            self.service
                .search(query, limit)
                .unwrap()
                .into_iter()
                .map(|m| m.id)
                .collect()
        }

        fn embed_calls(&self) -> usize {
            self.embedder.calls.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn store_then_get_round_trips() {
        let f = fixture(&[("hello", [1.0, 0.0])]);
        let mut meta = Metadata::new();
        meta.insert("source".into(), serde_json::json!("test"));

        let stored = f.service.store("hello", meta.clone()).unwrap();
        assert_eq!(stored.embedding, vec![1.0, 0.0]);
        assert!(stored.is_live());
        assert_eq!(stored.created_at, stored.updated_at);

        let got = f.service.get(&stored.id).unwrap().unwrap();
        assert_eq!(got.content, "hello");
        assert_eq!(got.metadata, meta);
        assert_eq!(got.embedding.len(), 2);
    }

    #[test]
    fn empty_content_is_rejected_without_side_effects() {
        let f = fixture(&[]);
        for content in ["", "   \n\t"] {
            let err = f.service.store(content, Metadata::new()).unwrap_err();
            assert!(matches!(err, MemoryError::Validation(_)));
        }
        assert_eq!(f.embed_calls(), 0);
        assert!(f.store.is_empty().unwrap());
    }

    #[test]
    fn provider_failure_propagates_and_stores_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let service = MemoryService::new(Arc::new(BrokenEmbedder { output: None }), store.clone());

        assert!(matches!(
            service.store("text", Metadata::new()),
            Err(MemoryError::Provider(_))
        ));
        assert!(matches!(service.search("text", 5), Err(MemoryError::Provider(_))));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn wrong_dimension_embedding_is_a_provider_failure() {
        let store = Arc::new(InMemoryStore::new());
        let embedder = BrokenEmbedder {
            output: Some(vec![1.0, 2.0, 3.0]),
        };
        let service = MemoryService::new(Arc::new(embedder), store.clone());

        let err = service.store("text", Metadata::new()).unwrap_err();
        assert!(err.to_string().contains("3 dimensions, expected 2"));
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn get_does_not_follow_chain() {
        let f = fixture(&[]);
        let a = f.put("old", [1.0, 0.0]);
        let b = f.put("new", [0.0, 1.0]);
        f.link(&a, &b);

        let got = f.service.get(&a.id).unwrap().unwrap();
        assert_eq!(got.content, "old");
        assert_eq!(got.superseded_by, Some(Supersession::Memory(b.id)));
        assert!(f.service.get("missing").unwrap().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let f = fixture(&[]);
        let m = f.service.store("forget me", Metadata::new()).unwrap();

        assert!(f.service.delete(&m.id).unwrap());
        assert!(f.service.delete(&m.id).unwrap());
        assert!(!f.service.delete("no-such-id").unwrap());

        let got = f.service.get(&m.id).unwrap().unwrap();
        assert_eq!(got.superseded_by, Some(Supersession::Tombstone));
    }

    #[test]
    fn deleted_memory_is_excluded_from_search() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let a = f.put("target", [1.0, 0.0]);
        let b = f.put("other", [0.6, 0.8]);
        f.service.delete(&a.id).unwrap();

        assert_eq!(f.search_ids("q", 10), vec![b.id]);
    }

    #[test]
    fn superseded_match_resolves_to_head_once() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let a = f.put("v1", [1.0, 0.0]);
        let b = f.put("v2", [0.9, 0.1]);
        f.link(&a, &b);

        assert_eq!(f.search_ids("q", 10), vec![b.id]);
    }

    #[test]
    fn chain_to_tombstone_is_omitted() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let a = f.put("v1", [1.0, 0.0]);
        let other = f.put("unrelated", [0.0, 1.0]);
        f.store
            .set_superseded_by(&a.id, Some(Supersession::Tombstone))
            .unwrap();

        assert_eq!(f.search_ids("q", 10), vec![other.id]);
    }

    #[test]
    fn multi_hop_head_ranks_at_closest_candidate() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let x = f.put("closest standalone", [1.0, 0.0]);
        let a = f.put("v1", [0.99, 0.14]);
        let y = f.put("middle standalone", [0.9, 0.43]);
        let b = f.put("v2", [0.8, 0.6]);
        let c = f.put("v3", [-1.0, 0.0]);
        f.link(&a, &b);
        f.link(&b, &c);

        // c itself is far, but a (via the chain) is second closest.
        assert_eq!(f.search_ids("q", 10), vec![x.id, c.id, y.id]);
    }

    #[test]
    fn broken_chains_are_absorbed() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let dangling = f.put("dangling", [1.0, 0.0]);
        let looped_a = f.put("loop a", [0.99, 0.1]);
        let looped_b = f.put("loop b", [0.98, 0.2]);
        let ok = f.put("fine", [0.0, 1.0]);
        f.store
            .set_superseded_by(&dangling.id, Some(Supersession::Memory("ghost".into())))
            .unwrap();
        f.link(&looped_a, &looped_b);
        f.link(&looped_b, &looped_a);

        assert_eq!(f.search_ids("q", 10), vec![ok.id]);
    }

    #[test]
    fn limit_is_respected() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        for i in 0..5 {
            f.put(&format!("m{i}"), [1.0, i as f32]);
        }
        assert_eq!(f.search_ids("q", 2).len(), 2);
    }

    #[test]
    fn overfetch_fills_results_past_filtered_candidates() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let deleted = f.put("deleted", [1.0, 0.0]);
        f.service.delete(&deleted.id).unwrap();
        let live = f.put("live", [0.0, 1.0]);

        // limit 1 asks the index for 3 candidates, so the live memory is still reached.
        assert_eq!(f.search_ids("q", 1), vec![live.id]);
    }

    fn tag_filter(tag: &str) -> MemoryFilter {
        MemoryFilter {
            tags: vec![tag.into()],
            ..Default::default()
        }
    }

    #[test]
    fn filtered_out_heads_do_not_use_limit_slots() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        f.put_tagged("closest, wrong tag", [1.0, 0.0], "home");
        f.put("close, untagged", [0.95, 0.3]);
        let wanted = f.put_tagged("farther, right tag", [0.8, 0.6], "work");

        let results = f.service.search_filtered("q", 1, &tag_filter("work")).unwrap();
        let ids: Vec<_> = results.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![wanted.id]);
    }

    #[test]
    fn filter_applies_to_the_head_not_the_candidate() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let old = f.put_tagged("tagged v1", [1.0, 0.0], "work");
        let head = f.put("untagged v2", [0.0, 1.0]);
        f.link(&old, &head);
        let other = f.put_tagged("tagged standalone", [0.6, 0.8], "work");

        let results = f.service.search_filtered("q", 10, &tag_filter("work")).unwrap();
        let ids: Vec<_> = results.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![other.id.clone()]);

        // Without a filter the chain head is found through v1.
        assert_eq!(f.search_ids("q", 10), vec![head.id, other.id]);
    }

    #[test]
    fn date_filter_narrows_search() {
        let f = fixture(&[("q", [1.0, 0.0])]);
        let mut old = Memory::new("last year", Metadata::new(), vec![1.0, 0.0]);
        old.created_at -= chrono::Duration::days(365);
        f.store.insert(&old).unwrap();
        let recent = f.put("this week", [0.6, 0.8]);

        let filter = MemoryFilter {
            created_after: Some(recent.created_at - chrono::Duration::days(7)),
            ..Default::default()
        };
        let results = f.service.search_filtered("q", 10, &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, recent.id);
    }

    #[test]
    fn list_accepts_unbounded_limit() {
        let f = fixture(&[]);
        for i in 0..3 {
            f.put(&format!("m{i}"), [i as f32, 1.0]);
        }
        let page = f
            .service
            .list(&ListQuery {
                limit: usize::MAX,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.memories.len(), 3);
        assert!(!page.has_more);
    }

    #[test]
    fn empty_store_search_is_empty() {
        let f = fixture(&[]);
        assert!(f.service.search("anything", 10).unwrap().is_empty());
    }

    #[test]
    fn empty_query_and_zero_limit_skip_the_embedder() {
        let f = fixture(&[]);
        f.put("m", [1.0, 0.0]);

        assert!(matches!(
            f.service.search("  ", 10),
            Err(MemoryError::Validation(_))
        ));
        assert!(f.service.search("q", 0).unwrap().is_empty());
        assert_eq!(f.embed_calls(), 0);
    }

    #[test]
    fn update_builds_a_chain() {
        let f = fixture(&[("v1", [1.0, 0.0]), ("v2", [0.0, 1.0])]);
        let old = f.service.store("v1", Metadata::new()).unwrap();

        let new = f
            .service
            .update(&old.id, "v2", Metadata::new())
            .unwrap()
            .unwrap();
        assert_ne!(new.id, old.id);
        assert!(new.is_live());

        let old_now = f.service.get(&old.id).unwrap().unwrap();
        assert_eq!(old_now.content, "v1");
        assert_eq!(old_now.embedding, vec![1.0, 0.0]);
        assert_eq!(old_now.superseded_by, Some(Supersession::Memory(new.id.clone())));

        // The old phrasing still finds the current version.
        assert_eq!(f.search_ids("v1", 10), vec![new.id]);
    }

    #[test]
    fn update_rejects_non_current_and_reports_missing() {
        let f = fixture(&[]);
        let m = f.service.store("v1", Metadata::new()).unwrap();
        f.service.update(&m.id, "v2", Metadata::new()).unwrap();

        assert!(matches!(
            f.service.update(&m.id, "v3", Metadata::new()),
            Err(MemoryError::Validation(_))
        ));
        assert!(f
            .service
            .update("missing", "v3", Metadata::new())
            .unwrap()
            .is_none());
        assert!(matches!(
            f.service.update(&m.id, "", Metadata::new()),
            Err(MemoryError::Validation(_))
        ));
    }

    #[test]
    fn list_hides_superseded_by_default() {
        let f = fixture(&[]);
        let m = f.service.store("v1", Metadata::new()).unwrap();
        let newer = f.service.update(&m.id, "v2", Metadata::new()).unwrap().unwrap();

        let page = f.service.list(&ListQuery::default()).unwrap();
        let ids: Vec<_> = page.memories.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![newer.id]);
        assert!(!page.has_more);

        let all = f
            .service
            .list(&ListQuery {
                include_inactive: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.memories.len(), 2);
    }

    #[test]
    fn overfetch_factor_has_a_floor() {
        let f = fixture(&[]);
        assert_eq!(f.service.clone().with_overfetch_factor(1).overfetch_factor(), 2);
        assert_eq!(f.service.clone().with_overfetch_factor(5).overfetch_factor(), 5);
    }
}
