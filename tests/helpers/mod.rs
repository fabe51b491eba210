#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memvault::embedding::{l2_normalize, EmbeddingProvider};
use memvault::memory::backend::{InMemoryStore, SqliteStore};
use memvault::memory::{Memory, MemoryService, Metadata};

/// Dimension used by the SQLite-backed tests; matches all-MiniLM-L6-v2.
pub const DIM: usize = 384;

/// Generate a deterministic embedding with a spike at position `seed`.
/// Distinct seeds give orthogonal vectors.
pub fn test_embedding(seed: usize) -> Vec<f32> {
    vector(&[(seed % DIM, 1.0)])
}

/// A `DIM`-length vector with the given sparse entries.
pub fn vector(entries: &[(usize, f32)]) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    for &(i, x) in entries {
        v[i] = x;
    }
    v
}

/// Embedder that returns preset vectors for known texts and a spike derived
/// from the text length otherwise. Counts calls.
pub struct FixedEmbedder {
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), embedding);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for FixedEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .table
            .get(text)
            .cloned()
            .unwrap_or_else(|| test_embedding(text.len())))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Bag-of-concepts embedder: each known word adds weight to its concept's
/// dimension, unknown words to a shared "other" dimension. Good enough to
/// make topical queries land near topical memories.
pub struct ConceptEmbedder;

const CONCEPTS: &[&[&str]] = &[
    &[
        "python", "javascript", "programming", "language", "languages", "code", "coding",
        "software", "development", "developer", "browser", "browsers", "web", "rust",
    ],
    &["cat", "cats", "dog", "dogs", "furry", "animal", "animals", "pet", "pets"],
    &["coffee", "tea", "breakfast", "food", "cooking", "recipe"],
    &["memory", "memories", "remember", "recall"],
];
const OTHER: usize = 8;

impl EmbeddingProvider for ConceptEmbedder {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIM];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let slot = CONCEPTS
                .iter()
                .position(|words| words.contains(&word))
                .unwrap_or(OTHER);
            v[slot] += 1.0;
        }
        // A per-text spike keeps distinct texts distinct.
        v[16 + text.len() % (DIM - 16)] += 0.1;
        Ok(l2_normalize(&v))
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn model_name(&self) -> &str {
        "concepts"
    }
}

pub fn sqlite_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory(DIM, "test-model").unwrap())
}

pub fn sqlite_service(embedder: impl EmbeddingProvider + 'static) -> (MemoryService, Arc<SqliteStore>) {
    let store = sqlite_store();
    (MemoryService::new(Arc::new(embedder), store.clone()), store)
}

pub fn in_memory_service(
    embedder: impl EmbeddingProvider + 'static,
) -> (MemoryService, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (MemoryService::new(Arc::new(embedder), store.clone()), store)
}

pub fn memory_with(content: &str, embedding: Vec<f32>) -> Memory {
    Memory::new(content, Metadata::new(), embedding)
}

pub fn ids(memories: &[Memory]) -> Vec<String> {
    memories.iter().map(|m| m.id.clone()).collect()
}
