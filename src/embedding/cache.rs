//! LRU cache in front of an [`EmbeddingProvider`].
//!
//! Keys are the SHA-256 of the input text, so identical queries skip model
//! inference. A capacity of zero disables caching.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

/// Entries stamped with a monotonically increasing tick. `by_tick` orders keys
/// by last use, so the first entry is always the eviction candidate.
#[derive(Default)]
struct Lru {
    entries: HashMap<String, (u64, Vec<f32>)>,
    by_tick: BTreeMap<u64, String>,
    tick: u64,
}

impl Lru {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, key: &str) -> Option<Vec<f32>> {
        let tick = self.next_tick();
        let (stamp, embedding) = self.entries.get_mut(key)?;
        let previous = std::mem::replace(stamp, tick);
        let hit = embedding.clone();
        if let Some(k) = self.by_tick.remove(&previous) {
            self.by_tick.insert(tick, k);
        }
        Some(hit)
    }

    fn put(&mut self, key: String, embedding: &[f32], capacity: usize) {
        if self.get(&key).is_some() {
            return;
        }
        while self.entries.len() >= capacity {
            let Some((_, oldest)) = self.by_tick.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
        let tick = self.next_tick();
        self.by_tick.insert(tick, key.clone());
        self.entries.insert(key, (tick, embedding.to_vec()));
    }
}

pub struct CachedEmbeddingProvider<P> {
    inner: P,
    capacity: usize,
    lru: Mutex<Lru>,
}

impl<P: EmbeddingProvider> CachedEmbeddingProvider<P> {
    pub fn new(inner: P, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            lru: Mutex::default(),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Lru>> {
        self.lru
            .lock()
            .map_err(|e| anyhow!("embedding cache lock poisoned: {e}"))
    }

    fn lookup(&self, key: &str) -> Option<Vec<f32>> {
        // A poisoned cache only costs a recomputation.
        self.lock().ok()?.get(key)
    }

    fn remember(&self, key: String, embedding: &[f32]) {
        if let Ok(mut lru) = self.lock() {
            lru.put(key, embedding, self.capacity);
        }
    }
}

/// Hex SHA-256 of the text, used as the cache key.
pub fn cache_key(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

impl<P: EmbeddingProvider> EmbeddingProvider for CachedEmbeddingProvider<P> {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.capacity == 0 {
            return self.inner.embed(text);
        }
        let key = cache_key(text);
        if let Some(hit) = self.lookup(&key) {
            tracing::trace!(key = %&key[..12], "embedding cache hit");
            return Ok(hit);
        }
        let embedding = self.inner.embed(text)?;
        self.remember(key, &embedding);
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if self.capacity == 0 {
            return self.inner.embed_batch(texts);
        }
        let keys: Vec<String> = texts.iter().map(|t| cache_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = keys.iter().map(|k| self.lookup(k)).collect();

        let misses: Vec<usize> = (0..texts.len()).filter(|&i| results[i].is_none()).collect();
        if !misses.is_empty() {
            let batch: Vec<&str> = misses.iter().map(|&i| texts[i]).collect();
            let computed = self.inner.embed_batch(&batch)?;
            anyhow::ensure!(
                computed.len() == batch.len(),
                "provider returned {} embeddings for {} inputs",
                computed.len(),
                batch.len()
            );
            for (&i, embedding) in misses.iter().zip(computed) {
                self.remember(keys[i].clone(), &embedding);
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
