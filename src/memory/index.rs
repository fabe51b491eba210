//! Pluggable nearest-neighbor index used by the in-memory backend.
//!
//! [`FlatIndex`] computes exact L2 distances against every stored vector,
//! the same metric sqlite-vec's `vec0` uses by default.

use std::sync::RwLock;

use anyhow::{anyhow, ensure, Result};

use super::types::Neighbor;

/// Stores `(id, vector)` pairs and answers k-nearest queries.
pub trait VectorIndex: Send + Sync {
    fn insert(&self, id: &str, embedding: &[f32]) -> Result<()>;

    /// Up to `k` nearest vectors ascending by distance. Empty on an empty index.
    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// Exact brute-force index over an in-memory list.
#[derive(Default)]
pub struct FlatIndex {
    dimension: Option<usize>,
    entries: RwLock<Vec<(String, Vec<f32>)>>,
}

impl FlatIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// An index that rejects vectors of any other dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            entries: RwLock::default(),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn insert(&self, id: &str, embedding: &[f32]) -> Result<()> {
        if let Some(dim) = self.dimension {
            ensure!(
                embedding.len() == dim,
                "vector for {id} has {} dimensions, index expects {dim}",
                embedding.len()
            );
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|e| anyhow!("index lock poisoned: {e}"))?;
        ensure!(
            entries.iter().all(|(existing, _)| existing != id),
            "duplicate vector id: {id}"
        );
        entries.push((id.to_string(), embedding.to_vec()));
        Ok(())
    }

    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| anyhow!("index lock poisoned: {e}"))?;

        let mut scored: Vec<Neighbor> = entries
            .iter()
            .map(|(id, v)| Neighbor {
                id: id.clone(),
                distance: l2_distance(query, v),
            })
            .collect();

        // Stable sort keeps insertion order among equal distances.
        scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        scored.truncate(k);
        Ok(scored)
    }

    fn len(&self) -> Result<usize> {
        Ok(self
            .entries
            .read()
            .map_err(|e| anyhow!("index lock poisoned: {e}"))?
            .len())
    }
}

/// Euclidean distance. Vectors of unequal length compare over the shorter prefix
/// with the remainder of the longer one counted against zero.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().max(b.len());
    let sum: f64 = (0..n)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0.0) as f64;
            let y = b.get(i).copied().unwrap_or(0.0) as f64;
            (x - y) * (x - y)
        })
        .sum();
    sum.sqrt()
}
