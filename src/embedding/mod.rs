//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait, a local ONNX implementation
//! (all-MiniLM-L6-v2, L2-normalized) and an LRU [`CachedEmbeddingProvider`]
//! wrapper. [`create_provider`] builds the configured stack.

pub mod cache;
pub mod local;

use anyhow::Result;

pub use cache::CachedEmbeddingProvider;

/// Dimensions produced by all-MiniLM-L6-v2.
pub const DEFAULT_DIMENSION: usize = 384;

/// Maps text to a fixed-length vector.
///
/// All methods are synchronous. Callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Number of dimensions every returned vector has.
    fn dimensions(&self) -> usize;

    /// Identifier recorded alongside stored vectors.
    fn model_name(&self) -> &str;
}

/// Create the configured embedding provider, wrapped in the LRU cache.
///
/// Only `"local"` is supported (ONNX Runtime + all-MiniLM-L6-v2). Returns an
/// error if model files are missing. Run `memvault model download` first.
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)?;
            Ok(Box::new(CachedEmbeddingProvider::new(
                provider,
                config.cache_size,
            )))
        }
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
