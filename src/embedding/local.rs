//! Local ONNX Runtime embedding provider.
//!
//! Runs a sentence-transformers export via `ort`: tokenize, infer, mean-pool
//! over the attention mask, then L2-normalize.

use std::sync::Mutex;

use anyhow::{anyhow, ensure, Context, Result};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, EmbeddingProvider};
use crate::config::EmbeddingConfig;

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    model: String,
    dimension: usize,
}

// Safety: Tokenizer is Send+Sync. Session is only reached through the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = crate::config::expand_tilde(&config.cache_dir);
        let model_path = cache_dir.join(MODEL_FILE);
        let tokenizer_path = cache_dir.join(TOKENIZER_FILE);

        ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `memvault model download` first.",
            model_path.display()
        );
        ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `memvault model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;
        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tracing::info!(tokenizer = %tokenizer_path.display(), "tokenizer loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("model returned no embedding"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))?;
        // Single-segment input: token types are all zero.
        let token_type_ids_tensor =
            Tensor::from_array((shape, vec![0i64; batch_size * seq_len].into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Output naming varies by export; fall back to the first output.
        let token_embeddings = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, data) = token_embeddings
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings tensor")?;

        let dims: &[i64] = &out_shape;
        ensure!(
            dims.len() == 3 && dims[2] == self.dimension as i64,
            "unexpected token embeddings shape {dims:?}, expected [batch, seq, {}]",
            self.dimension
        );

        let pooled = mean_pool(
            data,
            &attention_mask,
            batch_size,
            seq_len,
            dims[1] as usize,
            self.dimension,
        );
        Ok(pooled.iter().map(|v| l2_normalize(v)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Average token vectors per batch row, weighting each token by its attention mask.
///
/// `data` is laid out `[batch, out_seq_len, hidden]`; `mask` is `[batch, mask_seq_len]`.
fn mean_pool(
    data: &[f32],
    mask: &[i64],
    batch_size: usize,
    mask_seq_len: usize,
    out_seq_len: usize,
    hidden: usize,
) -> Vec<Vec<f32>> {
    (0..batch_size)
        .map(|b| {
            let mut sum = vec![0.0f32; hidden];
            let mut count = 0.0f32;
            for s in 0..out_seq_len.min(mask_seq_len) {
                let weight = mask[b * mask_seq_len + s] as f32;
                if weight <= 0.0 {
                    continue;
                }
                let offset = (b * out_seq_len + s) * hidden;
                for (d, acc) in sum.iter_mut().enumerate() {
                    *acc += data[offset + d] * weight;
                }
                count += weight;
            }
            if count > 0.0 {
                sum.iter_mut().for_each(|x| *x /= count);
            }
            sum
        })
        .collect()
}
