pub mod backend;
pub mod chain;
pub mod error;
pub mod index;
pub mod service;
pub mod store;
pub mod types;

pub use error::MemoryError;
pub use service::MemoryService;
pub use store::MemoryStore;
pub use types::{Memory, Metadata, Supersession};

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}

/// Decode a little-endian f32 blob as stored by sqlite-vec.
pub fn bytes_to_embedding(bytes: &[u8]) -> anyhow::Result<Vec<f32>> {
    anyhow::ensure!(
        bytes.len() % 4 == 0,
        "embedding blob length {} is not a multiple of 4",
        bytes.len()
    );
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
