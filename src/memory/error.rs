//! Caller-visible error kinds for memory service operations.
//!
//! "Not found" is deliberately absent: `get` returns `None` and `delete`
//! returns `false` for a missing ID. Broken supersession chains are absorbed
//! inside search and never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// Rejected input. The call had no side effect.
    #[error("validation error: {0}")]
    Validation(String),

    /// The persistence layer could not complete a read or write.
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    /// The embedding provider could not produce a usable vector.
    #[error("embedding provider failure: {0:#}")]
    Provider(anyhow::Error),
}

impl MemoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
