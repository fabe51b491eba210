use anyhow::Result;

use crate::config::Config;
use crate::memory::MemoryStore;

/// Soft-delete a memory from the terminal.
pub fn forget(config: &Config, id: &str) -> Result<()> {
    let store = super::open_store(config)?;
    if store.mark_deleted(id)? {
        tracing::info!(id = %id, "memory forgotten");
        println!("Forgot {id}");
    } else {
        println!("No memory with id {id}");
    }
    Ok(())
}
