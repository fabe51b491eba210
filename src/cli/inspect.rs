//! CLI `inspect` command: full details for a single memory.

use anyhow::Result;

use crate::config::Config;
use crate::memory::chain::{follow_chain, ChainEnd};
use crate::memory::MemoryStore;

/// Print a memory exactly as stored, then where its supersession chain leads.
pub fn inspect(config: &Config, id: &str) -> Result<()> {
    let store = super::open_store(config)?;

    let Some(m) = store.find_by_id(id)? else {
        println!("No memory with id {id}");
        return Ok(());
    };

    println!("Memory: {}", m.id);
    println!("{}", "=".repeat(50));
    println!("  Created:        {}", m.created_at);
    println!("  Updated:        {}", m.updated_at);
    match &m.superseded_by {
        None => println!("  Status:         live"),
        Some(s) if s.is_tombstone() => println!("  Status:         forgotten"),
        Some(s) => println!("  Superseded by:  {s}"),
    }
    if !m.metadata.is_empty() {
        println!("  Metadata:       {}", serde_json::to_string_pretty(&m.metadata)?);
    }
    println!("  Embedding:      {} dims", m.embedding.len());
    println!();
    println!("Content:");
    println!("  {}", m.content);

    if m.is_live() || m.is_tombstoned() {
        return Ok(());
    }

    println!();
    match follow_chain(&store, m)? {
        ChainEnd::Head(head) => {
            println!("Current version: {}", head.id);
            println!("  {}", head.content);
        }
        ChainEnd::Deleted => println!("Chain ends in a deleted memory."),
        ChainEnd::Dangling { missing } => {
            println!("Chain is broken: {missing} does not exist.")
        }
        ChainEnd::Cycle { at } => println!("Chain is broken: cycle at {at}."),
    }

    Ok(())
}
