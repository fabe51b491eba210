use anyhow::Result;

use crate::config::Config;
use crate::memory::types::{ListQuery, MemoryFilter, SortOrder};
use crate::memory::MemoryStore;

pub fn list(config: &Config, limit: usize, all: bool, tags: Vec<String>, oldest: bool) -> Result<()> {
    let store = super::open_store(config)?;
    let page = store.list(&ListQuery {
        limit,
        offset: 0,
        include_inactive: all,
        order: if oldest {
            SortOrder::OldestFirst
        } else {
            SortOrder::NewestFirst
        },
        filter: MemoryFilter {
            tags,
            ..Default::default()
        },
    })?;

    if page.memories.is_empty() {
        println!("No memories stored.");
        return Ok(());
    }

    for m in &page.memories {
        let marker = match &m.superseded_by {
            None => "",
            Some(s) if s.is_tombstone() => " [forgotten]",
            Some(_) => " [superseded]",
        };
        println!("{} {}{marker}", m.id, m.created_at.format("%Y-%m-%d %H:%M"));
        println!("  {}", super::preview(&m.content, 100));
    }
    if page.has_more {
        println!("\n(more available; raise --limit)");
    }
    Ok(())
}
