use anyhow::Result;

use crate::config::Config;

/// Display memory counts in the terminal.
pub fn stats(config: &Config) -> Result<()> {
    let store = super::open_store(config)?;
    let counts = store.counts()?;

    println!("Memory Statistics");
    println!("{}", "=".repeat(40));
    println!("  Total memories:      {}", counts.total());
    println!("  Live:                {}", counts.live);
    println!("  Superseded:          {}", counts.superseded);
    println!("  Forgotten:           {}", counts.tombstoned);
    println!("  Embedding dimension: {}", store.dimension());

    Ok(())
}
