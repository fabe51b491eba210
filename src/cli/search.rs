use anyhow::Result;

use crate::config::Config;

/// Run a semantic search from the terminal.
pub async fn search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    let limit = limit.unwrap_or(config.retrieval.default_limit);
    let service = crate::server::build_service(config)?;

    let query_text = query.to_string();
    let results = tokio::task::spawn_blocking(move || service.search(&query_text, limit)).await??;

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, memory) in results.iter().enumerate() {
        println!("  {}. {} ({})", i + 1, memory.id, memory.created_at.format("%Y-%m-%d %H:%M"));
        println!("     {}", super::preview(&memory.content, 120));
        println!();
    }

    Ok(())
}
