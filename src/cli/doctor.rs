//! CLI `doctor` command: database diagnostics and a health report.

use anyhow::{Context, Result};

use crate::config::Config;

/// Run database diagnostics and print a health report.
pub fn doctor(config: &Config) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `memvault serve` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let store = super::open_store(config).context("failed to open database (may be corrupt)")?;
    let report = store.health().context("failed to run health check")?;

    println!("memvault Health Report");
    println!("======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding model:");
    println!(
        "  Stored:          {}",
        report.embedding_model.as_deref().unwrap_or("(not set)")
    );
    println!("  Configured:      {}", config.embedding.model);
    if let Some(dim) = report.embedding_dimension {
        println!("  Dimension:       {dim}");
    }
    if report
        .embedding_model
        .as_ref()
        .is_some_and(|stored| stored != &config.embedding.model)
    {
        println!("  WARNING: model mismatch, similarity scores across models are not comparable.");
    }
    println!();
    println!("Row counts:");
    println!("  Live:            {}", report.counts.live);
    println!("  Superseded:      {}", report.counts.superseded);
    println!("  Forgotten:       {}", report.counts.tombstoned);
    if report.missing_vectors > 0 {
        println!("  Missing vectors: {}", report.missing_vectors);
    }
    println!();
    if report.integrity == "ok" {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity);
        println!();
        println!("Recovery: restore ~/.memvault/memory.db from a backup.");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
