pub mod doctor;
pub mod forget;
pub mod inspect;
pub mod list;
pub mod search;
pub mod stats;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::embedding::local::{MODEL_FILE, TOKENIZER_FILE};
use crate::memory::backend::SqliteStore;

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &crate::config::EmbeddingConfig) -> Result<()> {
    let cache_dir = crate::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (name, url, size_hint) in [
        (MODEL_FILE, MODEL_URL, " (~90MB)"),
        (TOKENIZER_FILE, TOKENIZER_URL, ""),
    ] {
        let path = cache_dir.join(name);
        if path.exists() {
            println!("{name} already exists at {}", path.display());
            continue;
        }
        println!("Downloading {name}{size_hint}...");
        download_file(url, &path).await?;
        println!("Saved to {}", path.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Stream a URL to disk with a progress bar. Writes to a temp file, then renames.
async fn download_file(url: &str, dest: &Path) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .context("invalid progress template")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk)
            .await
            .context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

/// Open the configured database without loading the embedding model.
fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(
        config.resolved_db_path(),
        config.embedding.dimension,
        &config.embedding.model,
    )
}

/// First `max_chars` characters of `content` on one line.
fn preview(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
