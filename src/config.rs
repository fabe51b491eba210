use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// `stdio` or `http`.
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub dimension: usize,
    /// Entries kept in the embedding LRU. 0 disables caching.
    pub cache_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// Candidates fetched per requested result, to absorb filtered rows.
    pub overfetch_factor: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8765,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_data_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_data_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
            dimension: crate::embedding::DEFAULT_DIMENSION,
            cache_size: 1000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            overfetch_factor: 3,
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns `~/.memvault/`
pub fn default_data_dir() -> PathBuf {
    home_dir().join(".memvault")
}

/// Returns the default config file path: `~/.memvault/config.toml`
pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl Config {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, apply env var overrides, then validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides (MEMVAULT_DB, MEMVAULT_LOG_LEVEL, MEMVAULT_MODEL_DIR).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEMVAULT_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MEMVAULT_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEMVAULT_MODEL_DIR") {
            self.embedding.cache_dir = val;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.overfetch_factor < 2 {
            bail!("retrieval.overfetch_factor must be at least 2, got {}", r.overfetch_factor);
        }
        if r.default_limit == 0 || r.default_limit > r.max_limit {
            bail!(
                "retrieval.default_limit must be within 1..={}, got {}",
                r.max_limit,
                r.default_limit
            );
        }
        if self.embedding.dimension == 0 {
            bail!("embedding.dimension must be positive");
        }
        match self.server.transport.as_str() {
            "stdio" | "http" => Ok(()),
            other => bail!("unknown transport: {other}. Supported: stdio, http"),
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        home_dir().join(rest)
    } else {
        PathBuf::from(path)
    }
}
