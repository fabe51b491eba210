pub mod schema;

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;

use crate::memory::types::TOMBSTONE;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the database at the given path with sqlite-vec loaded,
/// the schema initialized and the embedding settings checked.
pub fn open_database(path: impl AsRef<Path>, dimension: usize, model: &str) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    prepare(&conn, dimension, model)?;

    tracing::info!(path = %path.display(), dimension, "database initialized");
    Ok(conn)
}

/// Open a private in-memory database. Nothing survives the connection.
pub fn open_memory_database(dimension: usize, model: &str) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    prepare(&conn, dimension, model)?;
    Ok(conn)
}

fn prepare(conn: &Connection, dimension: usize, model: &str) -> Result<()> {
    // An existing vec0 table keeps its width, so check before creating anything.
    if let Some(stored) = stored_dimension(conn)? {
        if stored != dimension {
            bail!(
                "database was created with {stored}-dimension embeddings, \
                 but the configured model produces {dimension}"
            );
        }
    }

    schema::init_schema(conn, dimension).context("failed to initialize schema")?;

    match schema::get_embedding_model(conn)? {
        Some(stored) if stored != model => {
            tracing::warn!(
                stored = %stored,
                configured = %model,
                "embedding model differs from the one that wrote this database; \
                 similarity across models is not meaningful"
            );
        }
        Some(_) => {}
        None => schema::set_meta(conn, "embedding_model", model)?,
    }
    if schema::get_embedding_dimension(conn)?.is_none() {
        schema::set_meta(conn, "embedding_dimension", &dimension.to_string())?;
    }
    Ok(())
}

fn stored_dimension(conn: &Connection) -> Result<Option<usize>> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_meta')",
        [],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(None);
    }
    Ok(schema::get_embedding_dimension(conn)?)
}

/// Record counts by supersession state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryCounts {
    pub live: u64,
    pub superseded: u64,
    pub tombstoned: u64,
}

impl MemoryCounts {
    pub fn total(&self) -> u64 {
        self.live + self.superseded + self.tombstoned
    }
}

pub fn count_memories(conn: &Connection) -> rusqlite::Result<MemoryCounts> {
    conn.query_row(
        "SELECT
            COALESCE(SUM(superseded_by IS NULL), 0),
            COALESCE(SUM(superseded_by IS NOT NULL AND superseded_by != ?1), 0),
            COALESCE(SUM(superseded_by = ?1), 0)
         FROM memories",
        [TOMBSTONE],
        |row| {
            Ok(MemoryCounts {
                live: row.get::<_, i64>(0)? as u64,
                superseded: row.get::<_, i64>(1)? as u64,
                tombstoned: row.get::<_, i64>(2)? as u64,
            })
        },
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub integrity: String,
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    pub counts: MemoryCounts,
    /// Records whose vector row is missing.
    pub missing_vectors: u64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.integrity == "ok" && self.missing_vectors == 0
    }
}

pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;
    let sqlite_vec_version: String = conn
        .query_row("SELECT vec_version()", [], |row| row.get(0))
        .context("sqlite-vec is not loaded")?;
    let missing_vectors: i64 = conn.query_row(
        "SELECT COUNT(*) FROM memories m
         WHERE NOT EXISTS (SELECT 1 FROM memories_vec v WHERE v.id = m.id)",
        [],
        |row| row.get(0),
    )?;

    Ok(HealthReport {
        integrity,
        schema_version: schema::get_schema_version(conn)?,
        sqlite_vec_version,
        embedding_model: schema::get_embedding_model(conn)?,
        embedding_dimension: schema::get_embedding_dimension(conn)?,
        counts: count_memories(conn)?,
        missing_vectors: missing_vectors as u64,
    })
}
