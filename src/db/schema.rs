//! SQL DDL for the memvault tables plus `schema_meta` accessors.
//!
//! `memories` holds the records, `memories_vec` (vec0) the vector
//! association keyed by the same id. All DDL uses `IF NOT EXISTS`.

use rusqlite::{Connection, OptionalExtension};

/// The schema version that the current binary writes.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL CHECK(length(content) > 0),
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    superseded_by TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_superseded ON memories(superseded_by);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// vec0 DDL; the column width is fixed at creation.
fn vec_table_sql(dimension: usize) -> String {
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS memories_vec USING vec0(
            id TEXT PRIMARY KEY,
            embedding FLOAT[{dimension}]
        );"
    )
}

/// Initialize all schema tables. Idempotent.
pub fn init_schema(conn: &Connection, dimension: usize) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute_batch(&vec_table_sql(dimension))?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn get_meta(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        [key, value],
    )?;
    Ok(())
}

pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(get_meta(conn, "schema_version")?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

pub fn get_embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get_meta(conn, "embedding_model")
}

pub fn get_embedding_dimension(conn: &Connection) -> rusqlite::Result<Option<usize>> {
    Ok(get_meta(conn, "embedding_dimension")?.and_then(|v| v.parse().ok()))
}
