//! SQLite-backed [`MemoryStore`]: a `memories` record table plus a
//! sqlite-vec `memories_vec` table holding one vector per record.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::db::{self, HealthReport, MemoryCounts};
use crate::memory::store::MemoryStore;
use crate::memory::types::{
    ListPage, ListQuery, Memory, Metadata, Neighbor, SortOrder, TAGS_KEY, TOMBSTONE,
};
use crate::memory::{bytes_to_embedding, embedding_to_bytes};

/// sqlite-vec refuses KNN queries above this k.
const MAX_KNN: usize = 4096;

const MEMORY_COLUMNS: &str = "id, content, metadata, created_at, updated_at, superseded_by";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, dimension: usize, model: &str) -> Result<Self> {
        let conn = db::open_database(path, dimension, model)?;
        Ok(Self::from_connection(conn, dimension))
    }

    pub fn open_in_memory(dimension: usize, model: &str) -> Result<Self> {
        let conn = db::open_memory_database(dimension, model)?;
        Ok(Self::from_connection(conn, dimension))
    }

    fn from_connection(conn: Connection, dimension: usize) -> Self {
        Self {
            conn: Mutex::new(conn),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn counts(&self) -> Result<MemoryCounts> {
        Ok(db::count_memories(&*self.lock()?)?)
    }

    pub fn health(&self) -> Result<HealthReport> {
        db::check_database_health(&*self.lock()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("database lock poisoned: {e}"))
    }

    fn check_dimension(&self, memory: &Memory) -> Result<()> {
        ensure!(
            memory.embedding.len() == self.dimension,
            "memory {} has a {}-dimension embedding, store expects {}",
            memory.id,
            memory.embedding.len(),
            self.dimension
        );
        Ok(())
    }
}

fn timestamp(t: &DateTime<Utc>) -> String {
    // Fixed-width so string order matches time order.
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid timestamp in database: {s}"))?
        .with_timezone(&Utc))
}

/// Write the record row and its vector row. Runs inside the caller's transaction.
fn insert_rows(conn: &Connection, memory: &Memory) -> Result<()> {
    let metadata = serde_json::to_string(&memory.metadata)?;
    conn.execute(
        "INSERT INTO memories (id, content, metadata, created_at, updated_at, superseded_by) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            memory.id,
            memory.content,
            metadata,
            timestamp(&memory.created_at),
            timestamp(&memory.updated_at),
            memory.superseded_by.as_ref().map(|s| s.as_str()),
        ],
    )
    .with_context(|| format!("failed to insert memory {}", memory.id))?;

    conn.execute(
        "INSERT INTO memories_vec (id, embedding) VALUES (?1, ?2)",
        params![memory.id, embedding_to_bytes(&memory.embedding)],
    )
    .with_context(|| format!("failed to insert vector for {}", memory.id))?;
    Ok(())
}

struct MemoryRow {
    id: String,
    content: String,
    metadata: String,
    created_at: String,
    updated_at: String,
    superseded_by: Option<String>,
}

impl MemoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            metadata: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
            superseded_by: row.get(5)?,
        })
    }

    fn into_memory(self, conn: &Connection) -> Result<Memory> {
        let metadata: Metadata = serde_json::from_str(&self.metadata)
            .with_context(|| format!("invalid metadata JSON for {}", self.id))?;
        let embedding = load_embedding(conn, &self.id)?;
        Ok(Memory {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            superseded_by: self.superseded_by.map(Into::into),
            metadata,
            embedding,
            content: self.content,
            id: self.id,
        })
    }
}

fn load_embedding(conn: &Connection, id: &str) -> Result<Vec<f32>> {
    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT embedding FROM memories_vec WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    match bytes {
        Some(bytes) => bytes_to_embedding(&bytes),
        None => Err(anyhow!("memory {id} has no vector row")),
    }
}

impl MemoryStore for SqliteStore {
    fn insert(&self, memory: &Memory) -> Result<()> {
        self.check_dimension(memory)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        insert_rows(&tx, memory)?;
        tx.commit()?;
        Ok(())
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Memory>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1"),
                params![id],
                MemoryRow::from_row,
            )
            .optional()?;
        row.map(|r| r.into_memory(&conn)).transpose()
    }

    fn mark_deleted(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE memories SET superseded_by = ?1, updated_at = ?2 WHERE id = ?3",
            params![TOMBSTONE, timestamp(&Utc::now()), id],
        )?;
        Ok(rows > 0)
    }

    fn find_similar(&self, embedding: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        ensure!(
            embedding.len() == self.dimension,
            "query vector has {} dimensions, store expects {}",
            embedding.len(),
            self.dimension
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, distance FROM memories_vec WHERE embedding MATCH ?1 ORDER BY distance LIMIT ?2",
        )?;
        let neighbors = stmt
            .query_map(
                params![embedding_to_bytes(embedding), k.min(MAX_KNN) as i64],
                |row| {
                    Ok(Neighbor {
                        id: row.get(0)?,
                        distance: row.get(1)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(neighbors)
    }

    fn insert_superseding(&self, memory: &Memory, old_id: &str) -> Result<bool> {
        self.check_dimension(memory)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let claimed = tx.execute(
            "UPDATE memories SET superseded_by = ?1, updated_at = ?2 \
             WHERE id = ?3 AND superseded_by IS NULL",
            params![memory.id, timestamp(&Utc::now()), old_id],
        )?;
        if claimed == 0 {
            // Dropping the transaction rolls it back.
            return Ok(false);
        }

        insert_rows(&tx, memory)?;
        tx.commit()?;
        Ok(true)
    }

    fn list(&self, query: &ListQuery) -> Result<ListPage> {
        let conn = self.lock()?;

        let mut conditions: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if !query.include_inactive {
            conditions.push("superseded_by IS NULL".into());
        }
        if let Some(start) = &query.filter.created_after {
            values.push(Value::Text(timestamp(start)));
            conditions.push(format!("created_at >= ?{}", values.len()));
        }
        if let Some(end) = &query.filter.created_before {
            values.push(Value::Text(timestamp(end)));
            conditions.push(format!("created_at <= ?{}", values.len()));
        }
        if !query.filter.tags.is_empty() {
            let mut placeholders = Vec::with_capacity(query.filter.tags.len());
            for tag in &query.filter.tags {
                values.push(Value::Text(tag.clone()));
                placeholders.push(format!("?{}", values.len()));
            }
            conditions.push(format!(
                "EXISTS (SELECT 1 FROM json_each(memories.metadata, '$.{TAGS_KEY}') \
                 WHERE json_each.value IN ({}))",
                placeholders.join(", ")
            ));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let direction = match query.order {
            SortOrder::NewestFirst => "DESC",
            SortOrder::OldestFirst => "ASC",
        };

        values.push(Value::Integer(sql_count(query.limit.saturating_add(1))));
        let limit_param = values.len();
        values.push(Value::Integer(sql_count(query.offset)));
        let offset_param = values.len();

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories {where_clause} \
             ORDER BY created_at {direction}, id {direction} \
             LIMIT ?{limit_param} OFFSET ?{offset_param}"
        ))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), MemoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let has_more = rows.len() > query.limit;
        let memories = rows
            .into_iter()
            .take(query.limit)
            .map(|r| r.into_memory(&conn))
            .collect::<Result<Vec<_>>>()?;

        Ok(ListPage { memories, has_more })
    }
}

/// SQLite integers are signed; counts past `i64::MAX` mean "no bound".
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
