use memvault::db;
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path, 384, "all-MiniLM-L6-v2").unwrap();
    assert!(db_path.exists());

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn pragmas_are_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db"), 384, "m").unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);

    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn health_check_passes_on_fresh_db() {
    let conn = db::open_memory_database(384, "all-MiniLM-L6-v2").unwrap();

    let report = db::check_database_health(&conn).unwrap();
    assert!(report.is_healthy());
    assert_eq!(report.integrity, "ok");
    assert_eq!(report.schema_version, db::schema::SCHEMA_VERSION);
    assert!(!report.sqlite_vec_version.is_empty());
    assert_eq!(report.embedding_model.as_deref(), Some("all-MiniLM-L6-v2"));
    assert_eq!(report.embedding_dimension, Some(384));
    assert_eq!(report.counts.total(), 0);
}

#[test]
fn vec_table_width_follows_configured_dimension() {
    let conn = db::open_memory_database(3, "m").unwrap();
    let bytes = memvault::memory::embedding_to_bytes(&[1.0, 0.0, 0.0]).to_vec();
    conn.execute(
        "INSERT INTO memories_vec (id, embedding) VALUES ('ok', ?1)",
        [&bytes],
    )
    .unwrap();

    let wrong = memvault::memory::embedding_to_bytes(&[1.0, 0.0]).to_vec();
    assert!(conn
        .execute(
            "INSERT INTO memories_vec (id, embedding) VALUES ('bad', ?1)",
            [&wrong],
        )
        .is_err());
}
