//! Tests for shard handles
//!
//! These tests verify:
//! - Deterministic shard file naming
//! - Writer/reader handles see the same data
//! - The reader cannot write
//! - Opening a missing file fails with the shard id attached
//! - Close failures carry their own error kind

use std::path::Path;

use litebeam::config::ConnectionTuning;
use litebeam::shard::{create_shard_file, open_shard, parse_shard_id, shard_path};
use litebeam::LitebeamError;
use rusqlite::params;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn create_with_table(base: &Path, shard_id: u32) {
    let path = shard_path(base, shard_id);
    let conn = create_shard_file(shard_id, &path, &ConnectionTuning::default()).unwrap();
    conn.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT NOT NULL)")
        .unwrap();
}

// =============================================================================
// Path Tests
// =============================================================================

#[test]
fn test_shard_path_naming() {
    let base = Path::new("/data");

    assert_eq!(shard_path(base, 0), Path::new("/data/shard_0.db"));
    assert_eq!(shard_path(base, 42), Path::new("/data/shard_42.db"));
}

#[test]
fn test_parse_shard_id() {
    assert_eq!(parse_shard_id(Path::new("/data/shard_7.db")), Some(7));
    assert_eq!(parse_shard_id(Path::new("shard_0.db")), Some(0));
    assert_eq!(parse_shard_id(Path::new("shard_7.db-wal")), None);
    assert_eq!(parse_shard_id(Path::new("metadata.db")), None);
    assert_eq!(parse_shard_id(Path::new("shard_x.db")), None);
    assert_eq!(parse_shard_id(Path::new("shard_7.sqlite")), None);
}

#[test]
fn test_path_round_trip() {
    let base = Path::new("/var/lib/litebeam");
    for id in [0, 1, 99, 4096] {
        assert_eq!(parse_shard_id(&shard_path(base, id)), Some(id));
    }
}

// =============================================================================
// Handle Tests
// =============================================================================

#[test]
fn test_open_shard_write_then_read() {
    let temp = TempDir::new().unwrap();
    create_with_table(temp.path(), 0);

    let path = shard_path(temp.path(), 0);
    let mut shard = open_shard(0, &path, &ConnectionTuning::default()).unwrap();
    assert_eq!(shard.shard_id(), 0);
    assert_eq!(shard.path(), shard_path(temp.path(), 0));

    {
        let tx = shard.begin_write().unwrap();
        tx.execute("INSERT INTO kv (k, v) VALUES (?1, ?2)", params!["alice", "1"])
            .unwrap();
        tx.commit().unwrap();
    }

    let v: String = shard
        .reader()
        .query_row("SELECT v FROM kv WHERE k = ?1", params!["alice"], |row| row.get(0))
        .unwrap();
    assert_eq!(v, "1");

    shard.close().unwrap();
}

#[test]
fn test_reader_is_read_only() {
    let temp = TempDir::new().unwrap();
    create_with_table(temp.path(), 1);

    let shard = open_shard(1, &shard_path(temp.path(), 1), &ConnectionTuning::default()).unwrap();

    let result = shard
        .reader()
        .execute("INSERT INTO kv (k, v) VALUES ('bob', '2')", []);
    assert!(result.is_err());
}

#[test]
fn test_writer_uses_wal() {
    let temp = TempDir::new().unwrap();
    create_with_table(temp.path(), 2);

    let shard = open_shard(2, &shard_path(temp.path(), 2), &ConnectionTuning::default()).unwrap();
    let mode: String = shard
        .writer()
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .unwrap();

    assert_eq!(mode.to_lowercase(), "wal");
}

#[test]
fn test_open_missing_file_fails() {
    let temp = TempDir::new().unwrap();

    let result = open_shard(5, &shard_path(temp.path(), 5), &ConnectionTuning::default());

    let err = result.unwrap_err();
    assert!(matches!(err, LitebeamError::ShardOpen { shard_id: 5, .. }));
    assert_eq!(err.shard_id(), Some(5));
    assert!(!shard_path(temp.path(), 5).exists());
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_releases_file_for_reopen() {
    let temp = TempDir::new().unwrap();
    create_with_table(temp.path(), 3);
    let path = shard_path(temp.path(), 3);

    let shard = open_shard(3, &path, &ConnectionTuning::default()).unwrap();
    shard.close().unwrap();

    let mut shard = open_shard(3, &path, &ConnectionTuning::default()).unwrap();
    let tx = shard.begin_write().unwrap();
    tx.execute("INSERT INTO kv (k, v) VALUES ('carol', '3')", []).unwrap();
    tx.commit().unwrap();
    shard.close().unwrap();
}

#[test]
fn test_close_error_is_not_reported_as_open() {
    let err = LitebeamError::ShardClose {
        shard_id: 3,
        source: rusqlite::Error::InvalidQuery,
    };

    assert_eq!(err.shard_id(), Some(3));
    assert!(!err.is_not_found());
    let message = err.to_string();
    assert!(message.contains("close"), "unexpected message: {}", message);
    assert!(!message.contains("open"), "unexpected message: {}", message);
}
