//! Tests for Provisioner
//!
//! These tests verify:
//! - A created shard has a file and exactly one record with zero items
//! - Creation is idempotent for registered ids
//! - The shard ceiling is enforced
//! - Initializer failures leave neither a record nor a file
//! - Unregistered files are detected

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use litebeam::config::{Config, ConnectionTuning};
use litebeam::metadata::{self, MetadataStore};
use litebeam::provision::Provisioner;
use litebeam::shard::shard_path;
use litebeam::LitebeamError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup(config: Config) -> (MetadataStore, Provisioner) {
    let store = MetadataStore::open(&config.base_path, &ConnectionTuning::default(), 1).unwrap();
    let provisioner = Provisioner::new(&config);
    (store, provisioner)
}

fn config_for(temp: &TempDir, max_shards: u32) -> Config {
    Config::builder()
        .base_path(temp.path())
        .max_shard_count(max_shards)
        .build()
}

// =============================================================================
// Create Tests
// =============================================================================

#[test]
fn test_create_shard_registers_and_creates_file() {
    let temp = TempDir::new().unwrap();
    let (store, provisioner) = setup(config_for(&temp, 4));

    let shard = store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();

    assert_eq!(shard.shard_id, 0);
    assert!(shard.registered);
    assert!(shard.created_file);
    assert_eq!(shard.path, shard_path(temp.path(), 0));
    assert!(shard.path.exists());

    let records = store.read(metadata::list_records).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_count, 0);
    assert_eq!(records[0].storage_path, shard.path);
}

#[test]
fn test_create_existing_shard_is_noop_success() {
    let temp = TempDir::new().unwrap();
    let (store, provisioner) = setup(config_for(&temp, 4));

    store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    let again = store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();

    assert!(!again.registered);
    assert!(!again.created_file);
    assert_eq!(store.read(metadata::shard_count).unwrap(), 1);
}

#[test]
fn test_create_respects_ceiling() {
    let temp = TempDir::new().unwrap();
    let (store, provisioner) = setup(config_for(&temp, 2));

    store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    store.write(|tx| provisioner.create_shard(tx, 1)).unwrap();

    let result = store.write(|tx| provisioner.create_shard(tx, 2));
    assert!(matches!(result, Err(LitebeamError::ShardLimitReached { max_shards: 2 })));
    assert_eq!(store.read(metadata::shard_count).unwrap(), 2);
    assert!(!shard_path(temp.path(), 2).exists());
}

#[test]
fn test_existing_shard_succeeds_at_ceiling() {
    let temp = TempDir::new().unwrap();
    let (store, provisioner) = setup(config_for(&temp, 1));

    store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    let again = store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();

    assert!(!again.registered);
}

// =============================================================================
// Schema Initializer Tests
// =============================================================================

#[test]
fn test_schema_init_runs_once_per_new_shard() {
    let temp = TempDir::new().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);

    let config = Config::builder()
        .base_path(temp.path())
        .max_shard_count(4)
        .schema_init(move |conn| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            conn.execute_batch("CREATE TABLE users (id TEXT PRIMARY KEY, name TEXT NOT NULL)")?;
            Ok(())
        })
        .build();
    let (store, provisioner) = setup(config);

    store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    store.write(|tx| provisioner.create_shard(tx, 1)).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_schema_init_failure_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .base_path(temp.path())
        .max_shard_count(4)
        .schema_init(|_conn| Err("schema rejected".into()))
        .build();
    let (store, provisioner) = setup(config);

    let result = store.write(|tx| provisioner.create_shard(tx, 0));

    match result {
        Err(LitebeamError::SchemaInit { shard_id, source }) => {
            assert_eq!(shard_id, 0);
            assert_eq!(source.to_string(), "schema rejected");
        }
        other => panic!("expected SchemaInit error, got {:?}", other),
    }
    assert_eq!(store.read(metadata::shard_count).unwrap(), 0);
    assert!(!shard_path(temp.path(), 0).exists());
}

#[test]
fn test_preexisting_file_survives_failure() {
    let temp = TempDir::new().unwrap();
    let path = shard_path(temp.path(), 0);
    fs::write(&path, b"").unwrap();

    let config = Config::builder()
        .base_path(temp.path())
        .schema_init(|_conn| Err("nope".into()))
        .build();
    let (store, provisioner) = setup(config);

    let result = store.write(|tx| provisioner.create_shard(tx, 0));

    assert!(result.is_err());
    assert!(path.exists());
}

// =============================================================================
// Discard / Orphan Tests
// =============================================================================

#[test]
fn test_discard_removes_file_and_sidecars() {
    let temp = TempDir::new().unwrap();
    let (_store, provisioner) = setup(config_for(&temp, 4));

    let path = shard_path(temp.path(), 3);
    fs::write(&path, b"x").unwrap();
    fs::write(temp.path().join("shard_3.db-wal"), b"x").unwrap();

    provisioner.discard(3, &path);

    assert!(!path.exists());
    assert!(!temp.path().join("shard_3.db-wal").exists());

    // Discarding twice is harmless
    provisioner.discard(3, &path);
}

#[test]
fn test_unregistered_files() {
    let temp = TempDir::new().unwrap();
    let (store, provisioner) = setup(config_for(&temp, 4));

    store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    fs::write(shard_path(temp.path(), 7), b"").unwrap();
    fs::write(temp.path().join("notes.txt"), b"").unwrap();

    let records = store.read(metadata::list_records).unwrap();
    let orphans = provisioner.unregistered_files(&records).unwrap();

    assert_eq!(orphans, vec![shard_path(temp.path(), 7)]);
}

// =============================================================================
// Registration Failure Tests
// =============================================================================

#[test]
fn test_register_failure_removes_created_file() {
    let temp = TempDir::new().unwrap();
    let (store, provisioner) = setup(config_for(&temp, 4));

    // Another id already claims shard_0.db, so the insert hits the UNIQUE path
    let taken = shard_path(temp.path(), 0);
    store
        .write(|tx| {
            metadata::insert_record(tx, 3, &taken)
                .map_err(|source| LitebeamError::ShardRegister { shard_id: 3, source })
        })
        .unwrap();
    assert!(!taken.exists());

    let result = store.write(|tx| provisioner.create_shard(tx, 0));

    assert!(matches!(result, Err(LitebeamError::ShardRegister { shard_id: 0, .. })));
    assert!(!taken.exists());
    assert!(!temp.path().join("shard_0.db-wal").exists());
    assert_eq!(store.read(metadata::shard_count).unwrap(), 1);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_path_is_not_registered() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = TempDir::new().unwrap();
    let (store, _provisioner) = setup(config_for(&temp, 4));
    let path = temp.path().join(OsStr::from_bytes(b"shard_\xff.db"));

    let result = store.write(|tx| {
        metadata::insert_record(tx, 0, &path)
            .map_err(|source| LitebeamError::ShardRegister { shard_id: 0, source })
    });

    assert!(matches!(result, Err(LitebeamError::ShardRegister { shard_id: 0, .. })));
    assert_eq!(store.read(metadata::shard_count).unwrap(), 0);
}

// =============================================================================
// Reuse Tests
// =============================================================================

#[test]
fn test_reused_file_keeps_rows_with_idempotent_init() {
    let temp = TempDir::new().unwrap();
    let path = shard_path(temp.path(), 0);
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE users (id TEXT PRIMARY KEY);
             INSERT INTO users (id) VALUES ('left-behind');",
        )
        .unwrap();
    }

    let config = Config::builder()
        .base_path(temp.path())
        .schema_init(|conn| {
            conn.execute_batch("CREATE TABLE IF NOT EXISTS users (id TEXT PRIMARY KEY)")?;
            Ok(())
        })
        .build();
    let (store, provisioner) = setup(config);

    let shard = store.write(|tx| provisioner.create_shard(tx, 0)).unwrap();
    assert!(shard.registered);
    assert!(!shard.created_file);

    let conn = rusqlite::Connection::open(&path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_reused_file_with_non_idempotent_init_fails_and_survives() {
    let temp = TempDir::new().unwrap();
    let path = shard_path(temp.path(), 0);
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE users (id TEXT PRIMARY KEY)").unwrap();
    }

    let config = Config::builder()
        .base_path(temp.path())
        .schema_init(|conn| {
            conn.execute_batch("CREATE TABLE users (id TEXT PRIMARY KEY)")?;
            Ok(())
        })
        .build();
    let (store, provisioner) = setup(config);

    let result = store.write(|tx| provisioner.create_shard(tx, 0));

    assert!(matches!(result, Err(LitebeamError::SchemaInit { shard_id: 0, .. })));
    assert!(path.exists());
    assert_eq!(store.read(metadata::shard_count).unwrap(), 0);
}

#[test]
fn test_max_shard_count_from_config() {
    let temp = TempDir::new().unwrap();
    let (_store, provisioner) = setup(config_for(&temp, 6));

    assert_eq!(provisioner.max_shard_count(), 6);
}
