//! Typed queries against the `shards` table
//!
//! Every function takes a `&Connection`; a `&Transaction` derefs to one, so
//! the same queries serve both the read pool and write units.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{LitebeamError, Result};

use super::ShardRecord;

/// All records ordered by shard id
pub fn list_records(conn: &Connection) -> Result<Vec<ShardRecord>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT shard_id, storage_path, item_count, created_at
             FROM shards ORDER BY shard_id ASC",
        )
        .map_err(|e| LitebeamError::metadata("list shards", e))?;
    let rows = stmt
        .query_map([], map_record)
        .map_err(|e| LitebeamError::metadata("list shards", e))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| LitebeamError::metadata("list shards", e))
}

/// One record, or `None` if the id is not registered
pub fn find_record(conn: &Connection, shard_id: u32) -> Result<Option<ShardRecord>> {
    conn.prepare_cached(
        "SELECT shard_id, storage_path, item_count, created_at
         FROM shards WHERE shard_id = ?1",
    )
    .and_then(|mut stmt| stmt.query_row(params![shard_id], map_record).optional())
    .map_err(|e| LitebeamError::metadata("find shard", e))
}

/// Item count for one shard
pub fn item_count(conn: &Connection, shard_id: u32) -> Result<u64> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT item_count FROM shards WHERE shard_id = ?1",
            params![shard_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| LitebeamError::metadata("read item count", e))?;
    count
        .map(clamp_count)
        .ok_or(LitebeamError::ShardNotFound(shard_id))
}

/// Sum of item counts across all shards
pub fn total_item_count(conn: &Connection) -> Result<u64> {
    let total: i64 = conn
        .query_row("SELECT COALESCE(SUM(item_count), 0) FROM shards", [], |row| {
            row.get(0)
        })
        .map_err(|e| LitebeamError::metadata("sum item counts", e))?;
    Ok(clamp_count(total))
}

/// Number of registered shards
pub fn shard_count(conn: &Connection) -> Result<u32> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM shards", [], |row| row.get(0))
        .map_err(|e| LitebeamError::metadata("count shards", e))?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Highest registered shard id, `None` on an empty table
pub fn max_shard_id(conn: &Connection) -> Result<Option<u32>> {
    conn.query_row("SELECT MAX(shard_id) FROM shards", [], |row| {
        row.get::<_, Option<u32>>(0)
    })
    .map_err(|e| LitebeamError::metadata("read max shard id", e))
}

/// Register a new shard with zero items
///
/// The path is stored as TEXT, so it must be valid UTF-8; anything else is
/// rejected instead of being registered under a lossy name.
pub fn insert_record(
    conn: &Connection,
    shard_id: u32,
    storage_path: &Path,
) -> rusqlite::Result<()> {
    let path = storage_path
        .to_str()
        .ok_or_else(|| rusqlite::Error::InvalidPath(storage_path.to_path_buf()))?;
    conn.execute(
        "INSERT INTO shards (shard_id, storage_path, item_count) VALUES (?1, ?2, 0)",
        params![shard_id, path],
    )?;
    Ok(())
}

/// Add one item to a shard; `ShardNotFound` if the id is not registered
pub fn increment_item_count(conn: &Connection, shard_id: u32) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE shards SET item_count = item_count + 1 WHERE shard_id = ?1",
            params![shard_id],
        )
        .map_err(|e| LitebeamError::metadata("increment item count", e))?;
    if changed == 0 {
        return Err(LitebeamError::ShardNotFound(shard_id));
    }
    Ok(())
}

/// Remove one item from a shard, floored at zero
///
/// Returns whether a row changed. Unknown ids and empty shards are no-ops.
pub fn decrement_item_count(conn: &Connection, shard_id: u32) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE shards SET item_count = item_count - 1
             WHERE shard_id = ?1 AND item_count > 0",
            params![shard_id],
        )
        .map_err(|e| LitebeamError::metadata("decrement item count", e))?;
    Ok(changed > 0)
}

/// Overwrite a shard's item count
pub fn set_item_count(conn: &Connection, shard_id: u32, count: u64) -> Result<()> {
    let count = i64::try_from(count).unwrap_or(i64::MAX);
    let changed = conn
        .execute(
            "UPDATE shards SET item_count = ?2 WHERE shard_id = ?1",
            params![shard_id, count],
        )
        .map_err(|e| LitebeamError::metadata("set item count", e))?;
    if changed == 0 {
        return Err(LitebeamError::ShardNotFound(shard_id));
    }
    Ok(())
}

// =============================================================================
// Private Helpers
// =============================================================================

fn map_record(row: &Row<'_>) -> rusqlite::Result<ShardRecord> {
    let path: String = row.get(1)?;
    let count: i64 = row.get(2)?;
    Ok(ShardRecord {
        shard_id: row.get(0)?,
        storage_path: PathBuf::from(path),
        item_count: clamp_count(count),
        created_at: row.get(3)?,
    })
}

/// The table's CHECK constraint keeps counts non-negative
fn clamp_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
