//! Shard Handle Factory
//!
//! Thin layer over `rusqlite` that opens shard files with the configured
//! tuning.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use crate::config::ConnectionTuning;
use crate::error::{LitebeamError, Result};

use super::Shard;

/// Open writer and reader handles for a registered shard
///
/// The file must already exist; a missing file is reported as an open
/// failure rather than silently creating an empty shard.
pub fn open_shard(shard_id: u32, path: &Path, tuning: &ConnectionTuning) -> Result<Shard> {
    let open_err = |source| LitebeamError::ShardOpen { shard_id, source };

    let writer = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(open_err)?;
    apply_tuning(&writer, tuning).map_err(open_err)?;

    let reader = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(open_err)?;
    apply_read_tuning(&reader, tuning).map_err(open_err)?;

    tracing::trace!(shard_id, path = %path.display(), "opened shard handles");

    Ok(Shard::new(shard_id, path.to_path_buf(), writer, reader))
}

/// Create (or open, if it is already on disk) the physical file for a shard
pub fn create_shard_file(
    shard_id: u32,
    path: &Path,
    tuning: &ConnectionTuning,
) -> Result<Connection> {
    let create_err = |source| LitebeamError::ShardCreate { shard_id, source };

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(create_err)?;
    apply_tuning(&conn, tuning).map_err(create_err)?;

    Ok(conn)
}

/// Apply the full set of pragmas to a read-write connection
///
/// `journal_mode` is persistent in the file; the rest are per-connection.
pub fn apply_tuning(conn: &Connection, tuning: &ConnectionTuning) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(tuning.busy_timeout_ms))?;
    let _mode: String = conn.pragma_update_and_check(
        None,
        "journal_mode",
        tuning.journal_mode.pragma_value(),
        |row| row.get(0),
    )?;
    conn.pragma_update(None, "synchronous", tuning.synchronous.pragma_value())?;
    conn.pragma_update(None, "foreign_keys", tuning.foreign_keys)?;
    Ok(())
}

/// Apply the per-connection pragmas that make sense on a read-only handle
pub fn apply_read_tuning(conn: &Connection, tuning: &ConnectionTuning) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_millis(tuning.busy_timeout_ms))?;
    conn.pragma_update(None, "foreign_keys", tuning.foreign_keys)?;
    Ok(())
}
