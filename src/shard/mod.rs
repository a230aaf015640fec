//! Shard Module
//!
//! Runtime handles onto individual shard files.
//!
//! ## Responsibilities
//! - Derive deterministic file paths from shard identifiers
//! - Open independent writer/reader connections for a registered shard
//! - Apply connection tuning shared with the metadata store
//!
//! ## Layout
//! ```text
//! {base_path}/
//!   ├── metadata.db
//!   ├── shard_0.db
//!   ├── shard_0.db-wal   (while open in WAL mode)
//!   └── shard_1.db
//! ```
//!
//! A shard is single-writer: all writes go through [`Shard::writer`] and
//! SQLite serializes them per file. Any number of readers may run alongside.

mod factory;

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::error::{LitebeamError, Result};

pub use factory::{apply_read_tuning, apply_tuning, create_shard_file, open_shard};

const SHARD_FILE_PREFIX: &str = "shard_";
const SHARD_FILE_EXTENSION: &str = "db";

/// Open read/write handles for one shard
///
/// Owned by the caller once returned. Dropping it closes both connections.
pub struct Shard {
    shard_id: u32,
    path: PathBuf,
    writer: Connection,
    reader: Connection,
}

impl Shard {
    pub(crate) fn new(
        shard_id: u32,
        path: PathBuf,
        writer: Connection,
        reader: Connection,
    ) -> Self {
        Self {
            shard_id,
            path,
            writer,
            reader,
        }
    }

    pub fn shard_id(&self) -> u32 {
        self.shard_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The single write connection
    pub fn writer(&self) -> &Connection {
        &self.writer
    }

    /// Read-only connection
    pub fn reader(&self) -> &Connection {
        &self.reader
    }

    /// Begin an IMMEDIATE transaction on the writer
    ///
    /// Takes the file's write lock up front, so concurrent writers wait on
    /// the busy timeout instead of failing at commit.
    pub fn begin_write(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.writer.transaction_with_behavior(TransactionBehavior::Immediate)
    }

    /// Close both connections, reporting the first failure
    pub fn close(self) -> Result<()> {
        let shard_id = self.shard_id;
        let writer = self.writer.close().map_err(|(_, source)| LitebeamError::ShardClose {
            shard_id,
            source,
        });
        let reader = self.reader.close().map_err(|(_, source)| LitebeamError::ShardClose {
            shard_id,
            source,
        });
        writer.and(reader)
    }
}

impl std::fmt::Debug for Shard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shard")
            .field("shard_id", &self.shard_id)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Generate the file path for a shard with given ID
/// (base, 7) → "{base}/shard_7.db"
pub fn shard_path(base: &Path, shard_id: u32) -> PathBuf {
    base.join(format!(
        "{}{}.{}",
        SHARD_FILE_PREFIX, shard_id, SHARD_FILE_EXTENSION
    ))
}

/// Parse shard ID from filename
/// "shard_42.db" → Some(42)
pub fn parse_shard_id(path: &Path) -> Option<u32> {
    if path.extension()? != SHARD_FILE_EXTENSION {
        return None;
    }
    let name = path.file_stem()?.to_str()?;
    let id_str = name.strip_prefix(SHARD_FILE_PREFIX)?;
    id_str.parse().ok()
}
