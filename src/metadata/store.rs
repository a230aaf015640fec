//! Metadata Store
//!
//! Owns the SQLite connections to `metadata.db`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};

use crate::config::ConnectionTuning;
use crate::error::{LitebeamError, Result};
use crate::shard::{apply_read_tuning, apply_tuning};

use super::{METADATA_FILENAME, SCHEMA};

/// Durable shard record store
///
/// ## Concurrency:
/// - `writer`: one read-write connection; every write unit holds its mutex
///   for the whole transaction
/// - `readers`: read-only pool, picked round-robin (an idle one is preferred)
/// - Logical consistency between reads and writes is the caller's job;
///   the `Sharder` wraps every call in its own `RwLock`
pub struct MetadataStore {
    /// Path to `metadata.db`
    path: PathBuf,

    /// The only connection that mutates the store
    writer: Mutex<Connection>,

    /// Read-only connections
    readers: Vec<Mutex<Connection>>,

    /// Round-robin cursor into `readers`
    next_reader: AtomicUsize,
}

impl MetadataStore {
    /// Open or create the store inside `base_path`
    ///
    /// On startup:
    /// 1. Open/create `metadata.db` with the configured tuning
    /// 2. Ensure the `shards` table exists
    /// 3. Open the read pool
    pub fn open(
        base_path: &Path,
        tuning: &ConnectionTuning,
        read_pool_size: usize,
    ) -> Result<Self> {
        let path = base_path.join(METADATA_FILENAME);

        let writer = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| LitebeamError::metadata("open metadata store", e))?;
        apply_tuning(&writer, tuning).map_err(|e| LitebeamError::metadata("tune connection", e))?;
        writer
            .execute_batch(SCHEMA)
            .map_err(|e| LitebeamError::metadata("create schema", e))?;

        let mut readers = Vec::with_capacity(read_pool_size.max(1));
        for _ in 0..read_pool_size.max(1) {
            let reader = Connection::open_with_flags(
                &path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| LitebeamError::metadata("open metadata reader", e))?;
            apply_read_tuning(&reader, tuning)
                .map_err(|e| LitebeamError::metadata("tune connection", e))?;
            readers.push(Mutex::new(reader));
        }

        tracing::debug!(path = %path.display(), readers = readers.len(), "metadata store open");

        Ok(Self {
            path,
            writer: Mutex::new(writer),
            readers,
            next_reader: AtomicUsize::new(0),
        })
    }

    /// Run `f` as one write unit
    ///
    /// The transaction commits only if `f` returns `Ok`. Any error rolls
    /// back every statement `f` executed.
    pub fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.writer.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| LitebeamError::metadata("begin transaction", e))?;

        // Dropping `tx` on the error path rolls back
        let value = f(&tx)?;

        tx.commit()
            .map_err(|e| LitebeamError::metadata("commit transaction", e))?;
        Ok(value)
    }

    /// Run a read-only query on a pooled connection
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let len = self.readers.len();
        let start = self.next_reader.fetch_add(1, Ordering::Relaxed) % len;

        for offset in 0..len {
            if let Some(conn) = self.readers[(start + offset) % len].try_lock() {
                return f(&conn);
            }
        }

        // Every reader is busy: wait on the one we were dealt
        let conn = self.readers[start].lock();
        f(&conn)
    }

    /// Close every connection, reporting the first failure
    pub fn close(self) -> Result<()> {
        let mut first_err = None;

        let connections = std::iter::once(self.writer)
            .chain(self.readers)
            .map(Mutex::into_inner);
        for conn in connections {
            if let Err((_, e)) = conn.close() {
                first_err.get_or_insert(LitebeamError::metadata("close metadata store", e));
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Path to `metadata.db`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pooled read connections
    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }
}
