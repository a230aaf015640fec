//! Provisioner Module
//!
//! Creates shard storage and registers it as one unit.
//!
//! ## Steps for `create_shard(id)`
//! 1. Already registered → success, nothing to do
//! 2. Ceiling reached → `ShardLimitReached`
//! 3. Create `shard_<id>.db` with the configured tuning
//! 4. Run the schema initializer (if any)
//! 5. Insert the record (`item_count = 0`) in the caller's transaction
//!
//! No record is written before step 4 succeeds. If any step from 3 on fails,
//! a file created by this call is deleted again. A file that was already on
//! disk before the call is reused and never deleted; the schema initializer
//! runs against it again, so it has to be idempotent.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::config::{Config, ConnectionTuning, SchemaInit};
use crate::error::{LitebeamError, Result};
use crate::metadata::{self, ShardRecord};
use crate::shard::{self, create_shard_file};

/// SQLite sidecar files that may sit next to a shard file
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Outcome of a successful `create_shard`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedShard {
    pub shard_id: u32,
    pub path: PathBuf,
    /// False when the record already existed
    pub registered: bool,
    /// True when this call created the file on disk
    pub created_file: bool,
}

/// Creates and registers shard storage
pub struct Provisioner {
    base_path: PathBuf,
    max_shard_count: u32,
    tuning: ConnectionTuning,
    schema_init: Option<SchemaInit>,
}

impl Provisioner {
    pub fn new(config: &Config) -> Self {
        Self {
            base_path: config.base_path.clone(),
            max_shard_count: config.max_shard_count,
            tuning: config.tuning,
            schema_init: config.schema_init.clone(),
        }
    }

    /// Provision `shard_id`, registering it through `conn`
    ///
    /// `conn` is expected to be an open write transaction on the metadata
    /// store. The record only becomes durable when that transaction commits;
    /// if it does not, call [`Provisioner::discard`] for a shard whose
    /// `created_file` is set.
    pub fn create_shard(&self, conn: &Connection, shard_id: u32) -> Result<ProvisionedShard> {
        if let Some(existing) = metadata::find_record(conn, shard_id)? {
            tracing::debug!(shard_id, "shard already registered, skipping creation");
            return Ok(ProvisionedShard {
                shard_id,
                path: existing.storage_path,
                registered: false,
                created_file: false,
            });
        }

        if shard_id >= self.max_shard_count
            || metadata::shard_count(conn)? >= self.max_shard_count
        {
            return Err(LitebeamError::ShardLimitReached {
                max_shards: self.max_shard_count,
            });
        }

        let path = shard::shard_path(&self.base_path, shard_id);
        let created_file = !path.exists();
        if !created_file {
            tracing::warn!(
                shard_id,
                path = %path.display(),
                "reusing unregistered shard file, schema initializer runs again"
            );
        }

        let result = self.prepare_file(shard_id, &path).and_then(|()| {
            metadata::insert_record(conn, shard_id, &path)
                .map_err(|source| LitebeamError::ShardRegister { shard_id, source })
        });

        if let Err(e) = result {
            if created_file {
                self.discard(shard_id, &path);
            }
            return Err(e);
        }

        tracing::info!(shard_id, path = %path.display(), "provisioned shard");

        Ok(ProvisionedShard {
            shard_id,
            path,
            registered: true,
            created_file,
        })
    }

    /// Best-effort removal of a shard file and its SQLite sidecars
    pub fn discard(&self, shard_id: u32, path: &Path) {
        let sidecars = SIDECAR_SUFFIXES.iter().map(|suffix| {
            let mut name = OsString::from(path.as_os_str());
            name.push(suffix);
            PathBuf::from(name)
        });

        for file in std::iter::once(path.to_path_buf()).chain(sidecars) {
            match fs::remove_file(&file) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::error!(
                        shard_id,
                        path = %file.display(),
                        error = %e,
                        "failed to remove orphaned shard file"
                    );
                }
            }
        }

        tracing::debug!(shard_id, path = %path.display(), "discarded shard storage");
    }

    /// Shard files in the base directory that have no record
    pub fn unregistered_files(&self, records: &[ShardRecord]) -> Result<Vec<PathBuf>> {
        let registered: HashSet<u32> = records.iter().map(|r| r.shard_id).collect();

        let mut orphans = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if let Some(id) = shard::parse_shard_id(&file_path) {
                if !registered.contains(&id) {
                    orphans.push(file_path);
                }
            }
        }

        orphans.sort();
        Ok(orphans)
    }

    pub fn max_shard_count(&self) -> u32 {
        self.max_shard_count
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Create the file and run the initializer, then close the connection
    fn prepare_file(&self, shard_id: u32, path: &Path) -> Result<()> {
        let conn = create_shard_file(shard_id, path, &self.tuning)?;

        if let Some(init) = &self.schema_init {
            init.run(&conn)
                .map_err(|source| LitebeamError::SchemaInit { shard_id, source })?;
        }

        conn.close()
            .map_err(|(_, source)| LitebeamError::ShardCreate { shard_id, source })
    }
}
