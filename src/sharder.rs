//! Sharder Module
//!
//! The coordinator that ties the metadata store, balancer and provisioner
//! together.
//!
//! ## Responsibilities
//! - Validate configuration and run shard setup on open
//! - Assign items to shards, provisioning new shards on demand
//! - Keep occupancy counts linearizable under concurrent callers
//! - Hand out shard handles

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use rusqlite::Transaction;

use crate::balancer::{self, Balancer};
use crate::config::{Config, GenerationMode};
use crate::error::{LitebeamError, Result};
use crate::metadata::{self, MetadataStore, ShardRecord};
use crate::provision::{ProvisionedShard, Provisioner};
use crate::shard::{self, Shard};

/// Shard assignment coordinator
///
/// ## Concurrency Model: one RwLock per Sharder
///
/// - **Writes** (assign/remove/create): hold `state_lock` exclusively for the
///   whole find-decide-mutate sequence, including any provisioning. Each one
///   is a single metadata transaction that commits or rolls back as a unit.
///
/// - **Reads** (counts, paths, handles): hold `state_lock` shared only for
///   the metadata query. Handles are opened after the lock is released.
///
/// The lock lives in the instance, so independent sharders never contend.
pub struct Sharder {
    /// Validated configuration
    config: Config,

    /// Shard record store
    metadata: MetadataStore,

    /// Creates and registers shard storage
    provisioner: Provisioner,

    /// Picks the target shard for new items
    balancer: Balancer,

    /// Serializes metadata mutations against each other and against reads
    state_lock: RwLock<()>,
}

impl Sharder {
    /// Open or create a sharder with the given config
    ///
    /// On startup:
    /// 1. Validate config (nothing touches disk if this fails)
    /// 2. Create the base directory
    /// 3. Open the metadata store and ensure its schema
    /// 4. Provision shards according to the generation mode
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Reject bad config before creating any state
        config.validate()?;

        // Step 2: Create base directory if it doesn't exist
        fs::create_dir_all(&config.base_path)?;

        // Step 3: Open metadata store
        let metadata =
            MetadataStore::open(&config.base_path, &config.tuning, config.read_pool_size)?;

        let sharder = Self {
            provisioner: Provisioner::new(&config),
            balancer: Balancer::new(config.balancing_mode, config.soft_cap),
            metadata,
            config,
            state_lock: RwLock::new(()),
        };

        // Step 4: Shard setup
        sharder.setup_shards()?;
        sharder.report_unregistered_files()?;

        tracing::info!(
            base_path = %sharder.config.base_path.display(),
            shards = sharder.shard_count()?,
            generation = %sharder.config.generation_mode,
            balancing = %sharder.config.balancing_mode,
            "sharder ready"
        );

        Ok(sharder)
    }

    /// Assign one new item to a shard and return the shard's id
    ///
    /// Steps (one transaction, exclusive lock held throughout):
    /// 1. Ask the balancer for a shard with room
    /// 2. If none: provision `max(shard_id) + 1` with one item
    /// 3. If that would pass the shard ceiling: saturate the least-loaded shard
    pub fn assign_item(&self) -> Result<u32> {
        let _write_guard = self.state_lock.write();

        self.write_unit(|tx, provisioned| {
            let records = metadata::list_records(tx)?;

            // Step 1: Existing shard with room
            if let Some(shard_id) = self.balancer.select(&records) {
                metadata::increment_item_count(tx, shard_id)?;
                tracing::debug!(shard_id, "assigned item to existing shard");
                return Ok(shard_id);
            }

            let candidate = records
                .iter()
                .map(|r| r.shard_id)
                .max()
                .map_or(0, |id| id.saturating_add(1));

            // Step 3: Ceiling reached, overflow onto the least-loaded shard
            if candidate >= self.config.max_shard_count {
                let shard_id = balancer::least_loaded(&records).ok_or(
                    LitebeamError::ShardLimitReached {
                        max_shards: self.config.max_shard_count,
                    },
                )?;
                metadata::increment_item_count(tx, shard_id)?;
                tracing::warn!(
                    shard_id,
                    soft_cap = self.config.soft_cap,
                    max_shards = self.config.max_shard_count,
                    "all shards at soft cap and shard limit reached, saturating least-loaded shard"
                );
                return Ok(shard_id);
            }

            // Step 2: New shard takes the item
            let shard = self.provisioner.create_shard(tx, candidate)?;
            *provisioned = Some(shard);
            metadata::set_item_count(tx, candidate, 1)?;
            tracing::debug!(shard_id = candidate, "assigned item to new shard");
            Ok(candidate)
        })
    }

    /// Release one item from a shard
    ///
    /// Bookkeeping only: the count drops by one and never below zero. An
    /// unknown id or an empty shard is a silent no-op.
    pub fn remove_item(&self, shard_id: u32) -> Result<()> {
        let _write_guard = self.state_lock.write();

        let changed = self
            .metadata
            .write(|tx| metadata::decrement_item_count(tx, shard_id))?;

        if changed {
            tracing::debug!(shard_id, "removed item");
        } else {
            tracing::debug!(shard_id, "remove ignored: shard unknown or already empty");
        }
        Ok(())
    }

    /// Provision the next shard id explicitly
    ///
    /// Fails with `ShardLimitReached` once `max_shard_count` shards exist.
    pub fn create_next_shard(&self) -> Result<u32> {
        let _write_guard = self.state_lock.write();

        self.write_unit(|tx, provisioned| {
            let candidate = metadata::max_shard_id(tx)?.map_or(0, |id| id.saturating_add(1));
            let shard = self.provisioner.create_shard(tx, candidate)?;
            let shard_id = shard.shard_id;
            *provisioned = Some(shard);
            Ok(shard_id)
        })
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Item count of one shard; `ShardNotFound` for unknown ids
    pub fn item_count(&self, shard_id: u32) -> Result<u64> {
        let _read_guard = self.state_lock.read();
        self.metadata.read(|conn| metadata::item_count(conn, shard_id))
    }

    /// Sum of item counts across all shards
    pub fn total_item_count(&self) -> Result<u64> {
        let _read_guard = self.state_lock.read();
        self.metadata.read(metadata::total_item_count)
    }

    /// Number of registered shards
    pub fn shard_count(&self) -> Result<u32> {
        let _read_guard = self.state_lock.read();
        self.metadata.read(metadata::shard_count)
    }

    /// Snapshot of every shard record, ordered by id
    pub fn shards(&self) -> Result<Vec<ShardRecord>> {
        let _read_guard = self.state_lock.read();
        self.metadata.read(metadata::list_records)
    }

    /// Registered storage path of a shard
    pub fn shard_path(&self, shard_id: u32) -> Result<PathBuf> {
        let _read_guard = self.state_lock.read();
        self.metadata
            .read(|conn| metadata::find_record(conn, shard_id))?
            .map(|record| record.storage_path)
            .ok_or(LitebeamError::ShardNotFound(shard_id))
    }

    /// Open read/write handles for one shard
    pub fn shard_handle(&self, shard_id: u32) -> Result<Shard> {
        let path = self.shard_path(shard_id)?;
        shard::open_shard(shard_id, &path, &self.config.tuning)
    }

    /// Open handles for every registered shard, ordered by id
    pub fn all_shard_handles(&self) -> Result<Vec<Shard>> {
        self.shards()?
            .into_iter()
            .map(|record| {
                shard::open_shard(record.shard_id, &record.storage_path, &self.config.tuning)
            })
            .collect()
    }

    /// Close the metadata store
    ///
    /// Shard handles already returned to callers stay open.
    pub fn close(self) -> Result<()> {
        tracing::info!(base_path = %self.config.base_path.display(), "closing sharder");
        self.metadata.close()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the base directory path
    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    /// Get the metadata store path
    pub fn metadata_path(&self) -> &Path {
        self.metadata.path()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Run a metadata write unit that may provision a shard
    ///
    /// If the unit fails after provisioning, the record is rolled back with
    /// the transaction and the file it created is removed here.
    fn write_unit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>, &mut Option<ProvisionedShard>) -> Result<T>,
    {
        let mut provisioned = None;
        let result = self.metadata.write(|tx| f(tx, &mut provisioned));

        if let Err(e) = &result {
            if let Some(shard) = provisioned.filter(|p| p.created_file) {
                tracing::warn!(
                    shard_id = shard.shard_id,
                    error = %e,
                    "metadata unit failed after provisioning, removing shard file"
                );
                self.provisioner.discard(shard.shard_id, &shard.path);
            }
        }

        result
    }

    /// Provision shards for the configured generation mode
    fn setup_shards(&self) -> Result<()> {
        let _write_guard = self.state_lock.write();

        let existing = self.metadata.read(metadata::shard_count)?;
        let target = match self.config.generation_mode {
            GenerationMode::OnStartup => self.config.max_shard_count,
            GenerationMode::Dynamic => 1,
        };

        if existing >= target {
            tracing::debug!(existing, target, "shard setup: nothing to provision");
            return Ok(());
        }

        // One unit per shard: a failure keeps the shards already created
        for shard_id in 0..target {
            self.write_unit(|tx, provisioned| {
                let shard = self.provisioner.create_shard(tx, shard_id)?;
                *provisioned = Some(shard);
                Ok(())
            })?;
        }

        Ok(())
    }

    /// Warn about shard files with no record (left for manual recovery)
    fn report_unregistered_files(&self) -> Result<()> {
        let records = self.shards()?;
        for path in self.provisioner.unregistered_files(&records)? {
            tracing::warn!(path = %path.display(), "found shard file with no metadata record");
        }
        Ok(())
    }
}
