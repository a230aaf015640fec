//! Metadata Module
//!
//! The shard record store: single source of truth for shard identity,
//! location and occupancy.
//!
//! ## Responsibilities
//! - Create the `shards` table on first open
//! - Run write units inside one IMMEDIATE transaction
//! - Serve read-only queries from a small connection pool
//!
//! ## Schema
//! ```text
//! shards
//! ┌──────────┬──────────────┬────────────┬─────────────────────┐
//! │ shard_id │ storage_path │ item_count │ created_at          │
//! │ INT PK   │ TEXT UNIQUE  │ INT >= 0   │ TEXT (UTC, default) │
//! └──────────┴──────────────┴────────────┴─────────────────────┘
//! ```

mod queries;
mod store;

use std::path::PathBuf;

pub use queries::{
    decrement_item_count, find_record, increment_item_count, insert_record, item_count,
    list_records, max_shard_id, set_item_count, shard_count, total_item_count,
};
pub use store::MetadataStore;

/// File name of the metadata store inside the base directory
pub const METADATA_FILENAME: &str = "metadata.db";

pub(crate) const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS shards (
        shard_id     INTEGER PRIMARY KEY,
        storage_path TEXT    NOT NULL UNIQUE,
        item_count   INTEGER NOT NULL DEFAULT 0 CHECK (item_count >= 0),
        created_at   TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
";

/// One row of the `shards` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardRecord {
    pub shard_id: u32,
    pub storage_path: PathBuf,
    pub item_count: u64,
    /// UTC timestamp as written by SQLite (`YYYY-MM-DD HH:MM:SS`)
    pub created_at: String,
}
