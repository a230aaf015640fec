//! Configuration for Litebeam
//!
//! Centralized configuration with sensible defaults. A `Config` is checked
//! once by [`Config::validate`] when a [`Sharder`](crate::Sharder) is opened
//! and is immutable afterwards.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use rusqlite::Connection;

use crate::error::{BoxError, LitebeamError, Result};

/// Main configuration for a Litebeam instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {base_path}/
    ///     ├── metadata.db      (shard record store)
    ///     ├── shard_0.db
    ///     └── shard_N.db
    pub base_path: PathBuf,

    /// Tuning applied to every SQLite connection (shards and metadata)
    pub tuning: ConnectionTuning,

    /// Number of read-only connections kept open against the metadata store
    pub read_pool_size: usize,

    // -------------------------------------------------------------------------
    // Sharding Configuration
    // -------------------------------------------------------------------------
    /// Preferred maximum items per shard before fill mode moves on
    pub soft_cap: u64,

    /// Hard ceiling on the number of shards
    pub max_shard_count: u32,

    /// When shard storage gets provisioned
    pub generation_mode: GenerationMode,

    /// How the next item's shard is chosen
    pub balancing_mode: BalancingMode,

    /// Optional hook run against every newly created shard file
    pub schema_init: Option<SchemaInit>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./litebeam_data"),
            tuning: ConnectionTuning::default(),
            read_pool_size: 4,
            soft_cap: 1000,
            max_shard_count: 16,
            generation_mode: GenerationMode::Dynamic,
            balancing_mode: BalancingMode::Fill,
            schema_init: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations that cannot produce a working sharder
    pub fn validate(&self) -> Result<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(LitebeamError::Config("base path must not be empty".to_string()));
        }
        // Shard paths are recorded as TEXT in metadata.db
        if self.base_path.to_str().is_none() {
            return Err(LitebeamError::Config(format!(
                "base path must be valid UTF-8: {}",
                self.base_path.display()
            )));
        }
        if self.soft_cap == 0 {
            return Err(LitebeamError::Config("soft cap must be greater than zero".to_string()));
        }
        if self.max_shard_count == 0 {
            return Err(LitebeamError::Config(
                "max shard count must be greater than zero".to_string(),
            ));
        }
        if self.read_pool_size == 0 {
            return Err(LitebeamError::Config(
                "read pool size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Modes
// =============================================================================

/// When shard storage is provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    /// Provision every shard up to `max_shard_count` when the sharder opens
    OnStartup,

    /// Provision shard 0 at open, the rest lazily as fill mode runs out of room
    Dynamic,
}

impl FromStr for GenerationMode {
    type Err = LitebeamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "on-startup" => Ok(Self::OnStartup),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(LitebeamError::Config(format!(
                "unrecognized generation mode '{}' (expected 'on-startup' or 'dynamic')",
                other
            ))),
        }
    }
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnStartup => f.write_str("on-startup"),
            Self::Dynamic => f.write_str("dynamic"),
        }
    }
}

/// Policy for choosing the shard that receives the next item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancingMode {
    /// Lowest shard id still under the soft cap
    Fill,

    /// Least-loaded shard, ignoring the soft cap
    RoundRobin,
}

impl FromStr for BalancingMode {
    type Err = LitebeamError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fill" => Ok(Self::Fill),
            "round-robin" => Ok(Self::RoundRobin),
            other => Err(LitebeamError::Config(format!(
                "unrecognized balancing mode '{}' (expected 'fill' or 'round-robin')",
                other
            ))),
        }
    }
}

impl fmt::Display for BalancingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => f.write_str("fill"),
            Self::RoundRobin => f.write_str("round-robin"),
        }
    }
}

// =============================================================================
// Connection Tuning
// =============================================================================

/// SQLite `journal_mode` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Wal,
    Delete,
    Truncate,
}

impl JournalMode {
    /// Returns the SQLite pragma value
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
        }
    }
}

impl FromStr for JournalMode {
    type Err = LitebeamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wal" => Ok(Self::Wal),
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            other => Err(LitebeamError::Config(format!("unrecognized journal mode '{}'", other))),
        }
    }
}

/// SQLite `synchronous` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Off,
    Normal,
    Full,
}

impl SyncMode {
    /// Returns the SQLite pragma value
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

impl FromStr for SyncMode {
    type Err = LitebeamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "normal" => Ok(Self::Normal),
            "full" => Ok(Self::Full),
            other => Err(LitebeamError::Config(format!("unrecognized sync mode '{}'", other))),
        }
    }
}

/// Pragmas applied to every connection Litebeam opens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTuning {
    pub journal_mode: JournalMode,
    pub synchronous: SyncMode,
    /// How long a connection waits on a locked database (milliseconds)
    pub busy_timeout_ms: u64,
    pub foreign_keys: bool,
}

impl Default for ConnectionTuning {
    fn default() -> Self {
        Self {
            journal_mode: JournalMode::Wal,
            synchronous: SyncMode::Normal,
            busy_timeout_ms: 5000,
            foreign_keys: true,
        }
    }
}

// =============================================================================
// Schema Initialization Hook
// =============================================================================

type SchemaInitFn = dyn Fn(&Connection) -> std::result::Result<(), BoxError> + Send + Sync;

/// Caller-supplied hook that prepares a freshly created shard file
///
/// Runs once per new shard, before the shard is registered. An error aborts
/// provisioning of that shard.
///
/// The hook must be idempotent (`CREATE TABLE IF NOT EXISTS`, not
/// `CREATE TABLE`): a `shard_<id>.db` left on disk without a record is
/// reused by the next attempt to provision that id, and the hook runs
/// against it again. A non-idempotent hook fails on every such retry.
#[derive(Clone)]
pub struct SchemaInit(Arc<SchemaInitFn>);

impl SchemaInit {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Connection) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Run the hook against a shard connection
    pub fn run(&self, conn: &Connection) -> std::result::Result<(), BoxError> {
        (self.0)(conn)
    }
}

impl fmt::Debug for SchemaInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SchemaInit(..)")
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the base directory (root for all storage)
    pub fn base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_path = path.into();
        self
    }

    /// Set the soft cap on items per shard
    pub fn soft_cap(mut self, cap: u64) -> Self {
        self.config.soft_cap = cap;
        self
    }

    /// Set the maximum number of shards
    pub fn max_shard_count(mut self, count: u32) -> Self {
        self.config.max_shard_count = count;
        self
    }

    /// Set the generation mode
    pub fn generation_mode(mut self, mode: GenerationMode) -> Self {
        self.config.generation_mode = mode;
        self
    }

    /// Set the balancing mode
    pub fn balancing_mode(mut self, mode: BalancingMode) -> Self {
        self.config.balancing_mode = mode;
        self
    }

    /// Install a schema initializer for new shards
    pub fn schema_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&Connection) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.config.schema_init = Some(SchemaInit::new(f));
        self
    }

    /// Set the connection tuning
    pub fn tuning(mut self, tuning: ConnectionTuning) -> Self {
        self.config.tuning = tuning;
        self
    }

    /// Set the busy timeout (in milliseconds)
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.tuning.busy_timeout_ms = ms;
        self
    }

    /// Set the metadata read pool size
    pub fn read_pool_size(mut self, size: usize) -> Self {
        self.config.read_pool_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
