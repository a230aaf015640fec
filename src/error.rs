//! Error types for Litebeam
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using LitebeamError
pub type Result<T> = std::result::Result<T, LitebeamError>;

/// Boxed error returned by caller-supplied schema initializers
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for Litebeam operations
#[derive(Debug, Error)]
pub enum LitebeamError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Metadata Store Errors
    // -------------------------------------------------------------------------
    #[error("Metadata store error during {op}: {source}")]
    Metadata {
        op: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Shard {0} is not registered")]
    ShardNotFound(u32),

    // -------------------------------------------------------------------------
    // Shard Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open shard {shard_id}: {source}")]
    ShardOpen {
        shard_id: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to close shard {shard_id}: {source}")]
    ShardClose {
        shard_id: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to create storage for shard {shard_id}: {source}")]
    ShardCreate {
        shard_id: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Schema initialization failed for shard {shard_id}: {source}")]
    SchemaInit {
        shard_id: u32,
        #[source]
        source: BoxError,
    },

    #[error("Failed to register shard {shard_id}: {source}")]
    ShardRegister {
        shard_id: u32,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Shard limit reached: at most {max_shards} shards may exist")]
    ShardLimitReached { max_shards: u32 },
}

impl LitebeamError {
    /// Wrap a metadata store failure with the name of the operation
    pub(crate) fn metadata(op: &'static str, source: rusqlite::Error) -> Self {
        Self::Metadata { op, source }
    }

    /// True when the error is about an unknown shard identifier rather than
    /// an infrastructure failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ShardNotFound(_))
    }

    /// Shard identifier the error refers to, if any
    pub fn shard_id(&self) -> Option<u32> {
        match self {
            Self::ShardNotFound(id) => Some(*id),
            Self::ShardOpen { shard_id, .. }
            | Self::ShardClose { shard_id, .. }
            | Self::ShardCreate { shard_id, .. }
            | Self::SchemaInit { shard_id, .. }
            | Self::ShardRegister { shard_id, .. } => Some(*shard_id),
            _ => None,
        }
    }
}
