//! # Litebeam
//!
//! Many single-writer SQLite files behind one elastically growing write target:
//! - Items (users, tenants) are assigned to exactly one shard
//! - Per-shard occupancy is tracked in a durable metadata store
//! - New shards are provisioned on demand up to a hard ceiling
//! - Fill-first or round-robin balancing
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Callers                              │
//! │                (many threads, Arc<Sharder>)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Sharder                               │
//! │     (RwLock: exclusive for assign/remove, shared for reads) │
//! └──────┬──────────────────────┬───────────────────────┬───────┘
//!        │                      │                       │
//!        ▼                      ▼                       ▼
//!  ┌───────────┐        ┌──────────────┐        ┌──────────────┐
//!  │ Balancer  │        │ Provisioner  │        │    Shard     │
//!  │  (pure)   │        │ (create+reg) │        │  (handles)   │
//!  └───────────┘        └──────┬───────┘        └──────┬───────┘
//!                              │                       │
//!                              ▼                       ▼
//!                      ┌──────────────┐        ┌──────────────┐
//!                      │ metadata.db  │        │ shard_N.db   │
//!                      │  (shards)    │        │  (caller)    │
//!                      └──────────────┘        └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod balancer;
pub mod metadata;
pub mod provision;
pub mod shard;
pub mod sharder;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LitebeamError, Result};
pub use config::{BalancingMode, Config, GenerationMode};
pub use metadata::ShardRecord;
pub use shard::Shard;
pub use sharder::Sharder;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Litebeam
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
