//! Litebeam CLI
//!
//! Operator tool for inspecting and driving a shard directory.

use clap::{Parser, Subcommand};
use litebeam::{BalancingMode, Config, GenerationMode, Sharder};
use tracing_subscriber::{fmt, EnvFilter};

/// Litebeam CLI
#[derive(Parser, Debug)]
#[command(name = "litebeam-cli")]
#[command(about = "Assign items across single-writer SQLite shards")]
#[command(version)]
struct Args {
    /// Base directory holding metadata.db and the shard files
    #[arg(short, long, default_value = "./litebeam_data")]
    base_path: String,

    /// Preferred maximum items per shard
    #[arg(short, long, default_value = "1000")]
    soft_cap: u64,

    /// Maximum number of shards
    #[arg(short, long, default_value = "16")]
    max_shards: u32,

    /// Generation mode: on-startup | dynamic
    #[arg(short, long, default_value = "dynamic")]
    generation_mode: GenerationMode,

    /// Balancing mode: fill | round-robin
    #[arg(short = 'r', long, default_value = "fill")]
    balancing_mode: BalancingMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assign items and print the shard each one landed on
    Assign {
        /// How many items to assign
        #[arg(short, long, default_value = "1")]
        count: usize,
    },

    /// Release one item from a shard
    Remove {
        /// The shard to release from
        shard_id: u32,
    },

    /// Print the item count of one shard, or the total
    Count {
        /// Shard to inspect (omit for the total)
        shard_id: Option<u32>,
    },

    /// List every shard record
    Shards,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,litebeam=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("Litebeam CLI v{}", litebeam::VERSION);

    let config = Config::builder()
        .base_path(&args.base_path)
        .soft_cap(args.soft_cap)
        .max_shard_count(args.max_shards)
        .generation_mode(args.generation_mode)
        .balancing_mode(args.balancing_mode)
        .build();

    let sharder = match Sharder::open(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open sharder: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&sharder, args.command) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = sharder.close() {
        tracing::error!("Failed to close sharder: {}", e);
        std::process::exit(1);
    }
}

fn run(sharder: &Sharder, command: Commands) -> litebeam::Result<()> {
    match command {
        Commands::Assign { count } => {
            for _ in 0..count {
                println!("{}", sharder.assign_item()?);
            }
        }
        Commands::Remove { shard_id } => {
            sharder.remove_item(shard_id)?;
            match sharder.item_count(shard_id) {
                Ok(count) => println!("{}", count),
                // Removing from an unknown shard is a no-op; nothing to report
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Commands::Count { shard_id: Some(id) } => {
            println!("{}", sharder.item_count(id)?);
        }
        Commands::Count { shard_id: None } => {
            println!("{}", sharder.total_item_count()?);
        }
        Commands::Shards => {
            println!("{:<8} {:>10}  {:<19}  PATH", "SHARD", "ITEMS", "CREATED");
            for record in sharder.shards()? {
                println!(
                    "{:<8} {:>10}  {:<19}  {}",
                    record.shard_id,
                    record.item_count,
                    record.created_at,
                    record.storage_path.display()
                );
            }
        }
    }
    Ok(())
}
