use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Command-line and environment configuration for the server process.
///
/// Every flag also accepts its upper-cased name as an environment variable (`-a` / `ADDRESS`,
/// `-r` / `RESTORE`, etc.), matching the agent's configuration surface.
#[derive(Debug, Parser)]
#[command(name = "server", about = "Intakes, validates, and persists metrics reported by agents")]
pub struct Args {
    /// Address to listen on.
    #[arg(short = 'a', long = "address", env = "ADDRESS", default_value = "127.0.0.1:8080")]
    pub address: String,

    /// Restore the in-memory store from `store_file` on startup.
    #[arg(short = 'r', long = "restore", env = "RESTORE", default_value_t = false)]
    pub restore: bool,

    /// How often the in-memory store flushes to `store_file`. Zero selects synchronous mode
    /// (every successful Set flushes immediately).
    #[arg(short = 'i', long = "store-interval", env = "STORE_INTERVAL", default_value = "300s", value_parser = humantime_duration)]
    pub store_interval: Duration,

    /// Path to the in-memory store's snapshot file.
    #[arg(short = 'f', long = "store-file", env = "STORE_FILE", default_value = "/tmp/devops-metrics-db.json")]
    pub store_file: PathBuf,

    /// Shared key used to verify incoming metric hashes. Empty disables verification.
    #[arg(short = 'k', long = "key", env = "KEY", default_value = "")]
    pub key: String,

    /// Relational backend DSN. When set, the server uses the relational repository instead of
    /// the in-memory one.
    #[arg(short = 'd', long = "database-dsn", env = "DATABASE_DSN", default_value = "")]
    pub database_dsn: String,

    /// Enables debug-level logging.
    #[arg(long = "debug")]
    pub debug: bool,
}

fn humantime_duration(text: &str) -> Result<Duration, String> {
    humantime::parse_duration(text).map_err(|e| e.to_string())
}
