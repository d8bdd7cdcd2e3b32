use std::time::Duration;

use clap::Parser;

use crate::reporter::WireMode;

/// Default shutdown interval. Configuration-only: there is no flag or environment variable for
/// it, unlike every other setting here.
pub const DEFAULT_SHUTDOWN_INTERVAL: Duration = Duration::from_secs(500);

/// Command-line and environment configuration for the agent process.
///
/// Every flag also accepts its upper-cased name as an environment variable (`-a` / `ADDRESS`,
/// `-p` / `POLL_INTERVAL`, etc.), matching the server's configuration surface.
#[derive(Debug, Parser)]
#[command(name = "agent", about = "Samples runtime and host metrics and reports them to a server")]
pub struct Args {
    /// Address of the server to report to.
    #[arg(short = 'a', long = "address", env = "ADDRESS", default_value = "127.0.0.1:8080")]
    pub address: String,

    /// How often the sampler takes a new snapshot.
    #[arg(short = 'p', long = "poll-interval", env = "POLL_INTERVAL", default_value = "2s", value_parser = humantime_duration)]
    pub poll_interval: Duration,

    /// How often the reporter pushes the current snapshot.
    #[arg(short = 'r', long = "report-interval", env = "REPORT_INTERVAL", default_value = "10s", value_parser = humantime_duration)]
    pub report_interval: Duration,

    /// Shared key used to sign outgoing metrics. Empty disables signing.
    #[arg(short = 'k', long = "key", env = "KEY", default_value = "")]
    pub key: String,

    /// Wire shape used to push metrics: one plain-text POST per metric, one JSON POST per
    /// metric, or a single JSON batch POST per tick. Not part of the original's flag surface
    /// (there it's only a config-struct default), but it selects real, already-implemented
    /// reporter behavior, so it's exposed here rather than left unreachable.
    #[arg(long = "content-type", env = "CONTENT_TYPE", default_value = "plain", value_enum)]
    pub content_type: WireMode,

    /// Enables debug-level logging.
    #[arg(long = "debug")]
    pub debug: bool,
}

fn humantime_duration(text: &str) -> Result<Duration, String> {
    humantime::parse_duration(text).map_err(|e| e.to_string())
}
