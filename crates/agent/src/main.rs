mod config;
mod host_probe;
mod reporter;
mod runtime_probe;
mod sampler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cli_common::{init_logging, LogArgs, OrBail};
use clap::Parser;
use tokio::sync::Notify;

use config::{Args, DEFAULT_SHUTDOWN_INTERVAL};
use reporter::Reporter;
use sampler::Sampler;

#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&LogArgs::from_debug_flag(args.debug));
    tracing::debug!(?args, "agent starting");

    reqwest::Url::parse(&format!("http://{}", args.address)).or_bail("invalid server address");

    let sampler = Arc::new(Sampler::new());
    let reporter = Arc::new(Reporter::new(
        args.address.clone(),
        args.key.clone(),
        args.content_type,
        sampler.snapshot_handle(),
    ));

    let shutdown = Arc::new(Notify::new());
    let stopping = Arc::new(AtomicBool::new(false));

    tracing::info!(
        address = %args.address,
        poll_interval = ?args.poll_interval,
        report_interval = ?args.report_interval,
        content_type = ?args.content_type,
        "agent configured"
    );

    // Mirrors the original's `go s.collect()` running alongside `s.send()`: sampling and
    // reporting are independent tasks so a slow report (retrying under backoff) never stalls
    // polling, and shutdown is never blocked behind an in-flight tick.
    let sampler_task = tokio::spawn(run_sampler(
        sampler,
        args.poll_interval,
        shutdown.clone(),
        stopping.clone(),
    ));
    let reporter_task = tokio::spawn(run_reporter(
        reporter,
        args.report_interval,
        shutdown.clone(),
        stopping.clone(),
    ));

    let mut shutdown_timer = Box::pin(tokio::time::sleep(DEFAULT_SHUTDOWN_INTERVAL));
    tokio::select! {
        _ = &mut shutdown_timer => {
            tracing::info!("shutdown interval elapsed, exiting");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
        }
    }

    stopping.store(true, Ordering::SeqCst);
    shutdown.notify_waiters();
    let _ = tokio::join!(sampler_task, reporter_task);
}

/// Runs the poll ticker until shutdown. `stopping` is checked on every iteration so a shutdown
/// signal delivered while a tick is in flight is never missed by a `Notify` that already fired.
async fn run_sampler(
    sampler: Arc<Sampler>,
    poll_interval: Duration,
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        if stopping.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = ticker.tick() => sampler.tick().await,
            _ = shutdown.notified() => return,
        }
    }
}

/// Runs the report ticker until shutdown. Same `stopping`-flag-plus-`Notify` shape as
/// [`run_sampler`], so a shutdown arriving mid-tick (the reporter may be deep in a retry/backoff
/// wait) is still observed as soon as the current tick finishes rather than being lost.
async fn run_reporter(
    reporter: Arc<Reporter>,
    report_interval: Duration,
    shutdown: Arc<Notify>,
    stopping: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(report_interval);
    loop {
        if stopping.load(Ordering::SeqCst) {
            return;
        }
        tokio::select! {
            _ = ticker.tick() => reporter.tick().await,
            _ = shutdown.notified() => return,
        }
    }
}
