use cli_common::{init_logging, LogArgs, OrBail};
use clap::Parser;
use server::config::Args;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&LogArgs::from_debug_flag(args.debug));
    tracing::debug!(?args, "server starting");

    server::startup::run(args).await.or_bail("server exited");
}
