use std::net::SocketAddr;
use std::sync::Arc;

use repository::{InMemoryRepository, RelationalRepository, Repository};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::compression;
use crate::config::Args;
use crate::middleware;
use crate::routes::{self, AppState};

/// Builds the repository configured by `args`: relational when a DSN is present, in-memory
/// otherwise.
pub async fn build_repository(args: &Args) -> anyhow::Result<Arc<dyn Repository>> {
    if args.database_dsn.is_empty() {
        Ok(Arc::new(
            InMemoryRepository::new(
                args.key.clone(),
                Some(args.store_file.clone()),
                args.store_interval,
                args.restore,
            )
            .await,
        ))
    } else {
        Ok(Arc::new(
            RelationalRepository::connect(&args.database_dsn, args.key.clone()).await?,
        ))
    }
}

/// Assembles the router with the full middleware stack, in the required outer-to-inner order:
/// panic recovery, request id, real-ip, request log, response compression.
pub fn app(repository: Arc<dyn Repository>, key: String) -> axum::Router {
    let state = AppState { repository, key };
    let request_id_header = axum::http::HeaderName::from_static("x-request-id");

    routes::router(state).layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::new())
            .layer(SetRequestIdLayer::new(
                request_id_header.clone(),
                MakeRequestUuid,
            ))
            .layer(PropagateRequestIdLayer::new(request_id_header))
            .layer(axum::middleware::from_fn(middleware::real_ip))
            .layer(TraceLayer::new_for_http())
            .layer(compression::layer()),
    )
}

/// Runs the server until a shutdown signal is received, then flushes the repository.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let repository = build_repository(&args).await?;
    let app = app(repository.clone(), args.key.clone())
        .into_make_service_with_connect_info::<SocketAddr>();

    let addr: SocketAddr = args.address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(address = %args.address, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    repository.close().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to install ctrl-c handler");
    }
    tracing::info!("received interrupt, shutting down");
}
