use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use metric_model::{decode_metric, decode_metrics, encode_metric, Metric};
use repository::{validate_hash, Repository};

use crate::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub key: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/value/:kind/:name", get(get_value_plain))
        .route("/value", post(get_value_json))
        .route("/update/:kind/:name/:value", post(update_plain))
        .route("/update", post(update_json))
        .route("/updates", post(update_batch))
        .route("/ping", get(ping))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let metrics = state.repository.list().await?;
    let mut body = String::from("<html><body><ul>\n");
    for m in &metrics {
        let _ = writeln!(body, "<li>{} - {}</li>", m.name, m.to_text());
    }
    body.push_str("</ul></body></html>\n");
    Ok(Html(body))
}

async fn get_value_plain(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let requested = Metric::raw(&kind, name)?;
    let found = state.repository.get(requested).await?;
    Ok(found.to_text())
}

async fn get_value_json(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, AppError> {
    let requested = decode_metric(&body)?;
    validate_hash(&state.key, &requested)?;
    let found = state.repository.get(requested).await?;
    let encoded = encode_metric(&found)?;
    Ok(([(axum::http::header::CONTENT_TYPE, "application/json")], encoded))
}

async fn update_plain(
    State(state): State<AppState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mut metric = Metric::raw_with_value(&kind, name, &value)?;
    metric.set_hash(&state.key)?;
    state.repository.set(metric).await?;
    Ok(())
}

async fn update_json(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, AppError> {
    let metric = decode_metric(&body)?;
    state.repository.set(metric).await?;
    Ok(())
}

async fn update_batch(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, AppError> {
    let metrics = decode_metrics(&body)?;
    state.repository.set_batch(metrics).await?;
    Ok(())
}

async fn ping(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.repository.ping().await?;
    Ok(())
}
