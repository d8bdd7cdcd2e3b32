use axum::http::StatusCode;
use axum::response::IntoResponse;
use metric_model::MetricError;

/// Wraps [`MetricError`] so it can be returned directly from axum handlers. The response body is
/// the plain error message, matching the rest of this surface's plain-text convention rather than
/// wrapping it in a JSON envelope.
pub struct AppError(pub MetricError);

impl From<MetricError> for AppError {
    fn from(e: MetricError) -> Self {
        AppError(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            MetricError::InvalidType(_) => StatusCode::NOT_IMPLEMENTED,
            MetricError::BadValue { .. } => StatusCode::BAD_REQUEST,
            MetricError::NotFound { .. } => StatusCode::NOT_FOUND,
            MetricError::InvalidHash(_) => StatusCode::BAD_REQUEST,
            MetricError::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MetricError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, self.0.to_string()).into_response()
    }
}
