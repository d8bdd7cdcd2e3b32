/// Errors that originate from the metric model or repository layer.
///
/// These live alongside the [`crate::Metric`] type (rather than with the HTTP handlers or the
/// repository implementations) so that both the server and the repositories can match on the
/// same set of variants without creating a dependency cycle.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("invalid metric type: {0}")]
    InvalidType(String),

    #[error("bad value for metric {name:?} ({kind}): {reason}")]
    BadValue {
        name: String,
        kind: &'static str,
        reason: String,
    },

    #[error("metric {name:?} ({kind}) not found")]
    NotFound { name: String, kind: &'static str },

    #[error("hash verification failed for metric {0:?}")]
    InvalidHash(String),

    #[error("backend error: {0}")]
    BackendError(String),

    #[error("transport error: {0}")]
    Transport(String),
}

pub type MetricResult<T> = Result<T, MetricError>;
