use async_trait::async_trait;
use metric_model::{Metric, MetricResult};

/// The capability set shared by every storage backend. There is no inheritance hierarchy here —
/// a constructor picks one of the two concrete variants based on configuration (relational when
/// a DSN is present, in-memory otherwise) and callers only ever see this trait.
///
/// Merge rules are identical across backends: gauges overwrite, counters accumulate
/// (`stored += delta`). A missing `value` on a gauge `set` or missing `delta` on a counter `set`
/// is a `BadValue` error, enforced by [`validate_for_set`] before a backend touches its state.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Populates `value`/`delta` for the metric's (name, kind) key. Sets `hash` on the result
    /// when a server key is configured. `NotFound` when absent, `InvalidType` when the kind is
    /// unknown (the latter can't actually happen once `Metric::raw` has already validated it).
    async fn get(&self, metric: Metric) -> MetricResult<Metric>;

    /// Validates the hash (if a server key is configured) and applies the kind-specific merge.
    async fn set(&self, metric: Metric) -> MetricResult<()>;

    /// Validates every metric, then applies them atomically where the backend supports it
    /// (relational, via a transaction), best-effort otherwise (in-memory).
    async fn set_batch(&self, metrics: Vec<Metric>) -> MetricResult<()>;

    /// A snapshot of every stored metric.
    async fn list(&self) -> MetricResult<Vec<Metric>>;

    /// Health check against the backing store.
    async fn ping(&self) -> MetricResult<()>;

    /// Flushes any pending state and releases resources. Idempotent.
    async fn close(&self) -> MetricResult<()>;
}

/// Validates that the metric carries the field its kind requires before a backend applies it.
/// Shared by every backend so the `BadValue` behavior can't drift between them.
pub fn validate_for_set(metric: &Metric) -> MetricResult<()> {
    use metric_model::{Kind, MetricError};

    match metric.kind {
        Kind::Gauge if metric.value.is_none() => Err(MetricError::BadValue {
            name: metric.name.clone(),
            kind: metric.kind.as_str(),
            reason: "missing value".to_owned(),
        }),
        Kind::Counter if metric.delta.is_none() => Err(MetricError::BadValue {
            name: metric.name.clone(),
            kind: metric.kind.as_str(),
            reason: "missing delta".to_owned(),
        }),
        _ => Ok(()),
    }
}

/// Validates the metric's hash against `key`, tolerant under the rules documented on
/// [`Metric::check_hash`].
pub fn validate_hash(key: &str, metric: &Metric) -> MetricResult<()> {
    use metric_model::MetricError;

    if metric.check_hash(key) {
        Ok(())
    } else {
        Err(MetricError::InvalidHash(metric.name.clone()))
    }
}
