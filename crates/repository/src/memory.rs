use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use metric_model::{Kind, Metric, MetricError, MetricResult};
use tokio::sync::Notify;

use crate::repository::{validate_for_set, validate_hash, Repository};
use crate::snapshot::{self, Snapshot};

type Gauges = Arc<RwLock<HashMap<String, f64>>>;
type Counters = Arc<RwLock<HashMap<String, i64>>>;

/// Two independently-locked maps, with optional snapshot-to-disk persistence.
///
/// Gauges and counters are touched independently by different handler paths, so splitting the
/// locks doubles read-side throughput without complicating the merge invariants: reads take a
/// shared lock, writes take exclusive, and the two maps never need to be locked together. Both
/// maps live behind an `Arc` so the background periodic-flush ticker can hold its own handle
/// without cloning the repository itself.
pub struct InMemoryRepository {
    gauges: Gauges,
    counters: Counters,
    key: String,
    store_file: Option<PathBuf>,
    sync_writes: bool,
    // Serializes the encode+truncate+write sequence so concurrent `set` calls in synchronous
    // mode can't interleave partial files.
    write_lock: tokio::sync::Mutex<()>,
    shutdown: Arc<Notify>,
    ticker: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl InMemoryRepository {
    /// Builds the repository, optionally restoring from `store_file` first. A restore failure
    /// is logged and treated as an empty starting state rather than a fatal error — the
    /// repository must still become operational even when the snapshot is missing or corrupt.
    ///
    /// `store_interval` of zero selects synchronous mode: every successful `set` writes the full
    /// snapshot before returning. A positive interval starts a background ticker that writes the
    /// full snapshot on that period instead.
    pub async fn new(
        key: String,
        store_file: Option<PathBuf>,
        store_interval: Duration,
        restore: bool,
    ) -> Self {
        let mut gauges = HashMap::new();
        let mut counters = HashMap::new();

        if restore {
            if let Some(path) = &store_file {
                match snapshot::read(path).await {
                    Ok(snapshot) => {
                        gauges = snapshot.gauge;
                        counters = snapshot.counter;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, path = %path.display(), "failed to restore snapshot, starting empty");
                    }
                }
            }
        }

        let repo = Self {
            gauges: Arc::new(RwLock::new(gauges)),
            counters: Arc::new(RwLock::new(counters)),
            key,
            store_file,
            sync_writes: store_interval.is_zero(),
            write_lock: tokio::sync::Mutex::new(()),
            shutdown: Arc::new(Notify::new()),
            ticker: std::sync::Mutex::new(None),
        };

        if !store_interval.is_zero() && repo.store_file.is_some() {
            repo.spawn_ticker(store_interval);
        }

        repo
    }

    fn spawn_ticker(&self, interval: Duration) {
        let shutdown = self.shutdown.clone();
        let path = self.store_file.clone().expect("checked by caller");
        let gauges = self.gauges.clone();
        let counters = self.counters.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let snap = Snapshot {
                            gauge: gauges.read().expect("gauge lock poisoned").clone(),
                            counter: counters.read().expect("counter lock poisoned").clone(),
                        };
                        if let Err(e) = snapshot::write(&path, &snap).await {
                            tracing::warn!(error = %e, "periodic snapshot write failed");
                        }
                    }
                    _ = shutdown.notified() => return,
                }
            }
        });

        *self.ticker.lock().expect("ticker lock poisoned") = Some(handle);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            gauge: self.gauges.read().expect("gauge lock poisoned").clone(),
            counter: self.counters.read().expect("counter lock poisoned").clone(),
        }
    }

    async fn write_snapshot_now(&self) -> std::io::Result<()> {
        let Some(path) = &self.store_file else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let snap = self.snapshot();
        snapshot::write(path, &snap).await
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get(&self, mut metric: Metric) -> MetricResult<Metric> {
        match metric.kind {
            Kind::Gauge => {
                let gauges = self.gauges.read().expect("gauge lock poisoned");
                let value = gauges
                    .get(&metric.name)
                    .copied()
                    .ok_or_else(|| MetricError::NotFound {
                        name: metric.name.clone(),
                        kind: metric.kind.as_str(),
                    })?;
                metric.value = Some(value);
            }
            Kind::Counter => {
                let counters = self.counters.read().expect("counter lock poisoned");
                let delta = counters
                    .get(&metric.name)
                    .copied()
                    .ok_or_else(|| MetricError::NotFound {
                        name: metric.name.clone(),
                        kind: metric.kind.as_str(),
                    })?;
                metric.delta = Some(delta);
            }
        }
        metric.set_hash(&self.key)?;
        Ok(metric)
    }

    async fn set(&self, metric: Metric) -> MetricResult<()> {
        validate_hash(&self.key, &metric)?;
        validate_for_set(&metric)?;

        match metric.kind {
            Kind::Gauge => {
                let mut gauges = self.gauges.write().expect("gauge lock poisoned");
                gauges.insert(metric.name.clone(), metric.value.expect("validated above"));
            }
            Kind::Counter => {
                let mut counters = self.counters.write().expect("counter lock poisoned");
                *counters.entry(metric.name.clone()).or_insert(0) +=
                    metric.delta.expect("validated above");
            }
        }

        if self.sync_writes {
            if let Err(e) = self.write_snapshot_now().await {
                tracing::warn!(error = %e, "synchronous snapshot write failed");
            }
        }
        Ok(())
    }

    async fn set_batch(&self, metrics: Vec<Metric>) -> MetricResult<()> {
        for metric in &metrics {
            validate_hash(&self.key, metric)?;
            validate_for_set(metric)?;
        }

        {
            let mut gauges = self.gauges.write().expect("gauge lock poisoned");
            let mut counters = self.counters.write().expect("counter lock poisoned");
            for metric in metrics {
                match metric.kind {
                    Kind::Gauge => {
                        gauges.insert(metric.name, metric.value.expect("validated above"));
                    }
                    Kind::Counter => {
                        *counters.entry(metric.name).or_insert(0) +=
                            metric.delta.expect("validated above");
                    }
                }
            }
        }

        if self.sync_writes {
            if let Err(e) = self.write_snapshot_now().await {
                tracing::warn!(error = %e, "synchronous snapshot write failed");
            }
        }
        Ok(())
    }

    async fn list(&self) -> MetricResult<Vec<Metric>> {
        let mut out = Vec::new();
        {
            let gauges = self.gauges.read().expect("gauge lock poisoned");
            for (name, value) in gauges.iter() {
                let mut m = Metric {
                    name: name.clone(),
                    kind: Kind::Gauge,
                    value: Some(*value),
                    delta: None,
                    hash: None,
                };
                m.set_hash(&self.key)?;
                out.push(m);
            }
        }
        {
            let counters = self.counters.read().expect("counter lock poisoned");
            for (name, delta) in counters.iter() {
                let mut m = Metric {
                    name: name.clone(),
                    kind: Kind::Counter,
                    value: None,
                    delta: Some(*delta),
                    hash: None,
                };
                m.set_hash(&self.key)?;
                out.push(m);
            }
        }
        Ok(out)
    }

    async fn ping(&self) -> MetricResult<()> {
        Ok(())
    }

    async fn close(&self) -> MetricResult<()> {
        self.shutdown.notify_waiters();
        let handle = self.ticker.lock().expect("ticker lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Err(e) = self.write_snapshot_now().await {
            tracing::warn!(error = %e, "final snapshot write on close failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_gauge(name: &str, value: f64) -> Metric {
        Metric {
            name: name.to_owned(),
            kind: Kind::Gauge,
            value: Some(value),
            delta: None,
            hash: None,
        }
    }

    fn metric_counter(name: &str, delta: i64) -> Metric {
        Metric {
            name: name.to_owned(),
            kind: Kind::Counter,
            value: None,
            delta: Some(delta),
            hash: None,
        }
    }

    #[tokio::test]
    async fn gauge_set_overwrites_and_counter_set_accumulates() {
        let repo = InMemoryRepository::new(String::new(), None, Duration::ZERO, false).await;

        repo.set(metric_gauge("Alloc", 1.0)).await.unwrap();
        repo.set(metric_gauge("Alloc", 2.0)).await.unwrap();
        let got = repo.get(metric_gauge("Alloc", 0.0)).await.unwrap();
        assert_eq!(got.value, Some(2.0));

        repo.set(metric_counter("PollCount", 1)).await.unwrap();
        repo.set(metric_counter("PollCount", 4)).await.unwrap();
        let got = repo.get(metric_counter("PollCount", 0)).await.unwrap();
        assert_eq!(got.delta, Some(5));
    }

    #[tokio::test]
    async fn get_on_missing_metric_is_not_found() {
        let repo = InMemoryRepository::new(String::new(), None, Duration::ZERO, false).await;
        let err = repo.get(metric_gauge("Missing", 0.0)).await.unwrap_err();
        assert!(matches!(err, MetricError::NotFound { .. }));
    }

    #[tokio::test]
    async fn set_with_missing_value_is_bad_value() {
        let repo = InMemoryRepository::new(String::new(), None, Duration::ZERO, false).await;
        let metric = Metric {
            name: "Alloc".to_owned(),
            kind: Kind::Gauge,
            value: None,
            delta: None,
            hash: None,
        };
        let err = repo.set(metric).await.unwrap_err();
        assert!(matches!(err, MetricError::BadValue { .. }));
    }

    #[tokio::test]
    async fn set_rejects_bad_hash_when_key_configured() {
        let repo = InMemoryRepository::new("secret".to_owned(), None, Duration::ZERO, false).await;
        let mut metric = metric_gauge("Alloc", 1.0);
        metric.hash = Some("not-the-right-hash".to_owned());
        let err = repo.set(metric).await.unwrap_err();
        assert!(matches!(err, MetricError::InvalidHash(_)));
    }

    #[tokio::test]
    async fn synchronous_mode_persists_across_a_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let repo = InMemoryRepository::new(
            String::new(),
            Some(path.clone()),
            Duration::ZERO,
            false,
        )
        .await;
        repo.set(metric_gauge("Alloc", 7.0)).await.unwrap();
        repo.close().await.unwrap();

        let restored =
            InMemoryRepository::new(String::new(), Some(path), Duration::ZERO, true).await;
        let got = restored.get(metric_gauge("Alloc", 0.0)).await.unwrap();
        assert_eq!(got.value, Some(7.0));
    }

    #[tokio::test]
    async fn list_includes_both_kinds() {
        let repo = InMemoryRepository::new(String::new(), None, Duration::ZERO, false).await;
        repo.set(metric_gauge("Alloc", 1.0)).await.unwrap();
        repo.set(metric_counter("PollCount", 3)).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
