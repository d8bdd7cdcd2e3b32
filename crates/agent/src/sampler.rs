use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use metric_model::{Kind, Metric};
use rand::Rng;
use tokio::sync::RwLock;

use crate::{host_probe, runtime_probe};

/// Publishes a full metric vector on every poll tick and exposes the latest one to the reporter.
///
/// The runtime probe and host probe run as two independent tasks that fan into a channel of
/// fixed arity 2; the sampler only replaces the published snapshot once both have reported in,
/// so a reporter tick can never observe a half-applied sample. `poll_count` is local,
/// process-lifetime cumulative state — it is not restored across restarts.
pub struct Sampler {
    snapshot: Arc<RwLock<Vec<Metric>>>,
    poll_count: AtomicI64,
}

impl Sampler {
    pub fn new() -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Vec::new())),
            poll_count: AtomicI64::new(0),
        }
    }

    pub fn snapshot_handle(&self) -> Arc<RwLock<Vec<Metric>>> {
        self.snapshot.clone()
    }

    /// Runs one poll tick: fans out to the two probes, waits for both, then atomically replaces
    /// the published snapshot under a write lock.
    pub async fn tick(&self) {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<Vec<Metric>>(2);

        let runtime_tx = tx.clone();
        tokio::spawn(async move {
            let metrics = runtime_probe::sample();
            if runtime_tx.send(metrics).await.is_err() {
                tracing::warn!("runtime probe result dropped, sampler channel closed");
            }
        });

        let host_tx = tx;
        tokio::spawn(async move {
            let metrics = host_probe::sample();
            if host_tx.send(metrics).await.is_err() {
                tracing::warn!("host probe result dropped, sampler channel closed");
            }
        });

        let mut combined = Vec::new();
        for _ in 0..2 {
            match rx.recv().await {
                Some(batch) => combined.extend(batch),
                None => tracing::warn!("sampler fan-in channel closed early"),
            }
        }

        combined.push(random_value());

        let sampled_this_tick = combined.len() as i64;
        let total_polls = self.poll_count.fetch_add(sampled_this_tick, Ordering::SeqCst) + sampled_this_tick;
        combined.push(Metric {
            name: "PollCount".to_owned(),
            kind: Kind::Counter,
            value: None,
            delta: Some(total_polls),
            hash: None,
        });

        *self.snapshot.write().await = combined;
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

fn random_value() -> Metric {
    Metric {
        name: "RandomValue".to_owned(),
        kind: Kind::Gauge,
        value: Some(rand::thread_rng().gen_range(0.0..1.0)),
        delta: None,
        hash: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tick_publishes_a_non_empty_snapshot_with_poll_count() {
        let sampler = Sampler::new();
        sampler.tick().await;

        let snapshot = sampler.snapshot_handle();
        let metrics = snapshot.read().await;
        assert!(metrics.iter().any(|m| m.name == "RandomValue"));
        assert!(metrics.iter().any(|m| m.name == "PollCount"));
    }

    #[tokio::test]
    async fn poll_count_increases_across_ticks() {
        let sampler = Sampler::new();
        sampler.tick().await;
        let first = poll_count_of(&sampler).await;

        sampler.tick().await;
        let second = poll_count_of(&sampler).await;

        assert!(second > first);
    }

    async fn poll_count_of(sampler: &Sampler) -> i64 {
        let snapshot = sampler.snapshot_handle();
        let metrics = snapshot.read().await;
        metrics
            .iter()
            .find(|m| m.name == "PollCount")
            .and_then(|m| m.delta)
            .unwrap()
    }
}
