use std::sync::Arc;
use std::time::Duration;

use exponential_backoff::Backoff;
use metric_model::Metric;
use tokio::sync::RwLock;

/// Selects which HTTP shape the reporter uses to push metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WireMode {
    /// One `POST /update/<kind>/<name>/<value>` per metric, `text/plain`.
    #[value(name = "plain")]
    PlainPerMetric,
    /// One `POST /update` per metric, JSON body.
    #[value(name = "json")]
    JsonPerMetric,
    /// One `POST /updates` for the whole snapshot, JSON array body.
    #[value(name = "batch")]
    JsonBatch,
}

/// Pushes the current snapshot to the server on each report tick.
///
/// A tick takes a read lock on the snapshot for its entire duration — including retries — so
/// that a batch send never observes a sampler update mid-flight. This serializes reporting
/// against sampling in exchange for the simple invariant that a report is always of one
/// consistent, complete snapshot.
pub struct Reporter {
    client: reqwest::Client,
    address: String,
    key: String,
    mode: WireMode,
    snapshot: Arc<RwLock<Vec<Metric>>>,
}

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_MIN: Duration = Duration::from_secs(20);
const RETRY_MAX: Duration = Duration::from_secs(100);

impl Reporter {
    pub fn new(address: String, key: String, mode: WireMode, snapshot: Arc<RwLock<Vec<Metric>>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            address,
            key,
            mode,
            snapshot,
        }
    }

    /// Runs one report tick: signs every metric with the configured key, then sends according to
    /// the configured wire mode. Individual send failures are logged and the tick moves on —
    /// stale metrics get a fresh chance on the next tick rather than blocking the whole reporter.
    pub async fn tick(&self) {
        let metrics = self.snapshot.read().await;
        if metrics.is_empty() {
            return;
        }

        let signed: Vec<Metric> = metrics
            .iter()
            .cloned()
            .map(|mut m| {
                if let Err(e) = m.set_hash(&self.key) {
                    tracing::warn!(error = %e, metric = %m.name, "failed to sign metric");
                }
                m
            })
            .collect();

        match self.mode {
            WireMode::PlainPerMetric => {
                for metric in &signed {
                    if let Err(e) = self.send_plain(metric).await {
                        tracing::warn!(error = %e, metric = %metric.name, "failed to report metric");
                    }
                }
            }
            WireMode::JsonPerMetric => {
                for metric in &signed {
                    if let Err(e) = self.send_json_one(metric).await {
                        tracing::warn!(error = %e, metric = %metric.name, "failed to report metric");
                    }
                }
            }
            WireMode::JsonBatch => {
                if let Err(e) = self.send_json_batch(&signed).await {
                    tracing::warn!(error = %e, "failed to report metric batch");
                }
            }
        }
    }

    async fn send_plain(&self, metric: &Metric) -> anyhow::Result<()> {
        let url = format!(
            "http://{}/update/{}/{}/{}",
            self.address,
            metric.kind,
            metric.name,
            metric.to_text(),
        );
        self.with_retry(|| {
            let client = self.client.clone();
            let url = url.clone();
            async move {
                client
                    .post(&url)
                    .header("Content-Type", "text/plain")
                    .send()
                    .await
            }
        })
        .await
    }

    async fn send_json_one(&self, metric: &Metric) -> anyhow::Result<()> {
        let url = format!("http://{}/update", self.address);
        self.with_retry(|| {
            let client = self.client.clone();
            let url = url.clone();
            let body = metric.clone();
            async move { client.post(&url).json(&body).send().await }
        })
        .await
    }

    async fn send_json_batch(&self, metrics: &[Metric]) -> anyhow::Result<()> {
        let url = format!("http://{}/updates", self.address);
        self.with_retry(|| {
            let client = self.client.clone();
            let url = url.clone();
            let body = metrics.to_vec();
            async move { client.post(&url).json(&body).send().await }
        })
        .await
    }

    /// Retries a send up to [`RETRY_ATTEMPTS`] times with jittered exponential backoff between
    /// attempts (20s initial wait, 100s cap), treating any transport error or non-2xx response
    /// as retriable. Exhausting retries surfaces the last error to the caller, which logs and
    /// moves on to the next metric or tick.
    async fn with_retry<F, Fut>(&self, mut send: F) -> anyhow::Result<()>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let backoff = Backoff::new(RETRY_ATTEMPTS, RETRY_MIN, Some(RETRY_MAX));
        let mut attempt: u32 = 0;

        loop {
            match send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => {
                    let status = resp.status();
                    attempt += 1;
                    match backoff.next(attempt) {
                        Some(wait) => tokio::time::sleep(wait).await,
                        None => anyhow::bail!("server responded with status {status}"),
                    }
                }
                Err(e) => {
                    attempt += 1;
                    match backoff.next(attempt) {
                        Some(wait) => tokio::time::sleep(wait).await,
                        None => return Err(e.into()),
                    }
                }
            }
        }
    }
}
