use std::time::Duration;

use async_trait::async_trait;
use metric_model::{Kind, Metric, MetricError, MetricResult};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use crate::repository::{validate_for_set, validate_hash, Repository};

const FLUSH_THRESHOLD: usize = 100;

/// SQL-backed storage. The unique constraint is on `name` alone, which can't represent a gauge
/// and a counter sharing one name, so every row is keyed by the composite `"<name>::<kind>"`
/// string instead of `name` directly.
fn storage_key(name: &str, kind: Kind) -> String {
    format!("{name}::{kind}")
}

/// A backend storing metrics in a SQL table, reachable over any `sqlx` SQLite connection string.
///
/// Writes from `set`/`set_batch` are buffered and flushed transactionally once the buffer
/// reaches [`FLUSH_THRESHOLD`] or `close` is called, trading a small window of durability for
/// fewer round trips under sustained load.
pub struct RelationalRepository {
    pool: SqlitePool,
    key: String,
    buffer: Mutex<Vec<Metric>>,
}

impl RelationalRepository {
    /// Connects to `dsn`, creating the `metrics` table if it doesn't already exist. Schema
    /// creation is idempotent so repeated starts against the same database are harmless.
    pub async fn connect(dsn: &str, key: String) -> MetricResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(dsn)
            .await
            .map_err(|e| MetricError::BackendError(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metrics (
                storage_key TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                kind        TEXT NOT NULL,
                value       REAL,
                delta       INTEGER
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| MetricError::BackendError(e.to_string()))?;

        Ok(Self {
            pool,
            key,
            buffer: Mutex::new(Vec::with_capacity(FLUSH_THRESHOLD)),
        })
    }

    async fn flush_locked(&self, buffer: &mut Vec<Metric>) -> MetricResult<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MetricError::BackendError(e.to_string()))?;

        for metric in buffer.drain(..) {
            upsert(&mut tx, &metric)
                .await
                .map_err(|e| MetricError::BackendError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| MetricError::BackendError(e.to_string()))?;
        Ok(())
    }
}

async fn upsert(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    metric: &Metric,
) -> Result<(), sqlx::Error> {
    let key = storage_key(&metric.name, metric.kind);
    sqlx::query(
        "INSERT INTO metrics (storage_key, name, kind, value, delta)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(storage_key) DO UPDATE SET
             value = excluded.value,
             delta = metrics.delta + excluded.delta",
    )
    .bind(key)
    .bind(&metric.name)
    .bind(metric.kind.as_str())
    .bind(metric.value)
    .bind(metric.delta)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl Repository for RelationalRepository {
    async fn get(&self, mut metric: Metric) -> MetricResult<Metric> {
        {
            let mut buffer = self.buffer.lock().await;
            self.flush_locked(&mut buffer).await?;
        }

        let key = storage_key(&metric.name, metric.kind);
        let row = sqlx::query("SELECT value, delta FROM metrics WHERE storage_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MetricError::BackendError(e.to_string()))?
            .ok_or_else(|| MetricError::NotFound {
                name: metric.name.clone(),
                kind: metric.kind.as_str(),
            })?;

        match metric.kind {
            Kind::Gauge => metric.value = row.try_get("value").ok(),
            Kind::Counter => metric.delta = row.try_get("delta").ok(),
        }
        metric.set_hash(&self.key)?;
        Ok(metric)
    }

    async fn set(&self, metric: Metric) -> MetricResult<()> {
        validate_hash(&self.key, &metric)?;
        validate_for_set(&metric)?;

        let mut buffer = self.buffer.lock().await;
        buffer.push(metric);
        if buffer.len() >= FLUSH_THRESHOLD {
            self.flush_locked(&mut buffer).await?;
        }
        Ok(())
    }

    async fn set_batch(&self, metrics: Vec<Metric>) -> MetricResult<()> {
        for metric in &metrics {
            validate_hash(&self.key, metric)?;
            validate_for_set(metric)?;
        }

        let mut buffer = self.buffer.lock().await;
        buffer.extend(metrics);
        if buffer.len() >= FLUSH_THRESHOLD {
            self.flush_locked(&mut buffer).await?;
        }
        Ok(())
    }

    async fn list(&self) -> MetricResult<Vec<Metric>> {
        {
            let mut buffer = self.buffer.lock().await;
            self.flush_locked(&mut buffer).await?;
        }

        let rows = sqlx::query(
            "SELECT name, kind, value, delta FROM metrics ORDER BY kind DESC, name ASC",
        )
        .fetch_all(&self.pool)
            .await
            .map_err(|e| MetricError::BackendError(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(db_err)?;
            let kind_text: String = row.try_get("kind").map_err(db_err)?;
            let kind: Kind = kind_text.parse()?;
            let mut metric = Metric {
                name,
                kind,
                value: row.try_get("value").ok(),
                delta: row.try_get("delta").ok(),
                hash: None,
            };
            metric.set_hash(&self.key)?;
            out.push(metric);
        }
        Ok(out)
    }

    async fn ping(&self) -> MetricResult<()> {
        self.pool
            .acquire()
            .await
            .map(|_| ())
            .map_err(|e| MetricError::BackendError(e.to_string()))
    }

    async fn close(&self) -> MetricResult<()> {
        let mut buffer = self.buffer.lock().await;
        self.flush_locked(&mut buffer).await?;
        self.pool.close().await;
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> MetricError {
    MetricError::BackendError(e.to_string())
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

    async fn fresh() -> RelationalRepository {
        RelationalRepository::connect("sqlite::memory:", String::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn gauge_overwrites_and_counter_accumulates() {
        let repo = fresh().await;

        repo.set(metric_gauge("Alloc", 1.0)).await.unwrap();
        repo.set(metric_gauge("Alloc", 2.0)).await.unwrap();
        let got = repo.get(metric_gauge("Alloc", 0.0)).await.unwrap();
        assert_eq!(got.value, Some(2.0));

        repo.set(metric_counter("PollCount", 3)).await.unwrap();
        repo.set(metric_counter("PollCount", 4)).await.unwrap();
        let got = repo.get(metric_counter("PollCount", 0)).await.unwrap();
        assert_eq!(got.delta, Some(7));
    }

    #[tokio::test]
    async fn gauge_and_counter_with_the_same_name_are_independent() {
        let repo = fresh().await;
        repo.set(metric_gauge("Dup", 1.0)).await.unwrap();
        repo.set(metric_counter("Dup", 5)).await.unwrap();

        let gauge = repo.get(metric_gauge("Dup", 0.0)).await.unwrap();
        let counter = repo.get(metric_counter("Dup", 0)).await.unwrap();
        assert_eq!(gauge.value, Some(1.0));
        assert_eq!(counter.delta, Some(5));
    }

    #[tokio::test]
    async fn get_on_missing_metric_is_not_found() {
        let repo = fresh().await;
        let err = repo.get(metric_gauge("Missing", 0.0)).await.unwrap_err();
        assert!(matches!(err, MetricError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_flushes_the_buffer_first() {
        let repo = fresh().await;
        repo.set(metric_gauge("Alloc", 9.0)).await.unwrap();
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn close_flushes_pending_writes() {
        let repo = fresh().await;
        repo.set(metric_counter("PollCount", 1)).await.unwrap();
        repo.close().await.unwrap();
    }
}
