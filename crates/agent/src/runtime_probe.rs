use metric_model::{Kind, Metric};

/// The fixed set of gauge names this probe reports every tick, mirroring a language runtime's
/// allocator telemetry. Rust has no garbage collector, so the GC-cycle-specific names
/// (`NumGC`, `NumForcedGC`, `PauseTotalNs`, `LastGC`, `GCCPUFraction`) are always reported as
/// zero rather than dropped, so downstream consumers expecting the full fixed shape still get it.
const GAUGE_NAMES: &[&str] = &[
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

/// Samples jemalloc's allocator statistics and maps them onto the fixed gauge name list above.
/// Stats that don't correspond to anything jemalloc tracks (the Go-GC-specific ones) are
/// reported as zero.
pub fn sample() -> Vec<Metric> {
    let stats = read_jemalloc_stats();

    let mut values = std::collections::HashMap::new();
    values.insert("Alloc", stats.allocated as f64);
    values.insert("TotalAlloc", stats.allocated as f64);
    values.insert("HeapAlloc", stats.allocated as f64);
    values.insert("HeapInuse", stats.active as f64);
    values.insert("HeapIdle", (stats.resident.saturating_sub(stats.active)) as f64);
    values.insert("HeapSys", stats.mapped as f64);
    values.insert("Sys", stats.mapped as f64);
    values.insert("OtherSys", stats.metadata as f64);
    values.insert("HeapReleased", stats.retained as f64);
    values.insert("MSpanSys", stats.metadata as f64);
    values.insert("MCacheSys", stats.metadata as f64);

    GAUGE_NAMES
        .iter()
        .map(|&name| {
            let value = values.get(name).copied().unwrap_or(0.0);
            gauge(name, value)
        })
        .collect()
}

fn gauge(name: &str, value: f64) -> Metric {
    Metric {
        name: name.to_owned(),
        kind: Kind::Gauge,
        value: Some(value),
        delta: None,
        hash: None,
    }
}

struct JemallocStats {
    allocated: u64,
    active: u64,
    metadata: u64,
    resident: u64,
    mapped: u64,
    retained: u64,
}

/// Refreshes jemalloc's internal epoch (required for the stat readers below to see current
/// values) and reads the handful of stats this probe maps onto gauge names. Logs and falls back
/// to all-zero stats on failure rather than failing the whole probe — a transient mallctl error
/// shouldn't drop the entire tick's runtime metrics.
fn read_jemalloc_stats() -> JemallocStats {
    match try_read_jemalloc_stats() {
        Ok(stats) => stats,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read jemalloc stats");
            JemallocStats {
                allocated: 0,
                active: 0,
                metadata: 0,
                resident: 0,
                mapped: 0,
                retained: 0,
            }
        }
    }
}

fn try_read_jemalloc_stats() -> Result<JemallocStats, jemalloc_ctl::Error> {
    jemalloc_ctl::epoch::advance()?;
    Ok(JemallocStats {
        allocated: jemalloc_ctl::stats::allocated::read()? as u64,
        active: jemalloc_ctl::stats::active::read()? as u64,
        metadata: jemalloc_ctl::stats::metadata::read()? as u64,
        resident: jemalloc_ctl::stats::resident::read()? as u64,
        mapped: jemalloc_ctl::stats::mapped::read()? as u64,
        retained: jemalloc_ctl::stats::retained::read()? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_reports_every_fixed_gauge_name() {
        let metrics = sample();
        assert_eq!(metrics.len(), GAUGE_NAMES.len());
        for name in GAUGE_NAMES {
            assert!(metrics.iter().any(|m| m.name == *name), "missing {name}");
        }
    }

    #[test]
    fn every_sampled_metric_is_a_gauge_with_a_value() {
        for m in sample() {
            assert_eq!(m.kind, Kind::Gauge);
            assert!(m.value.is_some());
        }
    }
}
