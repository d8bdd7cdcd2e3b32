use metric_model::{Kind, Metric};
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// Samples total/free virtual memory and per-CPU utilization. Runs `System::new_with_specifics`
/// fresh on every call rather than keeping a long-lived `System` around — two refreshes a few
/// hundred milliseconds apart is what `sysinfo` needs to report a meaningful CPU delta, and the
/// poll interval is comfortably longer than that in practice.
pub fn sample() -> Vec<Metric> {
    let mut system = System::new_with_specifics(
        RefreshKind::new()
            .with_memory(sysinfo::MemoryRefreshKind::everything())
            .with_cpu(CpuRefreshKind::everything()),
    );
    system.refresh_memory();
    system.refresh_cpu();

    let mut metrics = vec![
        gauge("TotalMemory", system.total_memory() as f64),
        gauge("FreeMemory", system.free_memory() as f64),
    ];

    for (i, cpu) in system.cpus().iter().enumerate() {
        metrics.push(gauge(&format!("CPUutilization{}", i + 1), cpu.cpu_usage() as f64));
    }

    metrics
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_includes_memory_and_at_least_one_cpu() {
        let metrics = sample();
        assert!(metrics.iter().any(|m| m.name == "TotalMemory"));
        assert!(metrics.iter().any(|m| m.name == "FreeMemory"));
        assert!(metrics.iter().any(|m| m.name.starts_with("CPUutilization")));
        for m in &metrics {
            assert_eq!(m.kind, Kind::Gauge);
        }
    }

    #[test]
    fn cpu_gauges_are_numbered_from_one() {
        let metrics = sample();
        assert!(metrics.iter().any(|m| m.name == "CPUutilization1"));
    }
}
