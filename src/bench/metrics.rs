//! Metric records and the order statistics behind them.

use serde::Serialize;

/// Order-statistic percentile over an ascending-sorted sample: the value
/// at index `floor(n * q)`, clamped to the last element. Deliberately not
/// interpolated, so exact numbers are reproducible.
#[must_use]
pub fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64) * q).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Relative change in percent: `(after - before) / before * 100`.
///
/// Positive means "got worse" for latency-like metrics; callers flip the
/// sign semantics for metrics where higher is better (recall).
#[must_use]
pub fn degradation_percent(before: f64, after: f64) -> f64 {
    if before == 0.0 {
        return 0.0;
    }
    (after - before) / before * 100.0
}

/// Converts sorted nanosecond latencies to P50/P95/P99 in microseconds.
pub(crate) fn latency_percentiles_us(sorted_ns: &[u64]) -> (f64, f64, f64) {
    (
        percentile(sorted_ns, 0.50) as f64 / 1000.0,
        percentile(sorted_ns, 0.95) as f64 / 1000.0,
        percentile(sorted_ns, 0.99) as f64 / 1000.0,
    )
}

/// Search benchmark record: build cost plus query latency, throughput,
/// and scan effort.
#[derive(Debug, Clone, Serialize)]
pub struct Metrics {
    pub build_time_ms: u64,
    /// Estimated raw embedding footprint of the built index.
    pub build_memory_bytes: u64,
    pub p50_latency_us: f64,
    pub p95_latency_us: f64,
    pub p99_latency_us: f64,
    pub throughput_qps: f64,
    /// Average distance computations per query.
    pub avg_distance_calculations: f64,
    /// Mean recall@k when ground truth was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
}

/// Insert benchmark record.
#[derive(Debug, Clone, Serialize)]
pub struct InsertMetrics {
    pub vectors_inserted: usize,
    pub total_time_ms: u64,
    pub p50_latency_us: f64,
    pub p95_latency_us: f64,
    pub p99_latency_us: f64,
    pub inserts_per_second: f64,
}

/// Delete benchmark record.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteMetrics {
    pub vectors_deleted: usize,
    pub total_time_ms: u64,
    pub p50_latency_us: f64,
    pub p95_latency_us: f64,
    pub p99_latency_us: f64,
    pub deletes_per_second: f64,
}

/// Paired before/after search measurements around a deletion wave.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDegradationMetrics {
    pub before: Metrics,
    pub after: Metrics,
    pub vectors_deleted: usize,
    pub delete_time_ms: u64,
}

impl SearchDegradationMetrics {
    /// P50 latency change in percent; positive means slower.
    #[must_use]
    pub fn latency_degradation_percent(&self) -> f64 {
        degradation_percent(self.before.p50_latency_us, self.after.p50_latency_us)
    }

    /// Recall change in percent when both sides measured recall;
    /// negative means recall dropped.
    #[must_use]
    pub fn recall_change_percent(&self) -> Option<f64> {
        match (self.before.recall, self.after.recall) {
            (Some(b), Some(a)) => Some(degradation_percent(b, a)),
            _ => None,
        }
    }
}

/// Receives structured metric records for external presentation. The
/// measurement engine never formats human-readable text itself.
pub trait ReportSink {
    fn on_search(&mut self, target: &str, metrics: &Metrics);
    fn on_insert(&mut self, _target: &str, _metrics: &InsertMetrics) {}
    fn on_delete(&mut self, _target: &str, _metrics: &DeleteMetrics) {}
    fn on_degradation(&mut self, _target: &str, _metrics: &SearchDegradationMetrics) {}
}

/// In-memory sink collecting every record it receives. Useful for tests
/// and for callers that post-process results themselves.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub search_records: Vec<(String, Metrics)>,
    pub insert_records: Vec<(String, InsertMetrics)>,
    pub delete_records: Vec<(String, DeleteMetrics)>,
    pub degradation_records: Vec<(String, SearchDegradationMetrics)>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReportSink for MemorySink {
    fn on_search(&mut self, target: &str, metrics: &Metrics) {
        self.search_records.push((target.to_string(), metrics.clone()));
    }

    fn on_insert(&mut self, target: &str, metrics: &InsertMetrics) {
        self.insert_records.push((target.to_string(), metrics.clone()));
    }

    fn on_delete(&mut self, target: &str, metrics: &DeleteMetrics) {
        self.delete_records.push((target.to_string(), metrics.clone()));
    }

    fn on_degradation(&mut self, target: &str, metrics: &SearchDegradationMetrics) {
        self.degradation_records
            .push((target.to_string(), metrics.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_order_statistic() {
        let sample: Vec<u64> = (1..=100).collect();
        // floor(100 * 0.50) = index 50 -> value 51
        assert_eq!(percentile(&sample, 0.50), 51);
        assert_eq!(percentile(&sample, 0.95), 96);
        assert_eq!(percentile(&sample, 0.99), 100);
        // q = 1.0 clamps to the last element
        assert_eq!(percentile(&sample, 1.0), 100);
    }

    #[test]
    fn test_percentile_edge_cases() {
        assert_eq!(percentile(&[], 0.5), 0);
        assert_eq!(percentile(&[7], 0.5), 7);
        assert_eq!(percentile(&[7], 0.99), 7);
    }

    #[test]
    fn test_percentiles_are_ordered() {
        let mut sample: Vec<u64> = vec![12, 3, 99, 4, 56, 7, 8, 23, 45, 1];
        sample.sort_unstable();
        let p50 = percentile(&sample, 0.50);
        let p95 = percentile(&sample, 0.95);
        let p99 = percentile(&sample, 0.99);
        assert!(p50 <= p95);
        assert!(p95 <= p99);
    }

    #[test]
    fn test_degradation_percent() {
        assert!((degradation_percent(100.0, 150.0) - 50.0).abs() < 1e-9);
        assert!((degradation_percent(100.0, 80.0) + 20.0).abs() < 1e-9);
        // Guard against division by zero
        assert_eq!(degradation_percent(0.0, 50.0), 0.0);
    }

    #[test]
    fn test_metrics_serialize() {
        let m = Metrics {
            build_time_ms: 12,
            build_memory_bytes: 4096,
            p50_latency_us: 10.0,
            p95_latency_us: 20.0,
            p99_latency_us: 30.0,
            throughput_qps: 1000.0,
            avg_distance_calculations: 64.0,
            recall: None,
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("build_time_ms"));
        // Absent recall is omitted, not serialized as null
        assert!(!json.contains("recall"));
    }

    #[test]
    fn test_memory_sink_collects() {
        let mut sink = MemorySink::new();
        let m = Metrics {
            build_time_ms: 0,
            build_memory_bytes: 0,
            p50_latency_us: 1.0,
            p95_latency_us: 2.0,
            p99_latency_us: 3.0,
            throughput_qps: 10.0,
            avg_distance_calculations: 5.0,
            recall: Some(0.9),
        };
        sink.on_search("flat", &m);
        assert_eq!(sink.search_records.len(), 1);
        assert_eq!(sink.search_records[0].0, "flat");
    }
}
