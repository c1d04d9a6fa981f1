//! Drives benchmark targets and aggregates their measurements.
//!
//! Latency and throughput are measured in two separate passes by design:
//! warm-cache effects differ between the per-operation timing pass and
//! the tight throughput loop, and the two numbers must not conflate.

use crate::bench::metrics::{
    DeleteMetrics, InsertMetrics, Metrics, ReportSink, SearchDegradationMetrics,
    latency_percentiles_us,
};
use crate::bench::recall::recall_at_k;
use crate::bench::BenchError;
use crate::distance::Metric;
use crate::index::{FlatBackend, IvfIndex};
use crate::lifecycle::LifecycleIndex;
use crate::types::{QueryResult, Vector};
use std::time::Instant;
use tracing::info;

/// Queries used to warm the target before the full measurement pass.
const WARMUP_QUERIES: usize = 100;

/// Smaller warmup for repeated search-only measurements.
const SEARCH_ONLY_WARMUP: usize = 10;

/// A benchmarkable index. Mirrors the operations the measurement engine
/// drives; targets without native mutability document their `insert` and
/// `delete` as no-ops.
pub trait BenchTarget {
    fn name(&self) -> &'static str;

    fn build(&mut self, vectors: &[Vector]) -> Result<(), BenchError>;

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, BenchError>;

    fn insert(&self, vector: Vector) -> Result<(), BenchError>;

    fn delete(&self, id: &str) -> Result<(), BenchError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn distance_calculations(&self) -> u64 {
        0
    }

    fn reset_distance_calculations(&self) {}

    /// Estimated raw embedding footprint in bytes.
    fn memory_bytes(&self) -> u64 {
        0
    }
}

impl BenchTarget for IvfIndex {
    fn name(&self) -> &'static str {
        "ivf"
    }

    fn build(&mut self, vectors: &[Vector]) -> Result<(), BenchError> {
        IvfIndex::build(self, vectors)?;
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, BenchError> {
        Ok(IvfIndex::search(self, query, k)?)
    }

    // Static per build: mutation is a documented no-op for this backend
    fn insert(&self, _vector: Vector) -> Result<(), BenchError> {
        Ok(())
    }

    fn delete(&self, _id: &str) -> Result<(), BenchError> {
        Ok(())
    }

    fn len(&self) -> usize {
        IvfIndex::len(self)
    }

    fn distance_calculations(&self) -> u64 {
        IvfIndex::distance_calculations(self)
    }

    fn reset_distance_calculations(&self) {
        IvfIndex::reset_distance_calculations(self);
    }

    fn memory_bytes(&self) -> u64 {
        IvfIndex::memory_bytes(self)
    }
}

impl BenchTarget for LifecycleIndex<FlatBackend> {
    fn name(&self) -> &'static str {
        "lifecycle-flat"
    }

    fn build(&mut self, vectors: &[Vector]) -> Result<(), BenchError> {
        for v in vectors {
            LifecycleIndex::insert(self, v.clone())?;
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, BenchError> {
        Ok(LifecycleIndex::search(self, query, k)?)
    }

    fn insert(&self, vector: Vector) -> Result<(), BenchError> {
        LifecycleIndex::insert(self, vector)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), BenchError> {
        LifecycleIndex::delete(self, id)?;
        Ok(())
    }

    fn len(&self) -> usize {
        LifecycleIndex::len(self)
    }

    fn distance_calculations(&self) -> u64 {
        self.backend().distance_calculations()
    }

    fn reset_distance_calculations(&self) {
        self.backend().reset_distance_calculations();
    }

    fn memory_bytes(&self) -> u64 {
        self.backend().memory_bytes()
    }
}

/// Creates a lifecycle index over a flat backend sized for a dataset.
/// Convenience for benchmark setups and tests.
#[must_use]
pub fn flat_lifecycle_target(
    dimension: usize,
    metric: Metric,
    config: crate::lifecycle::LifecycleConfig,
) -> LifecycleIndex<FlatBackend> {
    LifecycleIndex::new(FlatBackend::new(dimension, metric), config)
}

/// Full search benchmark: timed build, warmup, latency pass, separate
/// throughput pass. Recall is measured when ground truth is supplied.
pub fn run<T: BenchTarget>(
    target: &mut T,
    base: &[Vector],
    queries: &[Vector],
    k: usize,
    ground_truth: Option<&[Vec<String>]>,
) -> Result<Metrics, BenchError> {
    info!(
        target = target.name(),
        n_base = base.len(),
        n_queries = queries.len(),
        k,
        "running search benchmark"
    );

    let build_start = Instant::now();
    target.build(base)?;
    let build_time_ms = build_start.elapsed().as_millis() as u64;
    let build_memory_bytes = target.memory_bytes();

    for q in queries.iter().take(WARMUP_QUERIES) {
        target.search(&q.embedding, k)?;
    }

    let (latencies, recall) = latency_pass(target, queries, k, ground_truth)?;
    let (p50, p95, p99) = latency_percentiles_us(&latencies);
    let avg_distance_calculations = if queries.is_empty() {
        0.0
    } else {
        target.distance_calculations() as f64 / queries.len() as f64
    };

    let throughput_qps = throughput_pass(target, queries, k)?;

    Ok(Metrics {
        build_time_ms,
        build_memory_bytes,
        p50_latency_us: p50,
        p95_latency_us: p95,
        p99_latency_us: p99,
        throughput_qps,
        avg_distance_calculations,
        recall,
    })
}

/// Like [`run`] but forwards the record to a reporting sink.
pub fn run_reported<T: BenchTarget>(
    target: &mut T,
    base: &[Vector],
    queries: &[Vector],
    k: usize,
    ground_truth: Option<&[Vec<String>]>,
    sink: &mut dyn ReportSink,
) -> Result<Metrics, BenchError> {
    let metrics = run(target, base, queries, k, ground_truth)?;
    sink.on_search(target.name(), &metrics);
    Ok(metrics)
}

/// Search measurement against an already-built target. Build fields are
/// zero.
pub fn measure_search_only<T: BenchTarget>(
    target: &T,
    queries: &[Vector],
    k: usize,
    ground_truth: Option<&[Vec<String>]>,
) -> Result<Metrics, BenchError> {
    for q in queries.iter().take(SEARCH_ONLY_WARMUP) {
        target.search(&q.embedding, k)?;
    }

    let (latencies, recall) = latency_pass(target, queries, k, ground_truth)?;
    let (p50, p95, p99) = latency_percentiles_us(&latencies);
    let avg_distance_calculations = if queries.is_empty() {
        0.0
    } else {
        target.distance_calculations() as f64 / queries.len() as f64
    };
    let throughput_qps = throughput_pass(target, queries, k)?;

    Ok(Metrics {
        build_time_ms: 0,
        build_memory_bytes: 0,
        p50_latency_us: p50,
        p95_latency_us: p95,
        p99_latency_us: p99,
        throughput_qps,
        avg_distance_calculations,
        recall,
    })
}

/// Times every insert individually, then derives percentiles and
/// throughput.
pub fn benchmark_inserts<T: BenchTarget>(
    target: &T,
    vectors: Vec<Vector>,
) -> Result<InsertMetrics, BenchError> {
    info!(target = target.name(), count = vectors.len(), "benchmarking inserts");
    let count = vectors.len();
    let mut latencies = Vec::with_capacity(count);

    let total_start = Instant::now();
    for vector in vectors {
        let start = Instant::now();
        target.insert(vector)?;
        latencies.push(start.elapsed().as_nanos() as u64);
    }
    let total_time_ms = total_start.elapsed().as_millis() as u64;

    latencies.sort_unstable();
    let (p50, p95, p99) = latency_percentiles_us(&latencies);
    let total_seconds = total_start.elapsed().as_secs_f64();
    let inserts_per_second = if total_seconds > 0.0 {
        count as f64 / total_seconds
    } else {
        0.0
    };

    Ok(InsertMetrics {
        vectors_inserted: count,
        total_time_ms,
        p50_latency_us: p50,
        p95_latency_us: p95,
        p99_latency_us: p99,
        inserts_per_second,
    })
}

/// Times every delete individually, then derives percentiles and
/// throughput.
pub fn benchmark_deletes<T: BenchTarget>(
    target: &T,
    ids: &[String],
) -> Result<DeleteMetrics, BenchError> {
    info!(target = target.name(), count = ids.len(), "benchmarking deletes");
    let mut latencies = Vec::with_capacity(ids.len());

    let total_start = Instant::now();
    for id in ids {
        let start = Instant::now();
        target.delete(id)?;
        latencies.push(start.elapsed().as_nanos() as u64);
    }
    let total_time_ms = total_start.elapsed().as_millis() as u64;

    latencies.sort_unstable();
    let (p50, p95, p99) = latency_percentiles_us(&latencies);
    let total_seconds = total_start.elapsed().as_secs_f64();
    let deletes_per_second = if total_seconds > 0.0 {
        ids.len() as f64 / total_seconds
    } else {
        0.0
    };

    Ok(DeleteMetrics {
        vectors_deleted: ids.len(),
        total_time_ms,
        p50_latency_us: p50,
        p95_latency_us: p95,
        p99_latency_us: p99,
        deletes_per_second,
    })
}

/// Measures search before a deletion wave, applies the deletions, and
/// measures search again.
pub fn search_degradation<T: BenchTarget>(
    target: &T,
    queries: &[Vector],
    k: usize,
    ids_to_delete: &[String],
    ground_truth: Option<&[Vec<String>]>,
) -> Result<SearchDegradationMetrics, BenchError> {
    info!(
        target = target.name(),
        deletions = ids_to_delete.len(),
        "measuring search degradation"
    );

    let before = measure_search_only(target, queries, k, ground_truth)?;

    let delete_start = Instant::now();
    for id in ids_to_delete {
        target.delete(id)?;
    }
    let delete_time_ms = delete_start.elapsed().as_millis() as u64;

    let after = measure_search_only(target, queries, k, ground_truth)?;

    Ok(SearchDegradationMetrics {
        before,
        after,
        vectors_deleted: ids_to_delete.len(),
        delete_time_ms,
    })
}

fn latency_pass<T: BenchTarget>(
    target: &T,
    queries: &[Vector],
    k: usize,
    ground_truth: Option<&[Vec<String>]>,
) -> Result<(Vec<u64>, Option<f64>), BenchError> {
    if let Some(gt) = ground_truth
        && gt.len() < queries.len()
    {
        return Err(BenchError::GroundTruthMismatch {
            queries: queries.len(),
            ground_truth: gt.len(),
        });
    }
    target.reset_distance_calculations();

    let mut latencies = Vec::with_capacity(queries.len());
    let mut recall_sum = 0.0;

    for (i, q) in queries.iter().enumerate() {
        let start = Instant::now();
        let results = target.search(&q.embedding, k)?;
        latencies.push(start.elapsed().as_nanos() as u64);

        if let Some(gt) = ground_truth {
            recall_sum += recall_at_k(&results, &gt[i], k);
        }
    }

    latencies.sort_unstable();
    let recall = ground_truth.map(|_| {
        if queries.is_empty() {
            0.0
        } else {
            recall_sum / queries.len() as f64
        }
    });
    Ok((latencies, recall))
}

fn throughput_pass<T: BenchTarget>(
    target: &T,
    queries: &[Vector],
    k: usize,
) -> Result<f64, BenchError> {
    let start = Instant::now();
    for q in queries {
        target.search(&q.embedding, k)?;
    }
    let seconds = start.elapsed().as_secs_f64();
    if seconds > 0.0 {
        Ok(queries.len() as f64 / seconds)
    } else {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::metrics::MemorySink;
    use crate::dataset::RandomVectorGenerator;
    use crate::lifecycle::LifecycleConfig;

    fn dataset(n: usize, dim: usize) -> Vec<Vector> {
        RandomVectorGenerator::new(42).generate(n, dim)
    }

    #[test]
    fn test_run_over_ivf() {
        let data = dataset(300, 16);
        let queries = dataset(20, 16);
        let mut index = IvfIndex::new(8, 3, Metric::Euclidean);

        let metrics = run(&mut index, &data, &queries, 10, None).unwrap();

        assert!(metrics.p50_latency_us <= metrics.p95_latency_us);
        assert!(metrics.p95_latency_us <= metrics.p99_latency_us);
        assert!(metrics.throughput_qps > 0.0);
        // Probe overhead plus candidates, bounded by the dataset size
        assert!(metrics.avg_distance_calculations >= 8.0);
        assert!(metrics.avg_distance_calculations <= (8 + 300) as f64);
        assert!(metrics.recall.is_none());
    }

    #[test]
    fn test_run_measures_recall_against_self_ground_truth() {
        let data = dataset(100, 8);
        let queries: Vec<Vector> = data.iter().take(10).cloned().collect();
        // Each query's true nearest neighbor is itself
        let gt: Vec<Vec<String>> = queries.iter().map(|q| vec![q.id.clone()]).collect();

        let mut target = flat_lifecycle_target(8, Metric::Euclidean, LifecycleConfig {
            dimension: 8,
            ..LifecycleConfig::default()
        });
        let metrics = run(&mut target, &data, &queries, 1, Some(&gt)).unwrap();
        let recall = metrics.recall.unwrap();
        assert!((recall - 1.0).abs() < 1e-9, "recall was {recall}");
    }

    #[test]
    fn test_benchmark_inserts_and_deletes() {
        let target = flat_lifecycle_target(4, Metric::Euclidean, LifecycleConfig {
            dimension: 4,
            ..LifecycleConfig::default()
        });
        let data = dataset(50, 4);
        let ids: Vec<String> = data.iter().map(|v| v.id.clone()).collect();

        let inserts = benchmark_inserts(&target, data).unwrap();
        assert_eq!(inserts.vectors_inserted, 50);
        assert!(inserts.p50_latency_us <= inserts.p99_latency_us);

        let deletes = benchmark_deletes(&target, &ids[..20]).unwrap();
        assert_eq!(deletes.vectors_deleted, 20);
        assert_eq!(target.len(), 30);
    }

    #[test]
    fn test_search_degradation_after_deletes() {
        let target = flat_lifecycle_target(4, Metric::Euclidean, LifecycleConfig {
            dimension: 4,
            ..LifecycleConfig::default()
        });
        let data = dataset(60, 4);
        let ids: Vec<String> = data.iter().map(|v| v.id.clone()).collect();
        for v in &data {
            BenchTarget::insert(&target, v.clone()).unwrap();
        }
        let queries = dataset(5, 4);

        let degradation =
            search_degradation(&target, &queries, 5, &ids[..30], None).unwrap();
        assert_eq!(degradation.vectors_deleted, 30);
        assert_eq!(target.len(), 30);
        // Both measurement sides carry ordered percentiles
        assert!(degradation.before.p50_latency_us <= degradation.before.p99_latency_us);
        assert!(degradation.after.p50_latency_us <= degradation.after.p99_latency_us);
    }

    #[test]
    fn test_short_ground_truth_is_an_error_not_a_panic() {
        let data = dataset(50, 4);
        let queries = dataset(5, 4);
        // One list for five queries
        let gt = vec![vec!["vec_0".to_string()]];
        let mut index = IvfIndex::new(4, 2, Metric::Euclidean);

        let err = run(&mut index, &data, &queries, 5, Some(&gt)).unwrap_err();
        assert!(matches!(
            err,
            BenchError::GroundTruthMismatch {
                queries: 5,
                ground_truth: 1
            }
        ));
    }

    #[test]
    fn test_run_reported_feeds_sink() {
        let data = dataset(50, 4);
        let queries = dataset(5, 4);
        let mut index = IvfIndex::new(4, 2, Metric::Euclidean);
        let mut sink = MemorySink::new();

        run_reported(&mut index, &data, &queries, 5, None, &mut sink).unwrap();
        assert_eq!(sink.search_records.len(), 1);
        assert_eq!(sink.search_records[0].0, "ivf");
    }
}
