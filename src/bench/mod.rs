//! Benchmark measurement engine.
//!
//! Turns raw operation timings into percentile latencies, throughput,
//! recall, and degradation statistics. The engine emits structured
//! records only; human-readable presentation belongs to external
//! reporting sinks.

mod metrics;
mod recall;
mod runner;

use crate::clustering::ClusteringError;
use crate::distance::DistanceError;
use crate::index::BackendError;
use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub use metrics::{
    DeleteMetrics, InsertMetrics, MemorySink, Metrics, ReportSink, SearchDegradationMetrics,
    degradation_percent, percentile,
};
pub use recall::{live_filtered_recall, mean_recall, recall_at_k};
pub use runner::{
    BenchTarget, benchmark_deletes, benchmark_inserts, flat_lifecycle_target, measure_search_only,
    run, run_reported, search_degradation,
};

/// Any failure surfaced while driving a benchmark target.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error(
        "Ground truth has {ground_truth} entries for {queries} queries\nSuggestion: Provide one ground-truth list per query"
    )]
    GroundTruthMismatch { queries: usize, ground_truth: usize },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    #[error(transparent)]
    Distance(#[from] DistanceError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}
