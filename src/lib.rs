//! Dynamic ANN index lifecycle and benchmark engine.
//!
//! Builds approximate nearest neighbor indexes, drives insert, delete,
//! and search workloads against them, and measures how their behavior
//! degrades and recovers as the underlying data churns.
//!
//! The crate splits into three layers:
//!
//! - Index math: [`distance`] metrics, [`clustering`] for the k-means
//!   coarse quantizer, and the [`index`] backends (flat scan, IVF).
//! - Lifecycle: [`lifecycle`] manages the slot identity space,
//!   tombstones, and compaction on top of any backend; [`executor`]
//!   fans batches out across a worker pool.
//! - Measurement: [`bench`] runs workloads and produces percentile
//!   latencies, throughput, recall, and degradation records, over
//!   datasets from [`dataset`].
//!
//! [`config`] layers defaults, a TOML file, and environment variables
//! into one [`config::Settings`] for a run.

pub mod bench;
pub mod clustering;
pub mod config;
pub mod dataset;
pub mod distance;
pub mod executor;
pub mod index;
pub mod lifecycle;
pub mod types;

pub use bench::{BenchError, BenchTarget, Metrics};
pub use clustering::KMeans;
pub use config::Settings;
pub use distance::Metric;
pub use index::{AnnBackend, FlatBackend, IvfIndex};
pub use lifecycle::{LifecycleConfig, LifecycleIndex};
pub use types::{QueryResult, SlotId, Vector};

/// Installs a default `tracing` subscriber writing to stderr.
///
/// For benches and examples; safe to call more than once, later calls
/// keep the first subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .try_init();
}
