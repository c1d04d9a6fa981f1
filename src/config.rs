//! Layered benchmark configuration.
//!
//! Sources merge in increasing priority: built-in defaults, then a
//! `vecbench.toml` file, then `VB_`-prefixed environment variables.
//! Nested fields use double underscores in the environment, e.g.
//! `VB_INDEX__N_PROBE=20`.

use crate::distance::{DistanceError, Metric};
use crate::lifecycle::LifecycleConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Top-level settings for a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Embedding dimension shared by every vector in a run.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Distance metric name, parsed by [`Settings::metric`].
    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,

    #[serde(default)]
    pub bench: BenchSettings,
}

/// IVF and search-shape parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    /// Number of coarse clusters.
    #[serde(default = "default_n_list")]
    pub n_list: usize,

    /// Clusters probed per query.
    #[serde(default = "default_n_probe")]
    pub n_probe: usize,

    /// Iteration cap for the coarse quantizer fit.
    #[serde(default = "default_kmeans_max_iterations")]
    pub kmeans_max_iterations: usize,

    /// Per-query candidate budget floor for lifecycle searches.
    #[serde(default = "default_search_budget")]
    pub search_budget: usize,
}

/// Tombstone and compaction behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    /// Tombstone count that triggers automatic compaction.
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: usize,
}

/// Measurement-run parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchSettings {
    /// Worker threads for batch operations; 0 uses all CPUs.
    #[serde(default)]
    pub worker_threads: usize,

    /// Seed for dataset generation and quantizer init.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_dimension() -> usize {
    128
}

fn default_metric() -> String {
    "euclidean".to_string()
}

fn default_n_list() -> usize {
    100
}

fn default_n_probe() -> usize {
    10
}

fn default_kmeans_max_iterations() -> usize {
    20
}

fn default_search_budget() -> usize {
    100
}

fn default_compaction_threshold() -> usize {
    5000
}

fn default_seed() -> u64 {
    42
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            metric: default_metric(),
            index: IndexSettings::default(),
            lifecycle: LifecycleSettings::default(),
            bench: BenchSettings::default(),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            n_list: default_n_list(),
            n_probe: default_n_probe(),
            kmeans_max_iterations: default_kmeans_max_iterations(),
            search_budget: default_search_budget(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            compaction_threshold: default_compaction_threshold(),
        }
    }
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            seed: default_seed(),
        }
    }
}

impl Settings {
    /// Loads configuration from all sources, `vecbench.toml` in the
    /// current directory being the file layer.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from("vecbench.toml")
    }

    /// Same layering with an explicit file path; the file may be absent.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nesting levels, single
            // underscore stays inside field names
            .merge(Env::prefixed("VB_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Parses the configured metric name.
    pub fn metric(&self) -> Result<Metric, DistanceError> {
        Metric::from_str(&self.metric)
    }

    /// Constructs an unbuilt IVF index from these settings.
    pub fn ivf_index(&self) -> Result<crate::index::IvfIndex, DistanceError> {
        Ok(
            crate::index::IvfIndex::new(self.index.n_list, self.index.n_probe, self.metric()?)
                .with_seed(self.bench.seed)
                .with_build_iterations(self.index.kmeans_max_iterations),
        )
    }

    /// Builds the batch executor these settings describe.
    pub fn batch_executor(
        &self,
    ) -> Result<crate::executor::BatchExecutor, crate::executor::ExecutorError> {
        crate::executor::BatchExecutor::with_threads(self.bench.worker_threads)
    }

    /// Lifecycle parameters in the form the index core takes them.
    #[must_use]
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            dimension: self.dimension,
            compaction_threshold: self.lifecycle.compaction_threshold,
            search_budget: self.index.search_budget,
        }
    }
}
