//! Inverted-file (IVF) search backend.
//!
//! Coarse quantization via k-means, then per-cluster exhaustive ranking:
//! `search` probes the `n_probe` nearest centroids and brute-forces every
//! member of those clusters against the query. The vector set is static
//! per build, so `insert`/`delete` are documented no-ops; callers needing
//! mutability run the lifecycle core over a mutable backend instead.

use crate::clustering::{ClusteringError, FitStats, KMeans};
use crate::distance::{DistanceError, Metric};
use crate::types::{QueryResult, Vector};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// K-means iteration budget used at build time.
const BUILD_ITERATIONS: usize = 20;

/// IVF index: k-means centroids plus one inverted list per cluster.
#[derive(Debug)]
pub struct IvfIndex {
    n_list: usize,
    n_probe: usize,
    metric: Metric,
    seed: u64,
    build_iterations: usize,
    kmeans: Option<KMeans>,
    lists: Vec<Vec<usize>>,
    vectors: Vec<Vector>,
    distance_calcs: AtomicU64,
}

impl IvfIndex {
    #[must_use]
    pub fn new(n_list: usize, n_probe: usize, metric: Metric) -> Self {
        Self {
            n_list,
            n_probe,
            metric,
            seed: 42,
            build_iterations: BUILD_ITERATIONS,
            kmeans: None,
            lists: Vec::new(),
            vectors: Vec::new(),
            distance_calcs: AtomicU64::new(0),
        }
    }

    /// Overrides the clustering seed (default 42).
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Overrides the k-means iteration budget (default 20).
    #[must_use]
    pub fn with_build_iterations(mut self, iterations: usize) -> Self {
        self.build_iterations = iterations;
        self
    }

    /// Fits the clusterer and populates the inverted lists.
    ///
    /// Assignment cost is O(n * n_list * dimension) on top of the
    /// clustering itself. Centroids are frozen once this returns.
    pub fn build(&mut self, vectors: &[Vector]) -> Result<FitStats, ClusteringError> {
        if vectors.is_empty() {
            return Err(ClusteringError::EmptyDataset);
        }
        info!(
            n_list = self.n_list,
            n_probe = self.n_probe,
            n_vectors = vectors.len(),
            "building IVF index"
        );

        let mut kmeans = KMeans::new(self.n_list, self.build_iterations, self.seed);
        let stats = kmeans.fit(vectors)?;

        self.vectors = vectors.to_vec();
        self.lists = vec![Vec::new(); self.n_list];
        for (i, v) in self.vectors.iter().enumerate() {
            let cluster = kmeans.nearest_centroid(&v.embedding);
            self.lists[cluster].push(i);
        }
        self.kmeans = Some(kmeans);

        self.log_cluster_statistics();
        Ok(stats)
    }

    /// Probes the nearest `n_probe` clusters and ranks their members.
    ///
    /// Returns up to `k` results sorted ascending by distance. Searching
    /// an unbuilt index returns an empty list; that is a caller state,
    /// not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, DistanceError> {
        let Some(kmeans) = &self.kmeans else {
            return Ok(Vec::new());
        };
        let dimension = self.vectors[0].dimension();
        if query.len() != dimension {
            return Err(DistanceError::DimensionMismatch {
                left: query.len(),
                right: dimension,
            });
        }

        // Coarse probe scores every centroid once
        let probed = kmeans.nearest_centroids(query, self.n_probe);
        self.distance_calcs
            .fetch_add(self.n_list as u64, Ordering::Relaxed);

        let mut candidates: Vec<QueryResult> = Vec::new();
        for cluster in probed {
            for &vi in &self.lists[cluster] {
                let v = &self.vectors[vi];
                let distance = self.metric.distance_raw(query, &v.embedding);
                self.distance_calcs.fetch_add(1, Ordering::Relaxed);
                candidates.push(QueryResult::new(v.id.clone(), distance));
            }
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates.truncate(k);
        Ok(candidates)
    }

    /// Number of indexed vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Total distance computations since the last reset: one per centroid
    /// probed plus one per candidate scored.
    pub fn distance_calculations(&self) -> u64 {
        self.distance_calcs.load(Ordering::Relaxed)
    }

    pub fn reset_distance_calculations(&self) {
        self.distance_calcs.store(0, Ordering::Relaxed);
    }

    /// Estimated bytes held by indexed embeddings.
    #[must_use]
    pub fn memory_bytes(&self) -> u64 {
        self.vectors
            .iter()
            .map(|v| (v.dimension() * size_of::<f32>()) as u64)
            .sum()
    }

    fn log_cluster_statistics(&self) {
        let sizes: Vec<usize> = self.lists.iter().map(Vec::len).collect();
        let empty = sizes.iter().filter(|&&s| s == 0).count();
        let min = sizes.iter().min().copied().unwrap_or(0);
        let max = sizes.iter().max().copied().unwrap_or(0);
        let avg = self.vectors.len() as f64 / self.n_list as f64;
        debug!(
            avg_cluster_size = avg,
            min_cluster_size = min,
            max_cluster_size = max,
            empty_clusters = empty,
            "IVF cluster statistics"
        );
    }
}
