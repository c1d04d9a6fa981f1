//! K-means clustering for IVF coarse quantization.
//!
//! A plain Lloyd's iteration with seeded random initialization:
//! - Initialization: uniformly sample `n_clusters` distinct vectors from
//!   the dataset (seeded `StdRng` for reproducibility) and copy their
//!   embeddings. Centroids never alias source vectors, so deleting a
//!   vector later cannot mutate a centroid.
//! - Assignment: nearest centroid by Euclidean distance, ties broken by
//!   lowest cluster index.
//! - Update: coordinate-wise mean of assigned members. Empty clusters
//!   retain their previous centroid verbatim; this can leave a cluster
//!   chronically empty, which is reported as a statistic, not an error.
//! - Convergence: stop early once no centroid moved more than
//!   [`CONVERGENCE_THRESHOLD`] after at least [`MIN_ITERATIONS`]
//!   iterations, bounded by the configured maximum.

use crate::distance::l2_sq;
use crate::types::Vector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;
use tracing::{debug, info};

/// Maximum centroid movement (Euclidean) still considered converged.
pub const CONVERGENCE_THRESHOLD: f32 = 0.01;

/// Iterations that must complete before the early-stop test applies.
pub const MIN_ITERATIONS: usize = 5;

/// Errors from k-means fitting.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error(
        "Empty dataset provided for clustering\nSuggestion: Load or generate vectors before building the index"
    )]
    EmptyDataset,

    #[error(
        "Invalid cluster count {requested} for {available} vectors\nSuggestion: Use a cluster count between 1 and the dataset size"
    )]
    InvalidClusterCount { requested: usize, available: usize },

    #[error(
        "Vector dimension mismatch in dataset: expected {expected}, got {actual}\nSuggestion: Ensure every vector shares the index's configured dimension"
    )]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Outcome statistics from a single `fit` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitStats {
    /// Iterations actually executed.
    pub iterations: usize,
    /// Whether the early-stop test fired before the iteration limit.
    pub converged: bool,
    /// Clusters with no assigned members after the final iteration.
    pub empty_clusters: usize,
}

/// Seeded k-means clusterer.
///
/// Centroids are mutated only during `fit` and frozen afterwards.
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    max_iterations: usize,
    seed: u64,
    centroids: Vec<Vec<f32>>,
}

impl KMeans {
    #[must_use]
    pub fn new(n_clusters: usize, max_iterations: usize, seed: u64) -> Self {
        Self {
            n_clusters,
            max_iterations,
            seed,
            centroids: Vec::new(),
        }
    }

    /// Partitions the dataset into `n_clusters` groups.
    ///
    /// Returns per-run statistics; degenerate outcomes (empty clusters,
    /// hitting the iteration limit) are statistics, not errors.
    pub fn fit(&mut self, vectors: &[Vector]) -> Result<FitStats, ClusteringError> {
        if vectors.is_empty() {
            return Err(ClusteringError::EmptyDataset);
        }
        if self.n_clusters == 0 || self.n_clusters > vectors.len() {
            return Err(ClusteringError::InvalidClusterCount {
                requested: self.n_clusters,
                available: vectors.len(),
            });
        }

        let dimension = vectors[0].dimension();
        for v in vectors {
            if v.dimension() != dimension {
                return Err(ClusteringError::DimensionMismatch {
                    expected: dimension,
                    actual: v.dimension(),
                });
            }
        }

        info!(
            n_clusters = self.n_clusters,
            n_vectors = vectors.len(),
            "running k-means"
        );

        self.initialize_centroids(vectors);

        let mut assignments = vec![0usize; vectors.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            for (i, v) in vectors.iter().enumerate() {
                assignments[i] = self.nearest_centroid(&v.embedding);
            }

            let moved = self.update_centroids(vectors, &assignments, dimension);

            // The early-stop test only applies once the centroids have had
            // a few iterations to settle.
            if !moved && iterations > MIN_ITERATIONS {
                converged = true;
                debug!(iterations, "k-means converged early");
                break;
            }
        }

        let mut counts = vec![0usize; self.n_clusters];
        for &a in &assignments {
            counts[a] += 1;
        }
        let empty_clusters = counts.iter().filter(|&&c| c == 0).count();

        info!(iterations, converged, empty_clusters, "k-means complete");
        Ok(FitStats {
            iterations,
            converged,
            empty_clusters,
        })
    }

    /// Seeds centroids by sampling distinct vectors uniformly at random.
    fn initialize_centroids(&mut self, vectors: &[Vector]) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut indices: Vec<usize> = (0..vectors.len()).collect();
        indices.shuffle(&mut rng);

        self.centroids = indices
            .iter()
            .take(self.n_clusters)
            .map(|&i| vectors[i].embedding.clone())
            .collect();
    }

    /// Recomputes centroids as cluster means; returns whether any centroid
    /// moved more than the convergence threshold. Empty clusters keep
    /// their previous centroid.
    fn update_centroids(
        &mut self,
        vectors: &[Vector],
        assignments: &[usize],
        dimension: usize,
    ) -> bool {
        let mut sums = vec![vec![0.0f32; dimension]; self.n_clusters];
        let mut counts = vec![0usize; self.n_clusters];

        for (v, &cluster) in vectors.iter().zip(assignments.iter()) {
            for (s, &x) in sums[cluster].iter_mut().zip(v.embedding.iter()) {
                *s += x;
            }
            counts[cluster] += 1;
        }

        let mut moved = false;
        for (cluster, (sum, &count)) in sums.into_iter().zip(counts.iter()).enumerate() {
            if count == 0 {
                continue;
            }
            let mean: Vec<f32> = sum.into_iter().map(|s| s / count as f32).collect();
            let movement = l2_sq(&self.centroids[cluster], &mean).sqrt();
            if movement > CONVERGENCE_THRESHOLD {
                moved = true;
            }
            self.centroids[cluster] = mean;
        }
        moved
    }

    /// Index of the single nearest centroid by Euclidean distance.
    ///
    /// Ties break toward the lowest cluster index.
    #[must_use]
    pub fn nearest_centroid(&self, vector: &[f32]) -> usize {
        let mut nearest = 0;
        let mut best = f32::INFINITY;
        for (i, c) in self.centroids.iter().enumerate() {
            let d = l2_sq(vector, c);
            if d < best {
                best = d;
                nearest = i;
            }
        }
        nearest
    }

    /// Indices of the `n_probe` nearest centroids, ordered by ascending
    /// distance, ties broken by ascending cluster index.
    #[must_use]
    pub fn nearest_centroids(&self, query: &[f32], n_probe: usize) -> Vec<usize> {
        let mut distances: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, l2_sq(query, c)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances
            .into_iter()
            .take(n_probe)
            .map(|(i, _)| i)
            .collect()
    }

    /// Fitted centroids. Empty before `fit` runs.
    #[must_use]
    pub fn centroids(&self) -> &[Vec<f32>] {
        &self.centroids
    }

    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }
}
