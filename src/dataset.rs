//! Dataset generation and exact ground truth.
//!
//! Synthetic datasets are drawn from a seeded gaussian so every run of a
//! benchmark sees the same vectors. Ground truth is brute force over the
//! full base set and therefore exact.

use crate::distance::{DistanceError, Metric};
use crate::types::Vector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thiserror::Error;
use tracing::info;

/// Errors from dataset construction.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error(transparent)]
    Distance(#[from] DistanceError),
}

/// A source of benchmark data: base vectors to index, queries to run,
/// and the exact nearest neighbors of each query.
pub trait DatasetSource {
    fn base_vectors(&self) -> &[Vector];
    fn query_vectors(&self) -> &[Vector];
    fn ground_truth(&self) -> &[Vec<String>];
}

/// Deterministic random vector generator. Components are standard
/// gaussian draws and each vector is normalized to unit length, which
/// keeps cosine and euclidean rankings comparable.
pub struct RandomVectorGenerator {
    rng: StdRng,
    next_id: usize,
}

impl RandomVectorGenerator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    /// Generates `count` unit vectors of the given dimension with ids
    /// `vec_0`, `vec_1`, ... continuing across calls.
    pub fn generate(&mut self, count: usize, dimension: usize) -> Vec<Vector> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let id = format!("vec_{}", self.next_id);
            self.next_id += 1;
            out.push(Vector::new(id, self.unit_embedding(dimension)));
        }
        out
    }

    /// One gaussian unit vector without an identity, for query sets.
    pub fn embedding(&mut self, dimension: usize) -> Vec<f32> {
        self.unit_embedding(dimension)
    }

    fn unit_embedding(&mut self, dimension: usize) -> Vec<f32> {
        let mut v: Vec<f32> = (0..dimension).map(|_| self.gaussian()).collect();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    /// Box-Muller transform over two uniform draws.
    fn gaussian(&mut self) -> f32 {
        let u1: f32 = self.rng.random::<f32>().max(f32::MIN_POSITIVE);
        let u2: f32 = self.rng.random();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos()
    }
}

/// Exact top-k neighbors of every query by brute force over the base
/// set. Parallel across queries.
pub fn compute_ground_truth(
    queries: &[Vector],
    base: &[Vector],
    k: usize,
    metric: Metric,
) -> Result<Vec<Vec<String>>, DatasetError> {
    info!(
        n_queries = queries.len(),
        n_base = base.len(),
        k,
        "computing exact ground truth"
    );
    let truth = queries
        .par_iter()
        .map(|query| {
            let mut scored: Vec<(f32, &str)> = base
                .iter()
                .map(|v| {
                    metric
                        .distance(&query.embedding, &v.embedding)
                        .map(|d| (d, v.id.as_str()))
                })
                .collect::<Result<_, _>>()?;
            scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
            scored.truncate(k);
            Ok(scored.into_iter().map(|(_, id)| id.to_string()).collect())
        })
        .collect::<Result<Vec<Vec<String>>, DistanceError>>()?;
    Ok(truth)
}

/// A fully materialized synthetic dataset: seeded base and query sets
/// plus exact ground truth.
pub struct SyntheticDataset {
    base: Vec<Vector>,
    queries: Vec<Vector>,
    ground_truth: Vec<Vec<String>>,
}

impl SyntheticDataset {
    pub fn generate(
        seed: u64,
        n_base: usize,
        n_queries: usize,
        dimension: usize,
        k: usize,
        metric: Metric,
    ) -> Result<Self, DatasetError> {
        let mut generator = RandomVectorGenerator::new(seed);
        let base = generator.generate(n_base, dimension);
        let queries: Vec<Vector> = (0..n_queries)
            .map(|i| Vector::new(format!("query_{i}"), generator.embedding(dimension)))
            .collect();
        let ground_truth = compute_ground_truth(&queries, &base, k, metric)?;
        Ok(Self {
            base,
            queries,
            ground_truth,
        })
    }
}

impl DatasetSource for SyntheticDataset {
    fn base_vectors(&self) -> &[Vector] {
        &self.base
    }

    fn query_vectors(&self) -> &[Vector] {
        &self.queries
    }

    fn ground_truth(&self) -> &[Vec<String>] {
        &self.ground_truth
    }
}
