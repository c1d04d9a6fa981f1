//! Distance metrics for vector comparison.
//!
//! All public entry points validate operand dimensions and fail with
//! [`DistanceError::DimensionMismatch`] rather than truncating. Metric
//! dispatch by name is explicit: an unknown metric name is an
//! [`DistanceError::UnsupportedMetric`] error, never a silent zero
//! distance.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors from distance computation and metric dispatch.
#[derive(Error, Debug)]
pub enum DistanceError {
    #[error(
        "Vector dimension mismatch: left operand has {left}, right has {right}\nSuggestion: Ensure all vectors in one index share the configured dimension"
    )]
    DimensionMismatch { left: usize, right: usize },

    #[error(
        "Unsupported distance metric '{0}'\nSuggestion: Use one of: euclidean, squared_euclidean, cosine"
    )]
    UnsupportedMetric(String),
}

/// A distance metric, selected by name from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// L2 distance.
    Euclidean,
    /// L2 distance without the final square root. Preserves ordering.
    SquaredEuclidean,
    /// `1 - dot(a, b)`. Assumes pre-normalized inputs; does not normalize.
    Cosine,
}

impl FromStr for Metric {
    type Err = DistanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "squared_euclidean" => Ok(Self::SquaredEuclidean),
            "cosine" => Ok(Self::Cosine),
            other => Err(DistanceError::UnsupportedMetric(other.to_string())),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Euclidean => "euclidean",
            Self::SquaredEuclidean => "squared_euclidean",
            Self::Cosine => "cosine",
        };
        write!(f, "{name}")
    }
}

impl Metric {
    /// Computes the distance between two vectors under this metric.
    pub fn distance(self, a: &[f32], b: &[f32]) -> Result<f32, DistanceError> {
        check_dimensions(a, b)?;
        Ok(self.distance_raw(a, b))
    }

    /// Distance without the dimension check. For hot loops where both
    /// operands were validated at insertion time.
    pub(crate) fn distance_raw(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "operands must have same dimension");
        match self {
            Self::Euclidean => l2_sq(a, b).sqrt(),
            Self::SquaredEuclidean => l2_sq(a, b),
            Self::Cosine => 1.0 - dot(a, b),
        }
    }
}

/// Squared Euclidean distance between two vectors.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> Result<f32, DistanceError> {
    check_dimensions(a, b)?;
    Ok(l2_sq(a, b))
}

/// Euclidean (L2) distance between two vectors.
pub fn euclidean(a: &[f32], b: &[f32]) -> Result<f32, DistanceError> {
    check_dimensions(a, b)?;
    Ok(l2_sq(a, b).sqrt())
}

/// Cosine distance `1 - dot(a, b)`.
///
/// Assumes both inputs are unit-normalized; this function does not
/// normalize them itself.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32, DistanceError> {
    check_dimensions(a, b)?;
    Ok(1.0 - dot(a, b))
}

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<(), DistanceError> {
    if a.len() != b.len() {
        return Err(DistanceError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    Ok(())
}

pub(crate) fn l2_sq(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
