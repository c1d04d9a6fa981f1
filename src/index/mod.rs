//! Search backends and the adapter contract the lifecycle core requires.
//!
//! Two backends live in-tree: a mutable brute-force [`FlatBackend`] that
//! the lifecycle core runs over in benchmarks and tests, and a static
//! [`IvfIndex`] built on k-means coarse quantization. External similarity
//! graph engines plug in by implementing [`AnnBackend`].

mod backend;
mod flat;
mod ivf;

pub use backend::{AnnBackend, BackendError};
pub use flat::FlatBackend;
pub use ivf::IvfIndex;
