//! Adapter contract between the lifecycle core and pluggable search engines.

use crate::types::SlotId;
use thiserror::Error;

/// Errors surfaced by a backend. Propagated to callers with the backend's
/// own detail, never swallowed or downgraded.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Slot {0} is already present in the backend")]
    SlotExists(SlotId),

    #[error("Slot {0} not found in the backend")]
    SlotNotFound(SlotId),

    #[error(
        "Vector dimension mismatch: backend expects {expected}, got {actual}\nSuggestion: Ensure every vector shares the index's configured dimension"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    /// Failure reported by an external engine, carried verbatim.
    #[error("Backend engine failure: {0}")]
    Engine(String),
}

/// The minimal interface the lifecycle core requires from a pluggable
/// similarity-search engine.
///
/// Backends own only their internal representation of "slot -> embedding",
/// addressed by [`SlotId`]; they must never invent or drop slot identities
/// on their own. The internal structure (graph, tree, inverted lists) is
/// the backend's business; the lifecycle core never inspects it.
///
/// # Concurrency
///
/// Implementations must tolerate concurrent `add_node` calls for distinct
/// slot ids and concurrent `search_live` calls during any mutation, which
/// is why every method takes `&self`. Internal synchronization strategy is
/// the backend's own responsibility.
pub trait AnnBackend: Send + Sync {
    /// Registers an embedding under a slot id.
    fn add_node(&self, slot: SlotId, embedding: &[f32]) -> Result<(), BackendError>;

    /// Logically removes a slot. The node may remain physically present,
    /// but must be excluded from all subsequent `search_live` results.
    fn mark_deleted(&self, slot: SlotId) -> Result<(), BackendError>;

    /// Physically reclaims all logically-deleted slots. May renumber
    /// internal structures, but must not change the externally visible
    /// results for still-live slots. Returns estimated bytes freed.
    fn remove_deleted_nodes(&self) -> Result<u64, BackendError>;

    /// Searches live slots only, returning up to `k` hits ordered by
    /// ascending score. `budget` is an engine-specific search effort hint
    /// (ef for graph engines); exhaustive backends may ignore it.
    fn search_live(
        &self,
        query: &[f32],
        k: usize,
        budget: usize,
    ) -> Result<Vec<(SlotId, f32)>, BackendError>;

    /// Authoritative count of live (non-deleted) slots.
    fn live_count(&self) -> usize;

    /// Exclusive upper bound of slot ids the backend has seen.
    fn slot_upper_bound(&self) -> u64;
}
