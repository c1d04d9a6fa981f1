//! Lifecycle core: the mutable identity space over any backend.
//!
//! Owns the slot-to-vector-id mapping exclusively. Backends only ever see
//! slot ids; callers only ever see vector ids. Per logical vector the
//! state machine is `Absent -> Live -> Tombstoned -> (compaction) ->
//! Absent`.
//!
//! # Concurrency
//!
//! The slot allocator and the live/tombstone counters are atomics, the
//! only state mutated from multiple threads besides the concurrent maps.
//! Slot allocation is the one serialization point: a slot id is assigned
//! and its mapping registered before any backend write for that slot
//! begins. Compaction is single-flight behind a mutex that searches never
//! take, so a long reclamation cannot stall concurrent queries.

use crate::index::{AnnBackend, BackendError};
use crate::types::{QueryResult, SlotId, SlotState, Vector};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from lifecycle operations. All are recoverable at the call
/// boundary: internal state stays consistent after any rejected operation.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(
        "Vector id '{0}' is already live\nSuggestion: Delete the existing vector first, or insert under a fresh id"
    )]
    DuplicateId(String),

    #[error("Vector id '{0}' is not live in this index")]
    NotFound(String),

    #[error(
        "Vector dimension mismatch: index is configured for {expected}, got {actual}\nSuggestion: Ensure every vector shares the index's configured dimension"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Tuning knobs for a lifecycle index instance.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Dimension every inserted vector must match.
    pub dimension: usize,
    /// Tombstone count beyond which a delete triggers automatic
    /// compaction.
    pub compaction_threshold: usize,
    /// Search effort hint forwarded to the backend (ef for graph
    /// engines).
    pub search_budget: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            dimension: 128,
            compaction_threshold: 5000,
            search_budget: 100,
        }
    }
}

#[derive(Debug)]
struct SlotRecord {
    vector_id: String,
    state: SlotState,
}

/// A reserved insert: slot allocated and vector id registered, backend
/// write still pending. Produced by [`LifecycleIndex::reserve`] so batch
/// executors can fan the backend writes out across workers.
#[derive(Debug)]
pub struct PendingInsert {
    slot: SlotId,
    embedding: Vec<f32>,
}

impl PendingInsert {
    #[must_use]
    pub fn slot(&self) -> SlotId {
        self.slot
    }
}

/// The mutable identity space over a pluggable search backend.
#[derive(Debug)]
pub struct LifecycleIndex<B> {
    backend: B,
    config: LifecycleConfig,
    next_slot: AtomicU64,
    live: AtomicUsize,
    tombstones: AtomicUsize,
    compactions: AtomicUsize,
    id_map: DashMap<String, SlotId>,
    slots: DashMap<SlotId, SlotRecord>,
    compaction_lock: Mutex<()>,
}

impl<B: AnnBackend> LifecycleIndex<B> {
    #[must_use]
    pub fn new(backend: B, config: LifecycleConfig) -> Self {
        Self {
            backend,
            config,
            next_slot: AtomicU64::new(0),
            live: AtomicUsize::new(0),
            tombstones: AtomicUsize::new(0),
            compactions: AtomicUsize::new(0),
            id_map: DashMap::new(),
            slots: DashMap::new(),
            compaction_lock: Mutex::new(()),
        }
    }

    /// Inserts a vector: allocates a slot, registers the id, forwards the
    /// embedding to the backend. Returns the allocated slot.
    pub fn insert(&self, vector: Vector) -> Result<SlotId, LifecycleError> {
        let pending = self.reserve(vector)?;
        let slot = pending.slot;
        self.apply(pending)?;
        Ok(slot)
    }

    /// The sequential half of an insert: dimension check, duplicate
    /// check, slot allocation, and id registration. The backend write
    /// happens in [`apply`](Self::apply), possibly on another thread.
    pub fn reserve(&self, vector: Vector) -> Result<PendingInsert, LifecycleError> {
        if vector.dimension() != self.config.dimension {
            return Err(LifecycleError::DimensionMismatch {
                expected: self.config.dimension,
                actual: vector.dimension(),
            });
        }

        let Vector { id, embedding } = vector;
        match self.id_map.entry(id.clone()) {
            Entry::Occupied(_) => Err(LifecycleError::DuplicateId(id)),
            Entry::Vacant(vacant) => {
                let slot = SlotId::new(self.next_slot.fetch_add(1, Ordering::SeqCst));
                vacant.insert(slot);
                self.slots.insert(
                    slot,
                    SlotRecord {
                        vector_id: id,
                        state: SlotState::Live,
                    },
                );
                self.live.fetch_add(1, Ordering::SeqCst);
                Ok(PendingInsert { slot, embedding })
            }
        }
    }

    /// The parallel half of an insert: the backend write. A backend
    /// failure rolls the reservation back so no dangling mapping
    /// survives.
    pub fn apply(&self, pending: PendingInsert) -> Result<(), LifecycleError> {
        if let Err(e) = self.backend.add_node(pending.slot, &pending.embedding) {
            self.abandon_slot(pending.slot);
            return Err(e.into());
        }
        Ok(())
    }

    /// Discards a reservation that will never reach the backend.
    pub(crate) fn abandon(&self, pending: PendingInsert) {
        self.abandon_slot(pending.slot);
    }

    fn abandon_slot(&self, slot: SlotId) {
        if let Some((_, record)) = self.slots.remove(&slot) {
            self.id_map
                .remove_if(&record.vector_id, |_, s| *s == slot);
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Tombstones a live vector. The backend excludes the slot from all
    /// future searches immediately; physical reclamation waits for
    /// compaction. Crossing the configured tombstone threshold triggers
    /// an automatic compaction.
    pub fn delete(&self, id: &str) -> Result<(), LifecycleError> {
        let slot = *self
            .id_map
            .get(id)
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))?;

        // Backend first: a search started after this call returns must
        // never see the id. State here is untouched if the backend fails.
        self.backend.mark_deleted(slot)?;

        // Exactly one of any racing deletes for the same id wins the
        // mapping removal; losers report NotFound.
        if self.id_map.remove_if(id, |_, s| *s == slot).is_none() {
            return Err(LifecycleError::NotFound(id.to_string()));
        }
        if let Some(mut record) = self.slots.get_mut(&slot) {
            record.state = SlotState::Tombstoned;
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
        let tombstones = self.tombstones.fetch_add(1, Ordering::SeqCst) + 1;

        if tombstones > self.config.compaction_threshold {
            self.compact()?;
        }
        Ok(())
    }

    /// Physically reclaims all tombstoned slots. Blocking for the caller,
    /// single-flight across callers: a second concurrent `compact` waits
    /// for the first, then observes nothing tombstoned and no-ops.
    /// Searches proceed concurrently throughout.
    ///
    /// Returns estimated bytes freed; `0` when there was nothing to do.
    pub fn compact(&self) -> Result<u64, LifecycleError> {
        let _guard = self.compaction_lock.lock();
        if self.tombstones.load(Ordering::SeqCst) == 0 {
            debug!("compaction requested with no tombstones, skipping");
            return Ok(0);
        }

        let freed = self.backend.remove_deleted_nodes()?;
        self.slots.retain(|_, record| record.state == SlotState::Live);
        self.tombstones.store(0, Ordering::SeqCst);
        // The backend count is authoritative after physical reclamation
        self.live.store(self.backend.live_count(), Ordering::SeqCst);
        self.compactions.fetch_add(1, Ordering::SeqCst);

        info!(bytes_freed = freed, live = self.len(), "compaction complete");
        Ok(freed)
    }

    /// Searches live vectors, translating backend slots back to vector
    /// ids. A delete racing this call may or may not be observed; a
    /// delete that returned before this call started is always excluded.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<QueryResult>, LifecycleError> {
        if query.len() != self.config.dimension {
            return Err(LifecycleError::DimensionMismatch {
                expected: self.config.dimension,
                actual: query.len(),
            });
        }

        let budget = self.config.search_budget.max(k);
        let hits = self.backend.search_live(query, k, budget)?;

        // Slots can race to Tombstoned (or vanish under a concurrent
        // compaction) between the backend scoring them and this
        // translation; drop those under last-observed-state semantics.
        Ok(hits
            .into_iter()
            .filter_map(|(slot, distance)| {
                self.slots.get(&slot).and_then(|record| {
                    (record.state == SlotState::Live)
                        .then(|| QueryResult::new(record.vector_id.clone(), distance))
                })
            })
            .collect())
    }

    /// Number of live vectors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a vector id is currently live.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.id_map.contains_key(id)
    }

    /// Tombstones accumulated since the last compaction.
    #[must_use]
    pub fn tombstone_count(&self) -> usize {
        self.tombstones.load(Ordering::SeqCst)
    }

    /// Compactions performed (automatic and explicit).
    #[must_use]
    pub fn compaction_count(&self) -> usize {
        self.compactions.load(Ordering::SeqCst)
    }

    /// Exclusive upper bound of allocated slot ids.
    #[must_use]
    pub fn slot_upper_bound(&self) -> u64 {
        self.next_slot.load(Ordering::SeqCst)
    }

    /// The wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Metric;
    use crate::index::FlatBackend;

    fn index(dimension: usize) -> LifecycleIndex<FlatBackend> {
        index_with_threshold(dimension, 5000)
    }

    fn index_with_threshold(
        dimension: usize,
        compaction_threshold: usize,
    ) -> LifecycleIndex<FlatBackend> {
        LifecycleIndex::new(
            FlatBackend::new(dimension, Metric::Euclidean),
            LifecycleConfig {
                dimension,
                compaction_threshold,
                search_budget: 100,
            },
        )
    }

    fn vec2(id: &str, x: f32, y: f32) -> Vector {
        Vector::new(id, vec![x, y])
    }

    #[test]
    fn test_insert_allocates_monotonic_slots() {
        let idx = index(2);
        let a = idx.insert(vec2("a", 0.0, 0.0)).unwrap();
        let b = idx.insert(vec2("b", 1.0, 0.0)).unwrap();
        assert!(a < b);
        assert_eq!(idx.len(), 2);
        assert_eq!(idx.slot_upper_bound(), 2);
    }

    #[test]
    fn test_duplicate_id_rejected_and_state_unchanged() {
        let idx = index(2);
        idx.insert(vec2("a", 0.0, 0.0)).unwrap();
        let err = idx.insert(vec2("a", 1.0, 1.0)).unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateId(id) if id == "a"));
        assert_eq!(idx.len(), 1);
        // The failed insert did not allocate a slot
        assert_eq!(idx.slot_upper_bound(), 1);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let idx = index(2);
        let err = idx.insert(Vector::new("a", vec![1.0, 2.0, 3.0])).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        assert_eq!(idx.len(), 0);
        assert_eq!(idx.slot_upper_bound(), 0);
    }

    #[test]
    fn test_delete_then_search_excludes_id() {
        let idx = index(2);
        idx.insert(vec2("a", 0.0, 0.0)).unwrap();
        idx.insert(vec2("b", 1.0, 0.0)).unwrap();
        idx.delete("a").unwrap();

        assert_eq!(idx.len(), 1);
        assert!(!idx.contains("a"));
        let results = idx.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[test]
    fn test_delete_unknown_id() {
        let idx = index(2);
        assert!(matches!(
            idx.delete("ghost"),
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[test]
    fn test_id_reuse_after_delete_is_a_new_vector() {
        let idx = index(2);
        let first = idx.insert(vec2("a", 0.0, 0.0)).unwrap();
        idx.delete("a").unwrap();
        let second = idx.insert(vec2("a", 9.0, 9.0)).unwrap();

        // New logical vector, new slot
        assert!(second > first);
        let results = idx.search(&[9.0, 9.0], 1).unwrap();
        assert_eq!(results[0].id, "a");
        assert!(results[0].distance.abs() < f32::EPSILON);
    }

    #[test]
    fn test_accounting_invariant() {
        let idx = index(2);
        for i in 0..20 {
            idx.insert(vec2(&format!("v{i}"), i as f32, 0.0)).unwrap();
        }
        for i in 0..8 {
            idx.delete(&format!("v{i}")).unwrap();
        }
        assert_eq!(idx.len(), 12);
        assert_eq!(idx.tombstone_count(), 8);
        assert_eq!(idx.slot_upper_bound(), 20);
        // live = allocated - tombstoned
        assert_eq!(
            idx.len(),
            idx.slot_upper_bound() as usize - idx.tombstone_count()
        );
    }

    #[test]
    fn test_compaction_idempotence() {
        let idx = index(2);
        for i in 0..10 {
            idx.insert(vec2(&format!("v{i}"), i as f32, 0.0)).unwrap();
        }
        for i in 0..4 {
            idx.delete(&format!("v{i}")).unwrap();
        }

        let freed = idx.compact().unwrap();
        assert!(freed > 0);
        assert_eq!(idx.tombstone_count(), 0);
        assert_eq!(idx.len(), 6);

        // Nothing tombstoned: second compaction is a 0 statistic
        let freed = idx.compact().unwrap();
        assert_eq!(freed, 0);
        assert_eq!(idx.len(), 6);
    }

    #[test]
    fn test_auto_compaction_on_threshold() {
        let idx = index_with_threshold(2, 5);
        for i in 0..10 {
            idx.insert(vec2(&format!("v{i}"), i as f32, 0.0)).unwrap();
        }
        for i in 0..6 {
            idx.delete(&format!("v{i}")).unwrap();
        }

        // The sixth delete crossed the threshold of 5
        assert_eq!(idx.compaction_count(), 1);
        assert_eq!(idx.tombstone_count(), 0);
        assert_eq!(idx.len(), idx.backend().live_count());
    }

    #[test]
    fn test_search_results_sorted_without_duplicates() {
        let idx = index(2);
        for i in 0..30 {
            idx.insert(vec2(&format!("v{i}"), (i % 6) as f32, (i / 6) as f32))
                .unwrap();
        }
        let results = idx.search(&[2.0, 2.0], 10).unwrap();
        assert!(results.len() <= 10);
        for w in results.windows(2) {
            assert!(w[0].distance <= w[1].distance);
        }
        let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len());
    }

    #[test]
    fn test_failed_backend_write_rolls_back() {
        // Force a backend failure by pre-occupying the slot the next
        // reserve will allocate.
        let idx = index(2);
        idx.backend().add_node(SlotId::new(0), &[5.0, 5.0]).unwrap();

        let err = idx.insert(vec2("a", 0.0, 0.0)).unwrap_err();
        assert!(matches!(err, LifecycleError::Backend(_)));
        // No dangling mapping: the id is free again
        assert!(!idx.contains("a"));
        assert_eq!(idx.len(), 0);
    }
}
