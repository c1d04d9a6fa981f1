//! Brute-force backend with full mutation support.
//!
//! Every live embedding is scored against every query, so results are
//! exact for the configured metric. Entries live in a concurrent map and
//! deletion is a per-entry tombstone flag, which makes this the reference
//! mutable backend for exercising the lifecycle core under churn.

use crate::distance::Metric;
use crate::index::backend::{AnnBackend, BackendError};
use crate::types::SlotId;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[derive(Debug)]
struct FlatEntry {
    embedding: Vec<f32>,
    deleted: bool,
}

/// Exact-scan backend over a concurrent slot map.
#[derive(Debug)]
pub struct FlatBackend {
    dimension: usize,
    metric: Metric,
    entries: DashMap<SlotId, FlatEntry>,
    tombstoned: AtomicUsize,
    upper_bound: AtomicU64,
    distance_calcs: AtomicU64,
}

impl FlatBackend {
    #[must_use]
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            entries: DashMap::new(),
            tombstoned: AtomicUsize::new(0),
            upper_bound: AtomicU64::new(0),
            distance_calcs: AtomicU64::new(0),
        }
    }

    /// Total distance computations since the last reset. Scored candidates
    /// only; there is no probe overhead in a flat scan.
    pub fn distance_calculations(&self) -> u64 {
        self.distance_calcs.load(Ordering::Relaxed)
    }

    pub fn reset_distance_calculations(&self) {
        self.distance_calcs.store(0, Ordering::Relaxed);
    }

    /// Estimated bytes held by stored embeddings, tombstoned included.
    pub fn memory_bytes(&self) -> u64 {
        (self.entries.len() * self.dimension * size_of::<f32>()) as u64
    }
}

impl AnnBackend for FlatBackend {
    fn add_node(&self, slot: SlotId, embedding: &[f32]) -> Result<(), BackendError> {
        if embedding.len() != self.dimension {
            return Err(BackendError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        match self.entries.entry(slot) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BackendError::SlotExists(slot)),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(FlatEntry {
                    embedding: embedding.to_vec(),
                    deleted: false,
                });
                self.upper_bound.fetch_max(slot.get() + 1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    fn mark_deleted(&self, slot: SlotId) -> Result<(), BackendError> {
        let mut entry = self
            .entries
            .get_mut(&slot)
            .ok_or(BackendError::SlotNotFound(slot))?;
        if !entry.deleted {
            entry.deleted = true;
            self.tombstoned.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn remove_deleted_nodes(&self) -> Result<u64, BackendError> {
        let dead: Vec<SlotId> = self
            .entries
            .iter()
            .filter(|e| e.value().deleted)
            .map(|e| *e.key())
            .collect();

        let mut removed = 0usize;
        for slot in dead {
            if self.entries.remove(&slot).is_some() {
                removed += 1;
            }
        }
        self.tombstoned.fetch_sub(removed, Ordering::SeqCst);
        Ok((removed * self.dimension * size_of::<f32>()) as u64)
    }

    fn search_live(
        &self,
        query: &[f32],
        k: usize,
        _budget: usize,
    ) -> Result<Vec<(SlotId, f32)>, BackendError> {
        if query.len() != self.dimension {
            return Err(BackendError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<(SlotId, f32)> = Vec::new();
        for entry in self.entries.iter() {
            if entry.value().deleted {
                continue;
            }
            let distance = self.metric.distance_raw(query, &entry.value().embedding);
            self.distance_calcs.fetch_add(1, Ordering::Relaxed);
            hits.push((*entry.key(), distance));
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        hits.truncate(k);
        Ok(hits)
    }

    fn live_count(&self) -> usize {
        self.entries
            .len()
            .saturating_sub(self.tombstoned.load(Ordering::SeqCst))
    }

    fn slot_upper_bound(&self) -> u64 {
        self.upper_bound.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> FlatBackend {
        FlatBackend::new(2, Metric::Euclidean)
    }

    #[test]
    fn test_add_and_search() {
        let b = backend();
        b.add_node(SlotId::new(0), &[0.0, 0.0]).unwrap();
        b.add_node(SlotId::new(1), &[1.0, 0.0]).unwrap();
        b.add_node(SlotId::new(2), &[5.0, 5.0]).unwrap();

        let hits = b.search_live(&[0.1, 0.0], 2, 0).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, SlotId::new(0));
        assert_eq!(hits[1].0, SlotId::new(1));
        assert!(hits[0].1 <= hits[1].1);
        assert_eq!(b.distance_calculations(), 3);
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let b = backend();
        b.add_node(SlotId::new(7), &[0.0, 0.0]).unwrap();
        assert!(matches!(
            b.add_node(SlotId::new(7), &[1.0, 1.0]),
            Err(BackendError::SlotExists(_))
        ));
    }

    #[test]
    fn test_dimension_checks() {
        let b = backend();
        assert!(matches!(
            b.add_node(SlotId::new(0), &[1.0, 2.0, 3.0]),
            Err(BackendError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(b.search_live(&[1.0], 1, 0).is_err());
    }

    #[test]
    fn test_tombstones_excluded_before_compaction() {
        let b = backend();
        b.add_node(SlotId::new(0), &[0.0, 0.0]).unwrap();
        b.add_node(SlotId::new(1), &[1.0, 0.0]).unwrap();
        b.mark_deleted(SlotId::new(0)).unwrap();

        // Still physically present, logically gone
        assert_eq!(b.live_count(), 1);
        let hits = b.search_live(&[0.0, 0.0], 10, 0).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, SlotId::new(1));
    }

    #[test]
    fn test_remove_deleted_nodes_reports_bytes() {
        let b = backend();
        b.add_node(SlotId::new(0), &[0.0, 0.0]).unwrap();
        b.add_node(SlotId::new(1), &[1.0, 0.0]).unwrap();
        b.mark_deleted(SlotId::new(1)).unwrap();

        let freed = b.remove_deleted_nodes().unwrap();
        assert_eq!(freed, (2 * size_of::<f32>()) as u64);
        assert_eq!(b.live_count(), 1);

        // Nothing left to reclaim
        assert_eq!(b.remove_deleted_nodes().unwrap(), 0);
    }

    #[test]
    fn test_mark_deleted_unknown_slot() {
        let b = backend();
        assert!(matches!(
            b.mark_deleted(SlotId::new(3)),
            Err(BackendError::SlotNotFound(_))
        ));
    }

    #[test]
    fn test_upper_bound_tracks_max_slot() {
        let b = backend();
        assert_eq!(b.slot_upper_bound(), 0);
        b.add_node(SlotId::new(5), &[0.0, 0.0]).unwrap();
        assert_eq!(b.slot_upper_bound(), 6);
        b.add_node(SlotId::new(2), &[0.0, 0.0]).unwrap();
        assert_eq!(b.slot_upper_bound(), 6);
    }
}
