//! Batch execution across a fixed worker pool.
//!
//! Batch inserts split the backend writes across workers after the
//! lifecycle core has sequentially pre-allocated every slot id and
//! registered every vector-id mapping. Slot allocation is the one
//! serialization point, so two concurrent inserts can never collide on a
//! slot. Batch searches dispatch queries to workers and join all results
//! before returning.
//!
//! The sequential path (no pool) must produce equivalent results: same
//! invariants, not necessarily the same latency.

use crate::index::AnnBackend;
use crate::lifecycle::{LifecycleError, LifecycleIndex, PendingInsert};
use crate::types::{QueryResult, SlotId, Vector};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

/// Errors from worker-pool construction.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Failed to build worker pool: {0}")]
    Pool(String),
}

/// Dispatches batch operations either sequentially or across a dedicated
/// rayon pool.
pub struct BatchExecutor {
    pool: Option<rayon::ThreadPool>,
}

impl BatchExecutor {
    /// Single-threaded fallback; processes batches in caller order.
    #[must_use]
    pub fn sequential() -> Self {
        Self { pool: None }
    }

    /// Fixed-size worker pool. `threads == 0` uses the number of
    /// available CPUs.
    pub fn with_threads(threads: usize) -> Result<Self, ExecutorError> {
        let threads = if threads == 0 {
            num_cpus::get()
        } else {
            threads
        };
        debug!(threads, "creating batch executor pool");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vecbench-worker-{i}"))
            .build()
            .map_err(|e| ExecutorError::Pool(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    /// Number of workers; 1 for the sequential fallback.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(1, rayon::ThreadPool::current_num_threads)
    }

    /// Inserts a batch: slots are reserved sequentially, backend writes
    /// fan out across the pool. Blocks until every worker has finished
    /// its assigned slots. Returns the allocated slots in input order.
    pub fn insert_batch<B: AnnBackend>(
        &self,
        index: &LifecycleIndex<B>,
        vectors: Vec<Vector>,
    ) -> Result<Vec<SlotId>, LifecycleError> {
        // Phase 1: sequential reservation. On a mid-batch rejection the
        // already-reserved entries are rolled back so the index is left
        // unchanged by the failed batch.
        let mut pending: Vec<PendingInsert> = Vec::with_capacity(vectors.len());
        for vector in vectors {
            match index.reserve(vector) {
                Ok(p) => pending.push(p),
                Err(e) => {
                    for p in pending {
                        index.abandon(p);
                    }
                    return Err(e);
                }
            }
        }
        let slots: Vec<SlotId> = pending.iter().map(PendingInsert::slot).collect();

        // Phase 2: backend writes, parallel when a pool is present. A
        // failed apply rolls its own reservation back; every other
        // pending must still be either applied or abandoned before the
        // error propagates, so no reservation can outlive the call.
        match &self.pool {
            None => {
                let mut remaining = pending.into_iter();
                while let Some(p) = remaining.next() {
                    if let Err(e) = index.apply(p) {
                        for unapplied in remaining {
                            index.abandon(unapplied);
                        }
                        return Err(e);
                    }
                }
            }
            Some(pool) => {
                let outcomes: Vec<Result<(), LifecycleError>> = pool.install(|| {
                    pending.into_par_iter().map(|p| index.apply(p)).collect()
                });
                if let Some(e) = outcomes.into_iter().find_map(Result::err) {
                    return Err(e);
                }
            }
        }
        Ok(slots)
    }

    /// Runs every query, joining all results before returning. Results
    /// are in query order.
    pub fn search_batch<B: AnnBackend>(
        &self,
        index: &LifecycleIndex<B>,
        queries: &[Vec<f32>],
        k: usize,
    ) -> Result<Vec<Vec<QueryResult>>, LifecycleError> {
        match &self.pool {
            None => queries.iter().map(|q| index.search(q, k)).collect(),
            Some(pool) => pool.install(|| {
                queries
                    .par_iter()
                    .map(|q| index.search(q, k))
                    .collect::<Result<Vec<_>, _>>()
            }),
        }
    }
}
