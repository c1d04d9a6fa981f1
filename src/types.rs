//! Core data types shared across the index and benchmark layers.
//!
//! This module provides the vector/result records exchanged with callers and
//! the slot identity types owned by the lifecycle core. Slot identities are
//! deliberately distinct from caller-assigned vector ids: a slot is an
//! internal, monotonically allocated handle that backends address embeddings
//! by, while a vector id is the caller's name for a logical vector.

use serde::Serialize;
use std::fmt;

/// A vector handed to the index by a caller.
///
/// Immutable once created. The id is caller-assigned and must be unique
/// among currently-live vectors; re-using an id after deletion denotes a
/// new logical vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    /// Caller-assigned identity.
    pub id: String,
    /// The embedding. Its length is the vector's dimension.
    pub embedding: Vec<f32>,
}

impl Vector {
    #[must_use]
    pub fn new(id: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            embedding,
        }
    }

    /// Dimension of the embedding.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// A single search hit: vector id plus its distance to the query.
///
/// Result lists are ordered ascending by distance (lower = more similar).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub id: String,
    pub distance: f32,
}

impl QueryResult {
    #[must_use]
    pub fn new(id: impl Into<String>, distance: f32) -> Self {
        Self {
            id: id.into(),
            distance,
        }
    }
}

/// Internal identity-space handle allocated by the lifecycle core.
///
/// Slot ids are assigned once, monotonically, and never reused while the
/// upper bound is active; reuse is only permitted after a compaction
/// rewrites the slot space. Zero is a valid slot, so this wraps a plain
/// `u64` rather than a non-zero type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the underlying u64 value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a slot in the lifecycle core's identity space.
///
/// A logical vector moves `Absent -> Live -> Tombstoned -> (compaction)
/// -> Absent`. Tombstoned slots are logically deleted but still occupy
/// backend storage until a compaction reclaims them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Live,
    Tombstoned,
}
