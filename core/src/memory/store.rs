//! Append-only memory log.
//!
//! Entries are stored immutably - they are never modified or deleted within a
//! run. Readers always receive clones, so retrieval can never mutate the log.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::ranking::{rank, RetrievalWeights};

/// Sequence number of an entry. Doubles as the entry's logical timestamp.
pub type EntryId = u64;

/// Importance assigned when the caller does not supply one.
pub const DEFAULT_IMPORTANCE: f32 = 0.5;

/// Kind of memory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Observation,
    Action,
    Thought,
    Plan,
    Reflection,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 5] = [
        MemoryKind::Observation,
        MemoryKind::Action,
        MemoryKind::Thought,
        MemoryKind::Plan,
        MemoryKind::Reflection,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Observation => "observation",
            MemoryKind::Action => "action",
            MemoryKind::Thought => "thought",
            MemoryKind::Plan => "plan",
            MemoryKind::Reflection => "reflection",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single record in the memory log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Monotonic sequence number, unique within the store
    pub timestamp: EntryId,
    pub kind: MemoryKind,
    pub content: String,
    /// Importance in `[0.0, 1.0]`
    pub importance: f32,
    /// Wall-clock time of insertion
    pub created_at: DateTime<Utc>,
    /// Semantic embedding of `content`, if one was computed
    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

/// Append-only memory store for one agent.
///
/// `add` takes `&self`: the sequence number is assigned under the same write
/// lock that appends the entry, so concurrent inserts can never share a number.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<Vec<MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<MemoryEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<MemoryEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an entry. `importance` defaults to [`DEFAULT_IMPORTANCE`] and is
    /// clamped to `[0.0, 1.0]`.
    pub fn add(
        &self,
        kind: MemoryKind,
        content: impl Into<String>,
        importance: Option<f32>,
    ) -> EntryId {
        self.add_with_embedding(kind, content, importance, None)
    }

    /// Append an entry carrying a precomputed embedding.
    pub fn add_with_embedding(
        &self,
        kind: MemoryKind,
        content: impl Into<String>,
        importance: Option<f32>,
        embedding: Option<Vec<f32>>,
    ) -> EntryId {
        let importance = importance
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_IMPORTANCE)
            .clamp(0.0, 1.0);
        let content = content.into();

        let mut entries = self.write();
        let timestamp = entries.len() as EntryId;
        trace!(
            target = "memory",
            timestamp,
            kind = %kind,
            importance,
            "Appending memory entry"
        );
        entries.push(MemoryEntry {
            timestamp,
            kind,
            content,
            importance,
            created_at: Utc::now(),
            embedding,
        });
        timestamp
    }

    /// All entries in insertion order.
    pub fn all(&self) -> Vec<MemoryEntry> {
        self.read().clone()
    }

    pub fn get(&self, id: EntryId) -> Option<MemoryEntry> {
        self.read().get(id as usize).cloned()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<MemoryEntry> {
        let entries = self.read();
        let start = entries.len().saturating_sub(n);
        entries[start..].to_vec()
    }

    pub fn of_kind(&self, kind: MemoryKind) -> Vec<MemoryEntry> {
        self.read()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Entry counts per kind. Every kind is present, possibly with zero.
    pub fn count_by_kind(&self) -> BTreeMap<MemoryKind, usize> {
        let mut counts: BTreeMap<MemoryKind, usize> =
            MemoryKind::ALL.iter().map(|k| (*k, 0)).collect();
        for entry in self.read().iter() {
            *counts.entry(entry.kind).or_default() += 1;
        }
        counts
    }

    /// Retrieve up to `limit` entries ranked by importance and recency.
    ///
    /// `query` has no effect without embeddings; use [`MemoryStore::retrieve_with`]
    /// and a query embedding for similarity-aware ranking.
    pub fn retrieve(&self, query: &str, limit: usize) -> Vec<MemoryEntry> {
        debug!(target = "memory", query = %query, limit, "Retrieving memories");
        self.retrieve_with(None, limit, &RetrievalWeights::default())
    }

    /// Retrieve up to `limit` entries with explicit weights and an optional
    /// query embedding.
    pub fn retrieve_with(
        &self,
        query_embedding: Option<&[f32]>,
        limit: usize,
        weights: &RetrievalWeights,
    ) -> Vec<MemoryEntry> {
        let entries = self.read();
        rank(&entries, query_embedding, limit, weights)
    }
}
