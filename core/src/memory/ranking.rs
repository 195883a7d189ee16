//! Ranking of memory entries.
//!
//! Each entry gets a weighted sum of three signals, scaled by a per-kind
//! weight:
//!
//! ```text
//! score = kind_weight * (w_imp * importance + w_rec * decay^age + w_sim * similarity)
//! ```
//!
//! `age` is the distance in sequence numbers from the newest entry. Similarity
//! only contributes when both the query and the entry carry embeddings.
//! Equal scores are broken by sequence number, most recent first.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::store::{EntryId, MemoryEntry, MemoryKind};

/// Tunable weights for memory retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalWeights {
    pub importance: f32,
    pub recency: f32,
    /// Per-step decay factor applied to recency, in `(0, 1]`
    pub recency_decay: f32,
    pub similarity: f32,
    /// Multipliers per kind; kinds not listed use 1.0
    pub kind_weights: BTreeMap<MemoryKind, f32>,
}

impl Default for RetrievalWeights {
    fn default() -> Self {
        Self {
            importance: 1.0,
            recency: 1.0,
            recency_decay: 0.99,
            similarity: 1.0,
            kind_weights: BTreeMap::new(),
        }
    }
}

impl RetrievalWeights {
    /// Weights used when planning: favour the agent's own actions, plans,
    /// thoughts and reflections over raw perceptions.
    pub fn planning() -> Self {
        Self::default()
            .with_kind_weight(MemoryKind::Action, 10.0)
            .with_kind_weight(MemoryKind::Plan, 10.0)
            .with_kind_weight(MemoryKind::Thought, 10.0)
            .with_kind_weight(MemoryKind::Reflection, 10.0)
    }

    /// Weights used when choosing an action: favour past actions and thoughts,
    /// ignore raw perceptions (the current page is passed separately).
    pub fn acting() -> Self {
        Self::default()
            .with_kind_weight(MemoryKind::Observation, 0.0)
            .with_kind_weight(MemoryKind::Action, 10.0)
            .with_kind_weight(MemoryKind::Thought, 10.0)
    }

    pub fn with_kind_weight(mut self, kind: MemoryKind, weight: f32) -> Self {
        self.kind_weights.insert(kind, weight.max(0.0));
        self
    }

    pub fn kind_weight(&self, kind: MemoryKind) -> f32 {
        self.kind_weights.get(&kind).copied().unwrap_or(1.0)
    }
}

/// Cosine similarity of two vectors; `None` when lengths differ or a vector is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}

/// Score a single entry relative to the newest sequence number in the store.
pub fn score(
    entry: &MemoryEntry,
    newest: EntryId,
    query_embedding: Option<&[f32]>,
    weights: &RetrievalWeights,
) -> f32 {
    let age = newest.saturating_sub(entry.timestamp);
    let age = i32::try_from(age).unwrap_or(i32::MAX);
    let recency = weights.recency_decay.clamp(f32::MIN_POSITIVE, 1.0).powi(age);

    let similarity = match (query_embedding, entry.embedding.as_deref()) {
        (Some(q), Some(e)) => cosine_similarity(q, e).unwrap_or(0.0),
        _ => 0.0,
    };

    weights.kind_weight(entry.kind)
        * (weights.importance * entry.importance
            + weights.recency * recency
            + weights.similarity * similarity)
}

/// Rank `entries` and return at most `limit` clones, best first.
pub fn rank(
    entries: &[MemoryEntry],
    query_embedding: Option<&[f32]>,
    limit: usize,
    weights: &RetrievalWeights,
) -> Vec<MemoryEntry> {
    let Some(newest) = entries.iter().map(|e| e.timestamp).max() else {
        return Vec::new();
    };

    let mut scored: Vec<(f32, &MemoryEntry)> = entries
        .iter()
        .map(|e| (score(e, newest, query_embedding, weights), e))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.1.timestamp.cmp(&a.1.timestamp))
    });

    scored
        .into_iter()
        .take(limit)
        .map(|(_, e)| e.clone())
        .collect()
}
