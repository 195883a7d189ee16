//! Agent memory: an append-only, timestamped log with weighted retrieval.
//!
//! - [`MemoryStore`]: the log itself (one per agent, never shared across runs)
//! - [`RetrievalWeights`] / [`rank`]: scoring of entries by importance,
//!   recency and (when embeddings exist) similarity to a query

mod ranking;
mod store;

pub use ranking::{cosine_similarity, rank, score, RetrievalWeights};
pub use store::{EntryId, MemoryEntry, MemoryKind, MemoryStore, DEFAULT_IMPORTANCE};

/// Render entries as prompt lines: `timestamp: N; kind: K; content: C`.
pub fn to_prompt_lines(entries: &[MemoryEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            format!(
                "timestamp: {}; kind: {}; content: {}",
                entry.timestamp, entry.kind, entry.content
            )
        })
        .collect()
}
