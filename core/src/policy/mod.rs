//! Decision policies
//!
//! A policy maps one observation (plus the agent's persona, memory and live
//! plan) to exactly one action. Two implementations are provided:
//!
//! ```text
//!   Observation ──▶ ComponentPolicy      relevance ─▶ step cap ─▶ select ─▶ query
//!               └─▶ CognitiveLoopPolicy  perceive ─▶ feedback? ─▶ plan ─▶ reflect? ─▶ act
//!                                                          │
//!                                                          ▼
//!                                                     MemoryStore
//! ```
//!
//! The policy attached to an agent is fixed when the agent is built.

pub mod cognitive;
pub mod component;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::MemoryStore;
use crate::types::{Action, Observation, Persona, Plan};
use crate::Result;

pub use cognitive::{CognitiveConfig, CognitiveLoopPolicy, ImportanceProfile};
pub use component::{ComponentConfig, ComponentPolicy};

/// Borrowed view of the agent state a policy operates on
pub struct AgentContext<'a> {
    pub persona: &'a Persona,
    pub memory: &'a MemoryStore,
    /// The single live plan; policies replace it wholesale
    pub plan: &'a mut Option<Plan>,
}

/// Strategy that turns an observation into one action
#[async_trait]
pub trait DecisionPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Produce exactly one action.
    ///
    /// Completion and decoding failures are absorbed inside the policy. An
    /// `Err` here means the policy itself is unusable and ends the run.
    async fn decide(&mut self, ctx: AgentContext<'_>, observation: &Observation) -> Result<Action>;

    /// Serializable snapshot of internal counters, for run artifacts
    fn state(&self) -> Value;

    /// Return to the state of a freshly built policy
    fn reset(&mut self);
}
