//! Cognitive-loop policy
//!
//! Every decision re-enters the same cycle; which optional phases run is
//! decided by guards on two pieces of state, the number of completed
//! decisions and the last action produced.
//!
//! ```text
//!   observation
//!        │
//!        ▼
//!   ┌──────────┐   ┌────────────┐   ┌──────┐   ┌────────────┐   ┌─────┐
//!   │ PERCEIVE │──▶│ FEEDBACK   │──▶│ PLAN │──▶│ REFLECT    │──▶│ ACT │──▶ Action
//!   │          │   │ if last    │   │      │   │ every N    │   │     │
//!   │          │   │ action     │   │      │   │ steps, N>0 │   │     │
//!   └──────────┘   └────────────┘   └──────┘   └────────────┘   └─────┘
//!        │               │              │             │             │
//!        ▼               ▼              ▼             ▼             ▼
//!   observation      thought        plan +        reflection     action
//!     entries        entries        thought        entries       entry
//! ```
//!
//! A phase whose completion fails or cannot be decoded contributes nothing
//! and logs a warning. Act always yields a valid action, falling back to
//! `stop` with a diagnostic reason.
//!
//! Each phase is also a public method, so callers can run phases by hand
//! against an agent's persona and memory. Only [`DecisionPolicy::decide`]
//! advances the step counter and the last action.

mod config;
mod phases;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{AgentContext, DecisionPolicy};
use crate::llm::{CompletionService, Embedder};
use crate::types::{Action, Observation};
use crate::Result;

pub use config::{CognitiveConfig, ContextLimits, ImportanceProfile};

pub struct CognitiveLoopPolicy {
    config: CognitiveConfig,
    llm: Arc<dyn CompletionService>,
    embedder: Option<Arc<dyn Embedder>>,
    /// Completed decisions since construction or the last reset
    step_count: u64,
    last_action: Option<Action>,
}

impl CognitiveLoopPolicy {
    pub fn new(config: CognitiveConfig, llm: Arc<dyn CompletionService>) -> Self {
        Self {
            config,
            llm,
            embedder: None,
            step_count: 0,
            last_action: None,
        }
    }

    /// Attach an embedder; new entries and retrieval queries get embedded.
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn config(&self) -> &CognitiveConfig {
        &self.config
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_action(&self) -> Option<&Action> {
        self.last_action.as_ref()
    }

    /// Feedback runs iff a previous action exists.
    pub fn should_give_feedback(&self) -> bool {
        self.last_action.is_some()
    }

    /// Reflection runs when `step_count` is a positive multiple of the
    /// configured frequency.
    pub fn should_reflect(&self) -> bool {
        let every = self.config.reflection_frequency;
        self.step_count > 0 && every > 0 && self.step_count % every == 0
    }
}

#[async_trait]
impl DecisionPolicy for CognitiveLoopPolicy {
    fn name(&self) -> &str {
        "cognitive_loop"
    }

    async fn decide(&mut self, ctx: AgentContext<'_>, observation: &Observation) -> Result<Action> {
        let AgentContext {
            persona,
            memory,
            plan,
        } = ctx;
        debug!(target = "policy.cognitive", step = self.step_count, "Cognitive cycle start");

        let perceptions = self.perceive(persona, memory, observation).await;
        debug!(target = "cognitive.perceive", count = perceptions.len(), "Perceived");

        if let Some(last_action) = self.last_action.clone() {
            let thoughts = self
                .feedback(persona, memory, plan.as_ref(), observation, &last_action)
                .await;
            debug!(target = "cognitive.feedback", count = thoughts.len(), "Feedback thoughts");
        }

        self.plan(persona, memory, plan).await;

        if self.should_reflect() {
            let insights = self.reflect(persona, memory).await;
            info!(
                target = "cognitive.reflect",
                step = self.step_count,
                count = insights.len(),
                "Reflected"
            );
        }

        let action = self.act(persona, memory, plan.as_ref(), observation).await;

        self.last_action = Some(action.clone());
        self.step_count += 1;
        info!(target = "cognitive.act", action = %action.describe(), "Selected action");
        Ok(action)
    }

    fn state(&self) -> Value {
        json!({
            "policy_type": self.name(),
            "step_count": self.step_count,
            "reflection_frequency": self.config.reflection_frequency,
            "last_action": self.last_action,
            "embeddings": self.embedder.is_some(),
        })
    }

    fn reset(&mut self) {
        self.step_count = 0;
        self.last_action = None;
    }
}
