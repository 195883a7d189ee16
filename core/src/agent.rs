// Agent: persona, memory, live plan and one decision policy
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn, Instrument};

use crate::memory::{MemoryKind, MemoryStore};
use crate::policy::{AgentContext, DecisionPolicy};
use crate::simulation::RunContext;
use crate::types::{Action, Observation, Persona, Plan};
use crate::{Result, UxsimError};

/// Snapshot of an agent's counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStats {
    pub persona_name: String,
    pub intent: String,
    pub total_steps: u64,
    pub memory_count: usize,
    pub memory_counts: BTreeMap<MemoryKind, usize>,
    pub current_plan: Option<Plan>,
    pub policy: String,
}

/// Agent instance
///
/// The policy is bound at construction and cannot be swapped. The memory
/// store lives exactly as long as the agent.
pub struct Agent {
    persona: Persona,
    memory: MemoryStore,
    plan: Option<Plan>,
    policy: Box<dyn DecisionPolicy>,
    total_steps: u64,
    run: RunContext,
}

impl Agent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::default()
    }

    /// Decide on the next action.
    ///
    /// The returned action is always well-formed: a malformed action from the
    /// policy is replaced by `stop` before it can reach the environment.
    pub async fn decide(&mut self, observation: &Observation) -> Result<Action> {
        let span = self.run.span().clone();
        async move {
            let ctx = AgentContext {
                persona: &self.persona,
                memory: &self.memory,
                plan: &mut self.plan,
            };
            let action = self.policy.decide(ctx, observation).await?;

            let action = match action.validate() {
                Ok(()) => action,
                Err(e) => {
                    warn!(target = "agent", error = %e, "Policy produced a malformed action");
                    Action::stop(format!("Malformed action rejected: {e}"))
                }
            };

            self.update_memory(&action);
            Ok(action)
        }
        .instrument(span)
        .await
    }

    /// Post-decision bookkeeping. Runs once per decision, after the action is final.
    fn update_memory(&mut self, action: &Action) {
        self.total_steps += 1;
        debug!(
            target = "agent",
            total_steps = self.total_steps,
            memory_count = self.memory.count(),
            action = %action.kind,
            "Decision recorded"
        );
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn policy_state(&self) -> Value {
        self.policy.state()
    }

    pub fn run_context(&self) -> &RunContext {
        &self.run
    }

    /// Borrow persona, memory and the live plan, e.g. to run cognitive
    /// phases by hand outside of [`Agent::decide`].
    pub fn context(&mut self) -> AgentContext<'_> {
        AgentContext {
            persona: &self.persona,
            memory: &self.memory,
            plan: &mut self.plan,
        }
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            persona_name: self.persona.name().to_string(),
            intent: self.persona.intent().to_string(),
            total_steps: self.total_steps,
            memory_count: self.memory.count(),
            memory_counts: self.memory.count_by_kind(),
            current_plan: self.plan.clone(),
            policy: self.policy.name().to_string(),
        }
    }
}

/// Builder for [`Agent`]. Persona and policy are required.
#[derive(Default)]
pub struct AgentBuilder {
    persona: Option<Persona>,
    policy: Option<Box<dyn DecisionPolicy>>,
    memory: Option<MemoryStore>,
    run: Option<RunContext>,
}

impl AgentBuilder {
    pub fn persona(mut self, persona: Persona) -> Self {
        self.persona = Some(persona);
        self
    }

    pub fn policy(mut self, policy: impl DecisionPolicy + 'static) -> Self {
        self.policy = Some(Box::new(policy));
        self
    }

    pub fn boxed_policy(mut self, policy: Box<dyn DecisionPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Start from a pre-seeded memory store instead of an empty one.
    pub fn memory(mut self, memory: MemoryStore) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn run_context(mut self, run: RunContext) -> Self {
        self.run = Some(run);
        self
    }

    pub fn build(self) -> Result<Agent> {
        let persona = self
            .persona
            .ok_or_else(|| UxsimError::Config("agent has no persona".into()))?;
        let policy = self
            .policy
            .ok_or_else(|| UxsimError::Config("agent has no decision policy".into()))?;
        let run = self
            .run
            .unwrap_or_else(|| RunContext::generate(persona.name()));

        Ok(Agent {
            persona,
            memory: self.memory.unwrap_or_default(),
            plan: None,
            policy,
            total_steps: 0,
            run,
        })
    }
}
