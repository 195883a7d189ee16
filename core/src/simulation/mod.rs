//! Simulation runner
//!
//! Drives one agent against one environment:
//!
//! ```text
//!   reset ──▶ decide ──▶ record ──▶ stop? ──yes──▶ finalize
//!               ▲                     │ no
//!               │                     ▼
//!               │                   step ──▶ max steps? ──yes──▶ finalize
//!               │                                │ no
//!               │                                ▼
//!               └──────────────────────── env error? ──yes──▶ finalize
//! ```
//!
//! Finalize always closes the environment and builds a
//! [`SimulationOutcome`]; partial runs are valid outcomes.

pub mod artifacts;
mod context;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};

use crate::agent::{Agent, AgentStats};
use crate::config::SimulationConfig;
use crate::environment::Environment;
use crate::memory::{MemoryEntry, MemoryKind};
use crate::types::{Action, Observation, Persona};
use crate::{Result, UxsimError};

pub use artifacts::write_artifacts;
pub use context::RunContext;

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TerminationReason {
    AgentStopped { message: String },
    MaxStepsReached,
    EnvironmentError { message: String },
    PolicyFailed { message: String },
}

/// One observation/action pair, in step order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// 1-based
    pub step: u32,
    pub observation: Observation,
    pub action: Action,
    /// Error reported by the environment in response to `action`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub steps_taken: u32,
    /// The agent stopped on its own before the step limit
    pub completed: bool,
    pub termination: TerminationReason,
    pub memory_counts: BTreeMap<MemoryKind, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub run_id: String,
    pub persona: Persona,
    pub config: SimulationConfig,
    pub steps: Vec<StepRecord>,
    pub summary: RunSummary,
    pub memory: Vec<MemoryEntry>,
    pub agent: AgentStats,
    pub policy_state: Value,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Directory holding the written artifacts, if any were saved
    pub artifact_dir: Option<PathBuf>,
}

/// Owns one agent and one environment for the duration of a run
pub struct SimulationRunner {
    config: SimulationConfig,
    agent: Agent,
    environment: Box<dyn Environment>,
}

impl SimulationRunner {
    pub fn builder() -> SimulationRunnerBuilder {
        SimulationRunnerBuilder::default()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        self.agent.run_context().run_id()
    }

    /// Drive the run to termination and finalize it.
    ///
    /// Only a failing `reset` is returned as an error; every other failure
    /// ends the run with a recorded [`TerminationReason`].
    pub async fn run(self) -> Result<SimulationOutcome> {
        let span = self.agent.run_context().span().clone();
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> Result<SimulationOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(
            target = "simulation",
            policy = %self.agent.policy_name(),
            max_steps = self.config.max_steps,
            "Starting simulation"
        );

        let mut observation = match self.environment.reset().await {
            Ok(obs) => obs,
            Err(e) => {
                error!(target = "simulation", error = %e, "Environment reset failed");
                self.close_environment().await;
                return Err(e);
            }
        };

        let mut steps: Vec<StepRecord> = Vec::new();
        let termination = if let Some(message) = observation.error_message.clone() {
            warn!(target = "simulation", error = %message, "Environment reported an error on reset");
            TerminationReason::EnvironmentError { message }
        } else if self.config.max_steps == 0 {
            TerminationReason::MaxStepsReached
        } else {
            self.drive(&mut observation, &mut steps).await
        };

        self.close_environment().await;
        let outcome = self.finalize(steps, termination, started_at, clock.elapsed());
        Ok(self.persist(outcome).await)
    }

    async fn drive(
        &mut self,
        observation: &mut Observation,
        steps: &mut Vec<StepRecord>,
    ) -> TerminationReason {
        let delay = Duration::from_millis(self.config.step_delay_ms);
        loop {
            let step = steps.len() as u32 + 1;
            info!(target = "simulation", step, url = %observation.url, "Step");

            let action = match self.agent.decide(observation).await {
                Ok(action) => action,
                Err(e) => {
                    error!(target = "simulation", step, error = %e, "Policy failed");
                    return TerminationReason::PolicyFailed {
                        message: e.to_string(),
                    };
                }
            };

            steps.push(StepRecord {
                step,
                observation: observation.clone(),
                action: action.clone(),
                error: None,
                recorded_at: Utc::now(),
            });

            if let Some(reason) = action.reason() {
                info!(target = "simulation", step, reason = %reason, "Agent stopped");
                return TerminationReason::AgentStopped {
                    message: reason.to_string(),
                };
            }

            *observation = match self.environment.step(&action).await {
                Ok(obs) => obs,
                Err(e) => Observation::error(observation.url.clone(), e.to_string()),
            };
            if let (Some(message), Some(record)) =
                (observation.error_message.as_ref(), steps.last_mut())
            {
                warn!(target = "simulation", step, error = %message, "Environment error");
                record.error = Some(message.clone());
            }

            if step >= self.config.max_steps {
                info!(target = "simulation", step, "Maximum steps reached");
                return TerminationReason::MaxStepsReached;
            }
            if let Some(message) = observation.error_message.clone() {
                return TerminationReason::EnvironmentError { message };
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn close_environment(&mut self) {
        if let Err(e) = self.environment.close().await {
            warn!(target = "simulation", error = %e, "Failed to close environment");
        }
    }

    fn finalize(
        &self,
        steps: Vec<StepRecord>,
        termination: TerminationReason,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> SimulationOutcome {
        let completed = matches!(termination, TerminationReason::AgentStopped { .. });
        let summary = RunSummary {
            steps_taken: steps.len() as u32,
            completed,
            termination,
            memory_counts: self.agent.memory().count_by_kind(),
        };
        info!(
            target = "simulation",
            steps = summary.steps_taken,
            completed,
            duration_ms = elapsed.as_millis() as u64,
            "Simulation complete"
        );

        SimulationOutcome {
            run_id: self.run_id().to_string(),
            persona: self.agent.persona().clone(),
            config: self.config.clone(),
            steps,
            summary,
            memory: self.agent.memory().all(),
            agent: self.agent.stats(),
            policy_state: self.agent.policy_state(),
            started_at,
            duration_ms: elapsed.as_millis() as u64,
            artifact_dir: None,
        }
    }

    async fn persist(&self, mut outcome: SimulationOutcome) -> SimulationOutcome {
        if !self.config.save_traces {
            return outcome;
        }
        let dir = self.config.output_dir.join(&outcome.run_id);
        outcome.artifact_dir = Some(dir.clone());
        if let Err(e) = write_artifacts(&outcome, &dir).await {
            warn!(target = "simulation", error = %e, dir = %dir.display(), "Failed to save results");
            outcome.artifact_dir = None;
        }
        outcome
    }
}

#[derive(Default)]
pub struct SimulationRunnerBuilder {
    config: Option<SimulationConfig>,
    agent: Option<Agent>,
    environment: Option<Box<dyn Environment>>,
}

impl SimulationRunnerBuilder {
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn environment(mut self, environment: impl Environment + 'static) -> Self {
        self.environment = Some(Box::new(environment));
        self
    }

    pub fn boxed_environment(mut self, environment: Box<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Config defaults when not set; agent and environment are required.
    pub fn build(self) -> Result<SimulationRunner> {
        let agent = self
            .agent
            .ok_or_else(|| UxsimError::Config("simulation has no agent".into()))?;
        let environment = self
            .environment
            .ok_or_else(|| UxsimError::Config("simulation has no environment".into()))?;
        Ok(SimulationRunner {
            config: self.config.unwrap_or_default(),
            agent,
            environment,
        })
    }
}

/// Run independent simulations concurrently. Results come back in input order.
pub async fn run_batch(runners: Vec<SimulationRunner>) -> Vec<Result<SimulationOutcome>> {
    let mut set = JoinSet::new();
    let total = runners.len();
    for (index, runner) in runners.into_iter().enumerate() {
        set.spawn(async move { (index, runner.run().await) });
    }

    let mut results: Vec<Option<Result<SimulationOutcome>>> = (0..total).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, result)) => results[index] = Some(result),
            Err(e) => error!(target = "simulation", error = %e, "Simulation task failed"),
        }
    }

    results
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|| Err(UxsimError::Simulation("simulation task did not complete".into())))
        })
        .collect()
}
