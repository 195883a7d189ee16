//! Tests for the simulation runner: termination, artifacts and batches.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};
use uxsim_core::simulation::artifacts::{MEMORY_FILE, RESULTS_FILE, TRACE_FILE};
use uxsim_core::{
    run_batch, Action, Agent, AgentContext, CognitiveConfig, CognitiveLoopPolicy,
    CompletionRequest, CompletionResponse, CompletionService, ComponentPolicy, DecisionPolicy,
    Environment, MockEnvironment, MockEnvironmentConfig, MockPage, Observation, Persona, Result,
    RunContext, SimulationConfig, SimulationRunner, TerminationReason, UxsimError,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Replays a fixed list of actions, then stops. Counts decisions.
struct ScriptedPolicy {
    actions: VecDeque<Action>,
    decisions: Arc<AtomicUsize>,
    fail_at: Option<usize>,
}

impl ScriptedPolicy {
    fn new(actions: Vec<Action>) -> Self {
        Self {
            actions: actions.into(),
            decisions: Arc::new(AtomicUsize::new(0)),
            fail_at: None,
        }
    }

    fn failing_at(mut self, decision: usize) -> Self {
        self.fail_at = Some(decision);
        self
    }
}

#[async_trait]
impl DecisionPolicy for ScriptedPolicy {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&mut self, ctx: AgentContext<'_>, _observation: &Observation) -> Result<Action> {
        let n = self.decisions.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(n) {
            return Err(UxsimError::Policy("scripted failure".into()));
        }
        let action = self
            .actions
            .pop_front()
            .unwrap_or_else(|| Action::stop("script exhausted"));
        ctx.memory
            .add(uxsim_core::MemoryKind::Action, action.describe(), None);
        Ok(action)
    }

    fn state(&self) -> Value {
        json!({ "remaining": self.actions.len() })
    }

    fn reset(&mut self) {}
}

/// Always clicks the same element.
struct ClickForever;

#[async_trait]
impl DecisionPolicy for ClickForever {
    fn name(&self) -> &str {
        "click_forever"
    }

    async fn decide(&mut self, _ctx: AgentContext<'_>, _observation: &Observation) -> Result<Action> {
        Ok(Action::click("link1"))
    }

    fn state(&self) -> Value {
        Value::Null
    }

    fn reset(&mut self) {}
}

/// Completion service whose every reply carries an empty action list.
struct EmptyActionsLlm;

#[async_trait]
impl CompletionService for EmptyActionsLlm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<CompletionResponse> {
        Ok(CompletionResponse::text(r#"{"actions": []}"#))
    }
}

mock! {
    pub Env {}

    #[async_trait]
    impl Environment for Env {
        async fn reset(&mut self) -> Result<Observation>;
        async fn observe(&mut self) -> Result<Observation>;
        async fn step(&mut self, action: &Action) -> Result<Observation>;
        async fn close(&mut self) -> Result<()>;
    }
}

fn persona(name: &str) -> Persona {
    Persona::new(name, "Test shopper", "I want to find tea")
}

fn agent(policy: impl DecisionPolicy + 'static) -> Agent {
    Agent::builder()
        .persona(persona("Tester"))
        .policy(policy)
        .build()
        .unwrap()
}

fn pages(n: usize) -> Vec<MockPage> {
    (0..n)
        .map(|i| MockPage::new(format!("http://shop/{i}"), format!("Page {i}")))
        .collect()
}

fn config(max_steps: u32) -> SimulationConfig {
    SimulationConfig::default()
        .with_max_steps(max_steps)
        .without_traces()
}

fn runner(
    config: SimulationConfig,
    agent: Agent,
    environment: impl Environment + 'static,
) -> SimulationRunner {
    SimulationRunner::builder()
        .config(config)
        .agent(agent)
        .environment(environment)
        .build()
        .unwrap()
}

// ============================================================================
// Termination
// ============================================================================

#[tokio::test]
async fn test_agent_stop_ends_run() {
    let policy = ScriptedPolicy::new(vec![Action::search("tea"), Action::stop("done")]);
    let decisions = Arc::clone(&policy.decisions);
    let outcome = runner(config(5), agent(policy), MockEnvironment::with_pages(pages(3)))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.steps.len(), 2);
    assert_eq!(decisions.load(Ordering::SeqCst), 2);
    assert!(outcome.summary.completed);
    assert_eq!(
        outcome.summary.termination,
        TerminationReason::AgentStopped {
            message: "done".into()
        }
    );
    assert_eq!(outcome.steps[0].step, 1);
    assert_eq!(outcome.steps[0].observation.url, "http://shop/0");
    assert_eq!(outcome.steps[1].observation.url, "http://shop/1");
    assert!(outcome.steps[1].action.is_stop());
    assert_eq!(outcome.agent.total_steps, 2);
    assert!(outcome.artifact_dir.is_none());
}

#[tokio::test]
async fn test_max_steps_ends_run() {
    let env = MockEnvironment::new(MockEnvironmentConfig {
        pages: pages(10),
        max_steps: 100,
    });
    let outcome = runner(config(3), agent(ClickForever), env)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.steps.len(), 3);
    assert!(!outcome.summary.completed);
    assert_eq!(outcome.summary.termination, TerminationReason::MaxStepsReached);
    let steps: Vec<u32> = outcome.steps.iter().map(|s| s.step).collect();
    assert_eq!(steps, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_zero_max_steps_takes_no_steps() {
    let policy = ScriptedPolicy::new(vec![Action::search("tea")]);
    let decisions = Arc::clone(&policy.decisions);
    let outcome = runner(config(0), agent(policy), MockEnvironment::with_pages(pages(1)))
        .run()
        .await
        .unwrap();

    assert!(outcome.steps.is_empty());
    assert_eq!(decisions.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.summary.termination, TerminationReason::MaxStepsReached);
}

#[tokio::test]
async fn test_environment_error_ends_run() {
    let env = MockEnvironment::new(MockEnvironmentConfig {
        pages: pages(10),
        max_steps: 1,
    });
    let outcome = runner(config(10), agent(ClickForever), env)
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps[0].error.is_none());
    assert_eq!(
        outcome.steps[1].error.as_deref(),
        Some("Mock environment reached max steps")
    );
    assert!(matches!(
        outcome.summary.termination,
        TerminationReason::EnvironmentError { .. }
    ));
}

#[tokio::test]
async fn test_policy_failure_is_recorded() {
    let policy = ScriptedPolicy::new(vec![Action::search("tea")]).failing_at(1);
    let outcome = runner(config(5), agent(policy), MockEnvironment::with_pages(pages(3)))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.steps.len(), 1);
    match outcome.summary.termination {
        TerminationReason::PolicyFailed { message } => assert!(message.contains("scripted failure")),
        other => panic!("unexpected termination {other:?}"),
    }
}

#[tokio::test]
async fn test_cognitive_policy_with_no_actions_stops_at_first_step() {
    let policy = CognitiveLoopPolicy::new(CognitiveConfig::default(), Arc::new(EmptyActionsLlm));
    let outcome = runner(config(5), agent(policy), MockEnvironment::with_pages(pages(3)))
        .run()
        .await
        .unwrap();

    assert_eq!(outcome.steps.len(), 1);
    assert_eq!(
        outcome.summary.termination,
        TerminationReason::AgentStopped {
            message: "No valid actions available".into()
        }
    );
    assert_eq!(outcome.policy_state["step_count"], 1);
}

#[tokio::test]
async fn test_component_policy_against_mock_site() {
    let env = MockEnvironment::with_pages(vec![
        MockPage::new("http://shop/", "Welcome"),
        MockPage::new("http://shop/s", "Results for tea"),
        MockPage::new("http://shop/p", "Find green tea here, I want it"),
    ]);
    let outcome = runner(config(10), agent(ComponentPolicy::default()), env)
        .run()
        .await
        .unwrap();

    assert!(outcome.summary.completed);
    assert!(outcome.steps[0].action.param_str("query").is_some());
    assert_eq!(
        outcome.steps.last().unwrap().action.reason(),
        Some("Found relevant content")
    );
}

// ============================================================================
// Environment failures (mockall)
// ============================================================================

#[tokio::test]
async fn test_reset_failure_is_returned_and_environment_closed() {
    let mut env = MockEnv::new();
    env.expect_reset()
        .times(1)
        .returning(|| Err(UxsimError::Environment("browser did not start".into())));
    env.expect_step().times(0);
    env.expect_close().times(1).returning(|| Ok(()));

    let err = runner(config(5), agent(ClickForever), env)
        .run()
        .await
        .unwrap_err();
    assert!(matches!(err, UxsimError::Environment(_)));
}

#[tokio::test]
async fn test_error_on_reset_observation_ends_run() {
    let mut env = MockEnv::new();
    env.expect_reset()
        .returning(|| Ok(Observation::error("about:blank", "page failed to load")));
    env.expect_step().times(0);
    env.expect_close().returning(|| Ok(()));

    let outcome = runner(config(5), agent(ClickForever), env)
        .run()
        .await
        .unwrap();
    assert!(outcome.steps.is_empty());
    assert_eq!(
        outcome.summary.termination,
        TerminationReason::EnvironmentError {
            message: "page failed to load".into()
        }
    );
}

#[tokio::test]
async fn test_step_error_is_recorded_on_the_step() {
    let mut env = MockEnv::new();
    env.expect_reset()
        .returning(|| Ok(Observation::new("http://shop/", "Welcome")));
    env.expect_step()
        .times(1)
        .returning(|_| Err(UxsimError::Environment("element not found".into())));
    env.expect_close()
        .times(1)
        .returning(|| Err(UxsimError::Environment("already closed".into())));

    let outcome = runner(config(5), agent(ClickForever), env)
        .run()
        .await
        .unwrap();
    assert_eq!(outcome.steps.len(), 1);
    assert!(outcome.steps[0]
        .error
        .as_deref()
        .unwrap()
        .contains("element not found"));
    assert!(matches!(
        outcome.summary.termination,
        TerminationReason::EnvironmentError { .. }
    ));
}

// ============================================================================
// Artifacts
// ============================================================================

#[tokio::test]
async fn test_artifacts_written_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SimulationConfig {
        output_dir: dir.path().to_path_buf(),
        ..config(5)
    };
    let cfg = SimulationConfig {
        save_traces: true,
        ..cfg
    };
    let agent = Agent::builder()
        .persona(persona("Tester"))
        .policy(ScriptedPolicy::new(vec![
            Action::search("tea"),
            Action::click("link1"),
            Action::stop("done"),
        ]))
        .run_context(RunContext::new("run-artifacts", "Tester"))
        .build()
        .unwrap();

    let outcome = runner(cfg, agent, MockEnvironment::with_pages(pages(3)))
        .run()
        .await
        .unwrap();

    let run_dir = dir.path().join("run-artifacts");
    assert_eq!(outcome.artifact_dir.as_deref(), Some(run_dir.as_path()));
    for file in [RESULTS_FILE, MEMORY_FILE, TRACE_FILE] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }

    let trace: Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join(TRACE_FILE)).unwrap()).unwrap();
    assert_eq!(trace.as_array().unwrap().len(), 3);
    assert_eq!(trace[0]["action"]["type"], "search");

    let memory: Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join(MEMORY_FILE)).unwrap()).unwrap();
    assert_eq!(memory.as_array().unwrap().len(), 3);

    let results: Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join(RESULTS_FILE)).unwrap()).unwrap();
    assert_eq!(results["run_id"], "run-artifacts");
    assert_eq!(results["summary"]["termination"]["reason"], "agent_stopped");
}

// ============================================================================
// Builders and batches
// ============================================================================

#[tokio::test]
async fn test_runner_requires_environment() {
    let result = SimulationRunner::builder().agent(agent(ClickForever)).build();
    assert!(matches!(result, Err(UxsimError::Config(_))));
}

#[tokio::test]
async fn test_batch_preserves_input_order() {
    let names = ["Ana", "Ben", "Cleo"];
    let runners: Vec<SimulationRunner> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let mut actions = vec![Action::wait(0.0); i];
            actions.push(Action::stop("done"));
            let agent = Agent::builder()
                .persona(persona(name))
                .policy(ScriptedPolicy::new(actions))
                .build()
                .unwrap();
            runner(config(10), agent, MockEnvironment::with_pages(pages(2)))
        })
        .collect();

    let results = run_batch(runners).await;
    assert_eq!(results.len(), 3);
    for (i, (result, name)) in results.into_iter().zip(names).enumerate() {
        let outcome = result.unwrap();
        assert_eq!(outcome.persona.name(), name);
        assert_eq!(outcome.steps.len(), i + 1);
        assert_ne!(outcome.run_id, "");
    }
}
