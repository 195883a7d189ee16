// Simulation configuration (TOML)
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::environment::MockEnvironmentConfig;
use crate::llm::{CompletionService, Embedder};
use crate::policy::{CognitiveConfig, CognitiveLoopPolicy, ComponentConfig, ComponentPolicy, DecisionPolicy};
use crate::{Result, UxsimError};

/// Which decision policy drives the agent, with its settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    Component(ComponentConfig),
    CognitiveLoop(CognitiveConfig),
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Component(ComponentConfig::default())
    }
}

impl PolicyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            PolicyConfig::Component(_) => "component",
            PolicyConfig::CognitiveLoop(_) => "cognitive_loop",
        }
    }

    /// Instantiate the configured policy. The cognitive loop needs a
    /// completion service; building it without one is a configuration error.
    /// The embedder, when given, backs the cognitive loop's memory retrieval.
    pub fn build(
        &self,
        llm: Option<Arc<dyn CompletionService>>,
        embedder: Option<Arc<dyn Embedder>>,
    ) -> Result<Box<dyn DecisionPolicy>> {
        match self {
            PolicyConfig::Component(cfg) => Ok(Box::new(ComponentPolicy::new(cfg.clone()))),
            PolicyConfig::CognitiveLoop(cfg) => {
                let llm = llm.ok_or_else(|| {
                    UxsimError::Config("cognitive_loop policy requires a completion service".into())
                })?;
                let policy = CognitiveLoopPolicy::new(cfg.clone(), llm);
                Ok(match embedder {
                    Some(embedder) => Box::new(policy.with_embedder(embedder)),
                    None => Box::new(policy),
                })
            }
        }
    }
}

/// Top-level settings for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub max_steps: u32,
    pub policy: PolicyConfig,
    /// Artifacts go to `<output_dir>/<run_id>/`
    pub output_dir: PathBuf,
    pub save_traces: bool,
    /// Pause between steps
    pub step_delay_ms: u64,
    pub environment: MockEnvironmentConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            policy: PolicyConfig::default(),
            output_dir: PathBuf::from("output"),
            save_traces: true,
            step_delay_ms: 0,
            environment: MockEnvironmentConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_policy(mut self, policy: PolicyConfig) -> Self {
        self.policy = policy;
        self
    }

    pub fn without_traces(mut self) -> Self {
        self.save_traces = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.max_steps, 50);
        assert_eq!(cfg.policy.name(), "component");
        assert!(cfg.save_traces);
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_parse_cognitive_policy() {
        let cfg = SimulationConfig::from_toml_str(
            r#"
            max_steps = 7
            save_traces = false

            [policy]
            type = "cognitive_loop"
            reflection_frequency = 2

            [environment]
            max_steps = 3
            "#,
        )
        .unwrap();
        assert_eq!(cfg.max_steps, 7);
        assert!(!cfg.save_traces);
        assert_eq!(cfg.environment.max_steps, 3);
        match cfg.policy {
            PolicyConfig::CognitiveLoop(c) => {
                assert_eq!(c.reflection_frequency, 2);
                assert_eq!(c.max_insights, 5);
            }
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let err = SimulationConfig::from_toml_str("max_steps = \"many\"").unwrap_err();
        assert!(matches!(err, UxsimError::ConfigParseError(_)));
    }

    #[test]
    fn test_cognitive_policy_requires_llm() {
        let policy = PolicyConfig::CognitiveLoop(CognitiveConfig::default());
        assert!(matches!(policy.build(None, None), Err(UxsimError::Config(_))));
        let policy = PolicyConfig::default().build(None, None).unwrap();
        assert_eq!(policy.name(), "component");
    }

    struct NullLlm;

    #[async_trait::async_trait]
    impl CompletionService for NullLlm {
        async fn complete(
            &self,
            _request: &crate::llm::CompletionRequest,
        ) -> Result<crate::llm::CompletionResponse> {
            Ok(crate::llm::CompletionResponse::text(""))
        }
    }

    #[async_trait::async_trait]
    impl Embedder for NullLlm {
        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(inputs.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[test]
    fn test_cognitive_policy_attaches_embedder() {
        let config = PolicyConfig::CognitiveLoop(CognitiveConfig::default());
        let llm: Arc<dyn CompletionService> = Arc::new(NullLlm);
        let embedder: Arc<dyn Embedder> = Arc::new(NullLlm);

        let policy = config.build(Some(llm.clone()), Some(embedder)).unwrap();
        assert_eq!(policy.state()["embeddings"], serde_json::json!(true));

        let policy = config.build(Some(llm), None).unwrap();
        assert_eq!(policy.state()["embeddings"], serde_json::json!(false));
    }
}
