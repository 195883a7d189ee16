use std::fs;
use std::path::{Path, PathBuf};

use uxsim_core::{LlmClientConfig, MockEnvironmentConfig, PolicyConfig, SimulationConfig};

/// High-level configuration for the sim_runner demo
#[derive(Clone, Debug)]
pub struct SimRunnerConfig {
    pub simulation: SimulationConfig,
    pub llm: LlmClientConfig,
    /// JSON persona definition; a built-in shopper is used when unset
    pub persona_path: Option<PathBuf>,
}

impl Default for SimRunnerConfig {
    fn default() -> Self {
        let mut simulation = SimulationConfig::default();
        if let Some(steps) = std::env::var("SIM_MAX_STEPS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            simulation.max_steps = steps;
        }
        if let Some(dir) = std::env::var("SIM_OUTPUT_DIR").ok().filter(|s| !s.is_empty()) {
            simulation.output_dir = PathBuf::from(dir);
        }

        Self {
            simulation,
            llm: LlmClientConfig::default(),
            persona_path: std::env::var("SIM_PERSONA")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}

impl SimRunnerConfig {
    /// Load configuration from a TOML file (path via SIM_RUNNER_CONFIG or ./sim_runner.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("SIM_RUNNER_CONFIG").unwrap_or_else(|_| "sim_runner.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "sim_runner", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<SimRunnerToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "sim_runner", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "sim_runner", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn uses_llm(&self) -> bool {
        matches!(self.simulation.policy, PolicyConfig::CognitiveLoop(_))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SimRunnerToml {
    pub persona: Option<PathBuf>,
    pub max_steps: Option<u32>,
    pub output_dir: Option<PathBuf>,
    pub save_traces: Option<bool>,
    pub step_delay_ms: Option<u64>,
    pub policy: Option<PolicyConfig>,
    pub environment: Option<MockEnvironmentConfig>,
    pub llm: Option<LlmToml>,
}

impl SimRunnerToml {
    fn overlay(self, mut base: SimRunnerConfig) -> SimRunnerConfig {
        if let Some(p) = self.persona {
            base.persona_path = Some(p);
        }
        let sim = &mut base.simulation;
        if let Some(v) = self.max_steps {
            sim.max_steps = v;
        }
        if let Some(v) = self.output_dir {
            sim.output_dir = v;
        }
        if let Some(v) = self.save_traces {
            sim.save_traces = v;
        }
        if let Some(v) = self.step_delay_ms {
            sim.step_delay_ms = v;
        }
        if let Some(v) = self.policy {
            sim.policy = v;
        }
        if let Some(v) = self.environment {
            sim.environment = v;
        }
        if let Some(l) = self.llm {
            l.apply(&mut base.llm);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LlmToml {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub small_model: Option<String>,
    pub embedding_model: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: Option<u64>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}
impl LlmToml {
    fn apply(self, l: &mut LlmClientConfig) {
        if let Some(x) = self.base_url {
            l.base_url = x;
        }
        if let Some(x) = self.model {
            l.model = x;
        }
        if let Some(x) = self.small_model {
            l.small_model = Some(x);
        }
        if let Some(x) = self.embedding_model {
            l.embedding_model = x;
        }
        if let Some(x) = self.api_key {
            l.api_key = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            l.request_timeout_ms = x;
        }
        if let Some(x) = self.temperature {
            l.temperature = x;
        }
        if let Some(x) = self.max_tokens {
            l.max_tokens = x;
        }
    }
}
