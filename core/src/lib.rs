// UXSim Core Library
// Persona-driven agent simulation runtime

pub mod agent;
pub mod config;
pub mod environment;
pub mod llm;
pub mod memory;
pub mod policy;
pub mod simulation;
pub mod telemetry;
pub mod types;

// Export core types
pub use agent::{Agent, AgentBuilder, AgentStats};
pub use config::{PolicyConfig, SimulationConfig};
pub use environment::{Environment, MockEnvironment, MockEnvironmentConfig, MockPage};
pub use llm::{
    ChatMessage, CompletionRequest, CompletionResponse, CompletionService, Embedder, LlmClient,
    LlmClientConfig, ModelTier, Role,
};
pub use memory::{EntryId, MemoryEntry, MemoryKind, MemoryStore, RetrievalWeights};
pub use policy::{
    AgentContext, CognitiveConfig, CognitiveLoopPolicy, ComponentConfig, ComponentPolicy,
    DecisionPolicy, ImportanceProfile,
};
pub use simulation::{
    run_batch, RunContext, RunSummary, SimulationOutcome, SimulationRunner,
    SimulationRunnerBuilder, StepRecord, TerminationReason,
};
pub use types::{Action, ActionKind, Clickable, InputField, Observation, Persona, Plan, SelectField};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UxsimError {
    /// A component was not wired before use. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("Undecodable completion payload: {0}")]
    Decode(String),

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Policy error: {0}")]
    Policy(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParseError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, UxsimError>;
