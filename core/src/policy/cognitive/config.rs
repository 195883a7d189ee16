//! Configuration for the cognitive-loop policy.

use serde::{Deserialize, Serialize};

use crate::memory::{MemoryKind, RetrievalWeights};

/// Importance assigned to entries each phase writes, when the completion
/// service is not asked to score them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportanceProfile {
    pub observation: f32,
    pub thought: f32,
    pub action: f32,
    pub plan: f32,
    pub reflection: f32,
}

impl Default for ImportanceProfile {
    fn default() -> Self {
        Self {
            observation: 0.5,
            thought: 0.5,
            action: 0.5,
            plan: 0.7,
            reflection: 0.8,
        }
    }
}

impl ImportanceProfile {
    pub fn for_kind(&self, kind: MemoryKind) -> f32 {
        match kind {
            MemoryKind::Observation => self.observation,
            MemoryKind::Thought => self.thought,
            MemoryKind::Action => self.action,
            MemoryKind::Plan => self.plan,
            MemoryKind::Reflection => self.reflection,
        }
    }
}

/// How many memories are retrieved as context for each phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
    pub planning: usize,
    pub acting: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            planning: 20,
            acting: 15,
        }
    }
}

/// Configuration for [`super::CognitiveLoopPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitiveConfig {
    /// Reflect every N completed decisions; 0 disables reflection
    pub reflection_frequency: u64,

    /// Upper bound on perception statements stored per step
    pub max_perceptions: usize,

    pub memory_context_limit: ContextLimits,

    /// Number of most recent entries reflection looks at
    pub reflection_window: usize,

    /// Upper bound on insights stored per reflection
    pub max_insights: usize,

    /// Ask the completion service to score each new entry (one extra call per entry)
    pub score_importance_with_llm: bool,

    /// Write the outgoing plan to memory before replacing it
    pub log_superseded_plans: bool,

    pub importance: ImportanceProfile,

    pub planning_weights: RetrievalWeights,

    pub acting_weights: RetrievalWeights,
}

impl Default for CognitiveConfig {
    fn default() -> Self {
        Self {
            reflection_frequency: 3,
            max_perceptions: 12,
            memory_context_limit: ContextLimits::default(),
            reflection_window: 10,
            max_insights: 5,
            score_importance_with_llm: false,
            log_superseded_plans: false,
            importance: ImportanceProfile::default(),
            planning_weights: RetrievalWeights::planning(),
            acting_weights: RetrievalWeights::acting(),
        }
    }
}

impl CognitiveConfig {
    /// Set the reflection cadence
    pub fn with_reflection_frequency(mut self, every: u64) -> Self {
        self.reflection_frequency = every;
        self
    }

    /// Score new entries with the completion service
    pub fn with_llm_importance(mut self) -> Self {
        self.score_importance_with_llm = true;
        self
    }

    pub fn with_superseded_plans_logged(mut self) -> Self {
        self.log_superseded_plans = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: CognitiveConfig = toml::from_str(
            r#"
            reflection_frequency = 5
            [importance]
            reflection = 0.95
            "#,
        )
        .unwrap();
        assert_eq!(cfg.reflection_frequency, 5);
        assert_eq!(cfg.max_perceptions, 12);
        assert_eq!(cfg.memory_context_limit.acting, 15);
        assert_eq!(cfg.importance.for_kind(MemoryKind::Reflection), 0.95);
        assert_eq!(cfg.importance.for_kind(MemoryKind::Plan), 0.7);
        assert_eq!(cfg.planning_weights, RetrievalWeights::planning());
    }
}
