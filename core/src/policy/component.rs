//! Component policy: a fixed pipeline of pluggable, deterministic parts.
//!
//! Each decision runs relevance check, step cap, action selection and query
//! generation in that order and returns the first result. There is no phase
//! state beyond the count of actions taken, so replaying the same
//! observations through a fresh policy yields the same actions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{AgentContext, DecisionPolicy};
use crate::memory::{MemoryKind, MemoryStore};
use crate::types::{Action, Observation, Persona};
use crate::Result;

/// Configuration for [`ComponentPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentConfig {
    /// Actions taken before the policy stops on its own
    pub max_steps: u32,
    pub use_relevance_check: bool,
    /// Fraction of intent words that must appear on the page
    pub relevance_threshold: f32,
    /// Cycle through query variations instead of repeating the intent query
    pub query_variations: bool,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            use_relevance_check: true,
            relevance_threshold: 0.5,
            query_variations: false,
        }
    }
}

fn intent_words(intent: &str) -> Vec<String> {
    intent
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect()
}

/// Fraction of distinct intent words found in `text`.
fn keyword_overlap(intent: &str, text: &str) -> f32 {
    let mut words = intent_words(intent);
    words.sort();
    words.dedup();
    if words.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let matches = words.iter().filter(|w| text.contains(w.as_str())).count();
    matches as f32 / words.len() as f32
}

// ============================================================================
// Query generation
// ============================================================================

#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// `memory` is the agent's log, for generators that adapt to past queries.
    async fn generate_query(&mut self, persona: &Persona, memory: &MemoryStore) -> Option<String>;

    fn reset(&mut self) {}
}

/// Uses the persona's intent with filler phrases removed.
#[derive(Debug, Default, Clone)]
pub struct IntentQueryGenerator;

const FILLER_PHRASES: [&str; 5] = ["i want to", "i need to", "looking for", "find", "search for"];

impl IntentQueryGenerator {
    pub fn query_for(intent: &str) -> Option<String> {
        let mut query = intent.trim().to_lowercase();
        for phrase in FILLER_PHRASES {
            query = query.replace(phrase, " ");
        }
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        (!query.is_empty()).then_some(query)
    }
}

#[async_trait]
impl QueryGenerator for IntentQueryGenerator {
    async fn generate_query(
        &mut self,
        persona: &Persona,
        _memory: &MemoryStore,
    ) -> Option<String> {
        let query = Self::query_for(persona.intent());
        debug!(target = "policy.component", query = ?query, "Generated intent query");
        query
    }
}

/// Wraps another generator and walks through a fixed list of variations of
/// its query, then repeats the base query.
pub struct VariationQueryGenerator {
    base: Box<dyn QueryGenerator>,
    next_variation: usize,
}

impl VariationQueryGenerator {
    pub fn new(base: Box<dyn QueryGenerator>) -> Self {
        Self {
            base,
            next_variation: 0,
        }
    }

    fn variations(base: &str) -> [String; 5] {
        [
            base.to_string(),
            format!("{base} reviews"),
            format!("best {base}"),
            format!("{base} buy online"),
            format!("cheap {base}"),
        ]
    }
}

#[async_trait]
impl QueryGenerator for VariationQueryGenerator {
    async fn generate_query(&mut self, persona: &Persona, memory: &MemoryStore) -> Option<String> {
        let base = self.base.generate_query(persona, memory).await?;
        let variations = Self::variations(&base);
        let query = match variations.get(self.next_variation) {
            Some(v) => {
                self.next_variation += 1;
                v.clone()
            }
            None => base,
        };
        debug!(target = "policy.component", query = %query, "Generated variation query");
        Some(query)
    }

    fn reset(&mut self) {
        self.next_variation = 0;
        self.base.reset();
    }
}

// ============================================================================
// Action selection
// ============================================================================

#[async_trait]
pub trait ActionSelector: Send + Sync {
    async fn select_action(
        &self,
        persona: &Persona,
        observation: &Observation,
        memory: &MemoryStore,
    ) -> Option<Action>;
}

/// Clicks the clickable whose text shares the most words with the intent.
/// Falls back to the first clickable when nothing matches.
#[derive(Debug, Default, Clone)]
pub struct ClickTopResultSelector;

#[async_trait]
impl ActionSelector for ClickTopResultSelector {
    async fn select_action(
        &self,
        persona: &Persona,
        observation: &Observation,
        _memory: &MemoryStore,
    ) -> Option<Action> {
        let words = intent_words(persona.intent());

        let mut best: Option<(usize, &str)> = None;
        for clickable in &observation.clickables {
            if clickable.id.trim().is_empty() {
                continue;
            }
            let text = format!("{} {}", clickable.text, clickable.id).to_lowercase();
            let score = words.iter().filter(|w| text.contains(w.as_str())).count();
            // strictly greater keeps the earliest of equal scores
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, clickable.id.as_str()));
            }
        }

        let (score, id) = best?;
        if score > 0 {
            info!(target = "policy.component", element_id = %id, score, "Selected clickable");
        } else {
            info!(target = "policy.component", element_id = %id, "Fallback: clicking first clickable");
        }
        Some(Action::click(id))
    }
}

/// Stops when the page already covers enough of the intent, otherwise
/// behaves like [`ClickTopResultSelector`].
#[derive(Debug, Clone)]
pub struct StopOnRelevanceSelector {
    pub threshold: f32,
}

impl Default for StopOnRelevanceSelector {
    fn default() -> Self {
        Self { threshold: 0.7 }
    }
}

#[async_trait]
impl ActionSelector for StopOnRelevanceSelector {
    async fn select_action(
        &self,
        persona: &Persona,
        observation: &Observation,
        memory: &MemoryStore,
    ) -> Option<Action> {
        let score = keyword_overlap(persona.intent(), &observation.page_content);
        if score >= self.threshold {
            info!(target = "policy.component", score, "Found relevant content, stopping");
            return Some(Action::stop("Found relevant content"));
        }
        ClickTopResultSelector
            .select_action(persona, observation, memory)
            .await
    }
}

/// Tries each selector in order and returns the first action produced.
pub struct CompositeActionSelector {
    selectors: Vec<Box<dyn ActionSelector>>,
}

impl CompositeActionSelector {
    pub fn new(selectors: Vec<Box<dyn ActionSelector>>) -> Self {
        Self { selectors }
    }
}

#[async_trait]
impl ActionSelector for CompositeActionSelector {
    async fn select_action(
        &self,
        persona: &Persona,
        observation: &Observation,
        memory: &MemoryStore,
    ) -> Option<Action> {
        for selector in &self.selectors {
            if let Some(action) = selector.select_action(persona, observation, memory).await {
                return Some(action);
            }
        }
        warn!(target = "policy.component", "No selector in composite produced an action");
        None
    }
}

// ============================================================================
// Relevance classification
// ============================================================================

#[async_trait]
pub trait RelevanceClassifier: Send + Sync {
    async fn is_relevant(
        &self,
        observation: &Observation,
        intent: &str,
        memory: &MemoryStore,
    ) -> bool;
}

#[derive(Debug, Clone)]
pub struct KeywordRelevanceClassifier {
    pub threshold: f32,
}

impl Default for KeywordRelevanceClassifier {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

#[async_trait]
impl RelevanceClassifier for KeywordRelevanceClassifier {
    async fn is_relevant(
        &self,
        observation: &Observation,
        intent: &str,
        _memory: &MemoryStore,
    ) -> bool {
        let score = keyword_overlap(intent, &observation.page_content);
        let relevant = score >= self.threshold;
        debug!(
            target = "policy.component",
            score,
            threshold = self.threshold,
            relevant,
            "Keyword relevance"
        );
        relevant
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingStrategy {
    #[default]
    Majority,
    Unanimous,
    Any,
}

pub struct CompositeRelevanceClassifier {
    classifiers: Vec<Box<dyn RelevanceClassifier>>,
    strategy: VotingStrategy,
}

impl CompositeRelevanceClassifier {
    pub fn new(classifiers: Vec<Box<dyn RelevanceClassifier>>, strategy: VotingStrategy) -> Self {
        Self {
            classifiers,
            strategy,
        }
    }
}

#[async_trait]
impl RelevanceClassifier for CompositeRelevanceClassifier {
    async fn is_relevant(
        &self,
        observation: &Observation,
        intent: &str,
        memory: &MemoryStore,
    ) -> bool {
        let mut votes = Vec::with_capacity(self.classifiers.len());
        for classifier in &self.classifiers {
            votes.push(classifier.is_relevant(observation, intent, memory).await);
        }
        let yes = votes.iter().filter(|v| **v).count();
        match self.strategy {
            VotingStrategy::Majority => yes * 2 > votes.len(),
            VotingStrategy::Unanimous => !votes.is_empty() && yes == votes.len(),
            VotingStrategy::Any => yes > 0,
        }
    }
}

// ============================================================================
// Policy
// ============================================================================

pub struct ComponentPolicy {
    config: ComponentConfig,
    query_generator: Box<dyn QueryGenerator>,
    action_selector: Box<dyn ActionSelector>,
    relevance_classifier: Box<dyn RelevanceClassifier>,
    steps_taken: u32,
}

impl ComponentPolicy {
    pub fn new(config: ComponentConfig) -> Self {
        let query_generator: Box<dyn QueryGenerator> = if config.query_variations {
            Box::new(VariationQueryGenerator::new(Box::new(IntentQueryGenerator)))
        } else {
            Box::new(IntentQueryGenerator)
        };
        let relevance_classifier = Box::new(KeywordRelevanceClassifier {
            threshold: config.relevance_threshold,
        });
        Self {
            config,
            query_generator,
            action_selector: Box::new(ClickTopResultSelector),
            relevance_classifier,
            steps_taken: 0,
        }
    }

    pub fn with_query_generator(mut self, generator: Box<dyn QueryGenerator>) -> Self {
        self.query_generator = generator;
        self
    }

    pub fn with_action_selector(mut self, selector: Box<dyn ActionSelector>) -> Self {
        self.action_selector = selector;
        self
    }

    pub fn with_relevance_classifier(mut self, classifier: Box<dyn RelevanceClassifier>) -> Self {
        self.relevance_classifier = classifier;
        self
    }

    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    async fn pick(
        &mut self,
        persona: &Persona,
        memory: &MemoryStore,
        observation: &Observation,
    ) -> Action {
        if self.config.use_relevance_check
            && self.steps_taken > 0
            && self
                .relevance_classifier
                .is_relevant(observation, persona.intent(), memory)
                .await
        {
            info!(target = "policy.component", "Found relevant content, stopping search");
            return Action::stop("Found relevant content");
        }

        if self.steps_taken >= self.config.max_steps {
            info!(target = "policy.component", max_steps = self.config.max_steps, "Max steps reached");
            return Action::stop("Maximum steps reached");
        }

        if !observation.clickables.is_empty() && self.steps_taken > 0 {
            if let Some(action) = self
                .action_selector
                .select_action(persona, observation, memory)
                .await
            {
                self.steps_taken += 1;
                return action;
            }
        }

        if self.steps_taken == 0 || observation.clickables.is_empty() {
            if let Some(query) = self.query_generator.generate_query(persona, memory).await {
                self.steps_taken += 1;
                return Action::search(query);
            }
        }

        warn!(target = "policy.component", "No suitable action found, stopping");
        Action::stop("No suitable action available")
    }
}

impl Default for ComponentPolicy {
    fn default() -> Self {
        Self::new(ComponentConfig::default())
    }
}

#[async_trait]
impl DecisionPolicy for ComponentPolicy {
    fn name(&self) -> &str {
        "component"
    }

    async fn decide(&mut self, ctx: AgentContext<'_>, observation: &Observation) -> Result<Action> {
        let action = self.pick(ctx.persona, ctx.memory, observation).await;
        ctx.memory
            .add(MemoryKind::Action, format!("Action: {}", action.describe()), None);
        Ok(action)
    }

    fn state(&self) -> Value {
        json!({
            "policy_type": self.name(),
            "steps_taken": self.steps_taken,
            "max_steps": self.config.max_steps,
            "use_relevance_check": self.config.use_relevance_check,
        })
    }

    fn reset(&mut self) {
        self.steps_taken = 0;
        self.query_generator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn persona() -> Persona {
        Persona::new("Dana", "Runner", "I want to find trail running shoes")
    }

    #[test]
    fn test_intent_query_strips_filler() {
        assert_eq!(
            IntentQueryGenerator::query_for("I want to find trail running shoes"),
            Some("trail running shoes".to_string())
        );
        assert_eq!(IntentQueryGenerator::query_for("  find  "), None);
    }

    #[tokio::test]
    async fn test_variation_generator_cycles_then_repeats() {
        let mut gen = VariationQueryGenerator::new(Box::new(IntentQueryGenerator));
        let memory = MemoryStore::new();
        let p = Persona::new("A", "", "tea");
        let mut queries = Vec::new();
        for _ in 0..6 {
            queries.push(gen.generate_query(&p, &memory).await.unwrap());
        }
        assert_eq!(
            queries,
            vec!["tea", "tea reviews", "best tea", "tea buy online", "cheap tea", "tea"]
        );
        gen.reset();
        assert_eq!(gen.generate_query(&p, &memory).await.unwrap(), "tea");
    }

    #[tokio::test]
    async fn test_click_top_result_prefers_overlap() {
        let memory = MemoryStore::new();
        let obs = Observation::new("http://shop/results", "results")
            .with_clickable("r1", "Office chairs")
            .with_clickable("r2", "Trail running shoes - sale")
            .with_clickable("r3", "Running shoes");
        let action = ClickTopResultSelector.select_action(&persona(), &obs, &memory).await;
        assert_eq!(action, Some(Action::click("r2")));

        let obs = Observation::new("http://shop/x", "")
            .with_clickable("a", "Lamps")
            .with_clickable("b", "Rugs");
        let action = ClickTopResultSelector.select_action(&persona(), &obs, &memory).await;
        assert_eq!(action, Some(Action::click("a")));

        let empty = Observation::new("http://shop/x", "");
        assert!(ClickTopResultSelector.select_action(&persona(), &empty, &memory).await.is_none());
    }

    #[tokio::test]
    async fn test_composite_relevance_voting() {
        let memory = MemoryStore::new();
        let obs = Observation::new("u", "trail running shoes on sale");
        let strict = || -> Box<dyn RelevanceClassifier> {
            Box::new(KeywordRelevanceClassifier { threshold: 1.0 })
        };
        let loose = || -> Box<dyn RelevanceClassifier> {
            Box::new(KeywordRelevanceClassifier { threshold: 0.1 })
        };
        let intent = "cheap trail running shoes";

        let any = CompositeRelevanceClassifier::new(vec![strict(), loose()], VotingStrategy::Any);
        assert!(any.is_relevant(&obs, intent, &memory).await);
        let all = CompositeRelevanceClassifier::new(vec![strict(), loose()], VotingStrategy::Unanimous);
        assert!(!all.is_relevant(&obs, intent, &memory).await);
        let majority =
            CompositeRelevanceClassifier::new(vec![strict(), loose(), loose()], VotingStrategy::Majority);
        assert!(majority.is_relevant(&obs, intent, &memory).await);
    }

    #[tokio::test]
    async fn test_pipeline_order() {
        let mut policy = ComponentPolicy::new(ComponentConfig {
            max_steps: 2,
            ..Default::default()
        });
        let persona = persona();
        let memory = MemoryStore::new();
        let mut plan = None;

        let home = Observation::new("http://shop", "Welcome").with_clickable("deals", "Deals");
        let action = policy
            .decide(
                AgentContext { persona: &persona, memory: &memory, plan: &mut plan },
                &home,
            )
            .await
            .unwrap();
        assert_eq!(action, Action::search("trail running shoes"));

        let results = Observation::new("http://shop/s", "Results")
            .with_clickable("r1", "Trail shoes");
        let action = policy
            .decide(
                AgentContext { persona: &persona, memory: &memory, plan: &mut plan },
                &results,
            )
            .await
            .unwrap();
        assert_eq!(action, Action::click("r1"));

        let action = policy
            .decide(
                AgentContext { persona: &persona, memory: &memory, plan: &mut plan },
                &results,
            )
            .await
            .unwrap();
        assert_eq!(action.reason(), Some("Maximum steps reached"));

        let relevant = Observation::new("http://shop/p", "Trail running shoes, size 42");
        let action = policy
            .decide(
                AgentContext { persona: &persona, memory: &memory, plan: &mut plan },
                &relevant,
            )
            .await
            .unwrap();
        assert_eq!(action.reason(), Some("Found relevant content"));

        assert_eq!(memory.of_kind(MemoryKind::Action).len(), 4);
        assert_eq!(policy.state()["steps_taken"], 2);
    }
}
