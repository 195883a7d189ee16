use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::CognitiveLoopPolicy;
use crate::llm::{
    decode_json, prompts, ActionPayload, CompletionRequest, ImportancePayload, InsightsPayload,
    ModelTier, PerceptionPayload, PlanPayload, ThoughtsPayload,
};
use crate::memory::{
    to_prompt_lines, MemoryEntry, MemoryKind, MemoryStore, RetrievalWeights, DEFAULT_IMPORTANCE,
};
use crate::types::{Action, Observation, Persona, Plan};
use crate::{Result, UxsimError};

const PERCEIVE_CONTENT_CHARS: usize = 4_000;
const ACT_CONTENT_CHARS: usize = 2_000;
const FEEDBACK_CONTENT_CHARS: usize = 1_000;

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn environment_json(observation: &Observation, content_chars: usize) -> Value {
    json!({
        "url": observation.url,
        "page_content": truncate_chars(&observation.page_content, content_chars),
        "clickables": observation.clickables,
        "inputs": observation.inputs,
        "selects": observation.selects,
        "error_message": observation.error_message,
    })
}

impl CognitiveLoopPolicy {
    async fn complete_json<T: DeserializeOwned + Send>(
        &self,
        system: &str,
        payload: &Value,
        tier: ModelTier,
    ) -> Result<T> {
        let request = CompletionRequest::structured(system, payload).with_tier(tier);
        let response = self.llm.complete(&request).await?;
        decode_json(&response.text)
    }

    async fn embed_one(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(&[text.to_string()]).await {
            Ok(mut vectors) => vectors.pop(),
            Err(e) => {
                warn!(target = "memory", error = %e, "Embedding failed, storing without one");
                None
            }
        }
    }

    async fn score_importance(&self, persona: &Persona, content: &str) -> f32 {
        let payload = json!({
            "persona": persona.background(),
            "intent": persona.intent(),
            "memory": content,
        });
        match self
            .complete_json::<ImportancePayload>(
                prompts::MEMORY_IMPORTANCE_PROMPT,
                &payload,
                ModelTier::Small,
            )
            .await
        {
            Ok(p) if p.score.is_finite() => (p.score / 10.0).clamp(0.0, 1.0) as f32,
            Ok(p) => {
                warn!(target = "memory", score = p.score, "Non-finite importance score");
                DEFAULT_IMPORTANCE
            }
            Err(e) => {
                warn!(target = "memory", error = %e, "Failed to score memory importance");
                DEFAULT_IMPORTANCE
            }
        }
    }

    /// Append one entry, scoring and embedding it when configured.
    async fn record(
        &self,
        persona: &Persona,
        memory: &MemoryStore,
        kind: MemoryKind,
        content: String,
    ) {
        let profile = self.config.importance.for_kind(kind);
        let importance = match (self.config.score_importance_with_llm, kind) {
            // reflections never drop below their profile importance
            (true, MemoryKind::Reflection) => {
                self.score_importance(persona, &content).await.max(profile)
            }
            (true, _) => self.score_importance(persona, &content).await,
            (false, _) => profile,
        };
        let embedding = self.embed_one(&content).await;
        memory.add_with_embedding(kind, content, Some(importance), embedding);
    }

    async fn retrieve(
        &self,
        memory: &MemoryStore,
        query: &str,
        limit: usize,
        weights: &RetrievalWeights,
    ) -> Vec<MemoryEntry> {
        let query_embedding = self.embed_one(query).await;
        memory.retrieve_with(query_embedding.as_deref(), limit, weights)
    }

    /// Perceive phase: turn the observation into at most `max_perceptions`
    /// statements, each logged as an observation entry.
    pub async fn perceive(
        &self,
        persona: &Persona,
        memory: &MemoryStore,
        observation: &Observation,
    ) -> Vec<String> {
        let payload = json!({
            "persona": persona.name(),
            "intent": persona.intent(),
            "environment": environment_json(observation, PERCEIVE_CONTENT_CHARS),
        });

        let perceptions = match self
            .complete_json::<PerceptionPayload>(prompts::PERCEIVE_PROMPT, &payload, ModelTier::Small)
            .await
        {
            Ok(p) => p.observations,
            Err(e) => {
                warn!(target = "cognitive.perceive", error = %e, "Perceive phase produced nothing");
                return Vec::new();
            }
        };

        let perceptions: Vec<String> = perceptions
            .into_iter()
            .take(self.config.max_perceptions)
            .collect();
        for perception in &perceptions {
            self.record(persona, memory, MemoryKind::Observation, perception.clone())
                .await;
        }
        perceptions
    }

    /// Feedback phase: judge `last_action` against the plan; thoughts are logged.
    pub async fn feedback(
        &self,
        persona: &Persona,
        memory: &MemoryStore,
        plan: Option<&Plan>,
        observation: &Observation,
        last_action: &Action,
    ) -> Vec<String> {
        let payload = json!({
            "persona": persona.background(),
            "last_action": last_action,
            "last_plan": plan.map(|p| p.text.as_str()),
            "observation": {
                "url": observation.url,
                "page_content": truncate_chars(&observation.page_content, FEEDBACK_CONTENT_CHARS),
                "error_message": observation.error_message,
            },
        });

        let thoughts = match self
            .complete_json::<ThoughtsPayload>(prompts::FEEDBACK_PROMPT, &payload, ModelTier::Small)
            .await
        {
            Ok(p) => p.thoughts,
            Err(e) => {
                warn!(target = "cognitive.feedback", error = %e, "Feedback phase produced nothing");
                return Vec::new();
            }
        };

        for thought in &thoughts {
            self.record(persona, memory, MemoryKind::Thought, thought.clone())
                .await;
        }
        thoughts
    }

    /// Replace the live plan. On failure the previous plan stays live.
    pub async fn plan(
        &self,
        persona: &Persona,
        memory: &MemoryStore,
        plan: &mut Option<Plan>,
    ) {
        let old_plan = plan.as_ref().map(|p| p.text.clone()).unwrap_or_default();
        let query = format!("{} {}", persona.intent(), old_plan);
        let memories = self
            .retrieve(
                memory,
                query.trim(),
                self.config.memory_context_limit.planning,
                &self.config.planning_weights,
            )
            .await;

        let old_plan = if old_plan.is_empty() {
            "N/A".to_string()
        } else {
            old_plan
        };
        let payload = json!({
            "persona": persona.background(),
            "intent": persona.intent(),
            "memories": to_prompt_lines(&memories),
            "current_timestamp": memory.count(),
            "old_plan": old_plan,
        });

        let decoded = self
            .complete_json::<PlanPayload>(prompts::PLANNING_PROMPT, &payload, ModelTier::Large)
            .await
            .and_then(|p| {
                if p.plan.is_empty() {
                    Err(UxsimError::Decode("plan payload has no plan".into()))
                } else {
                    Ok(p)
                }
            });
        let new_plan = match decoded {
            Ok(p) => Plan {
                text: p.plan,
                rationale: p.rationale,
                next_step: p.next_step,
            },
            Err(e) => {
                warn!(target = "cognitive.plan", error = %e, "Plan phase failed, keeping previous plan");
                return;
            }
        };

        if self.config.log_superseded_plans {
            if let Some(previous) = plan.as_ref() {
                self.record(
                    persona,
                    memory,
                    MemoryKind::Plan,
                    format!("Superseded plan: {}", previous.text),
                )
                .await;
            }
        }

        self.record(persona, memory, MemoryKind::Plan, format!("Plan: {}", new_plan.text))
            .await;
        if !new_plan.rationale.is_empty() {
            self.record(persona, memory, MemoryKind::Thought, new_plan.rationale.clone())
                .await;
        }
        debug!(target = "cognitive.plan", plan = %new_plan.text, next_step = %new_plan.next_step, "Plan replaced");
        *plan = Some(new_plan);
    }

    /// Reflect phase: insights over the last `reflection_window` entries,
    /// logged as reflection entries. Empty memory yields nothing.
    pub async fn reflect(&self, persona: &Persona, memory: &MemoryStore) -> Vec<String> {
        let recent = memory.recent(self.config.reflection_window);
        if recent.is_empty() {
            return Vec::new();
        }

        let payload = json!({
            "persona": persona.background(),
            "current_timestamp": memory.count(),
            "memories": recent
                .iter()
                .map(|m| format!("[{}] {}", m.kind, m.content))
                .collect::<Vec<_>>(),
        });

        let insights = match self
            .complete_json::<InsightsPayload>(prompts::REFLECTION_PROMPT, &payload, ModelTier::Small)
            .await
        {
            Ok(p) => p.insights,
            Err(e) => {
                warn!(target = "cognitive.reflect", error = %e, "Reflect phase produced nothing");
                return Vec::new();
            }
        };

        let insights: Vec<String> = insights.into_iter().take(self.config.max_insights).collect();
        for insight in &insights {
            self.record(persona, memory, MemoryKind::Reflection, insight.clone())
                .await;
        }
        insights
    }

    /// Always returns a well-formed action and logs it to memory.
    pub async fn act(
        &self,
        persona: &Persona,
        memory: &MemoryStore,
        plan: Option<&Plan>,
        observation: &Observation,
    ) -> Action {
        let next_step = plan.map(|p| p.next_step.as_str()).unwrap_or("");
        let query = format!("{} {}", next_step, persona.intent());
        let memories = self
            .retrieve(
                memory,
                query.trim(),
                self.config.memory_context_limit.acting,
                &self.config.acting_weights,
            )
            .await;

        let payload = json!({
            "persona": persona.background(),
            "intent": persona.intent(),
            "plan": plan.map(|p| p.text.as_str()),
            "next_step": next_step,
            "current_timestamp": memory.count(),
            "environment": environment_json(observation, ACT_CONTENT_CHARS),
            "recent_memories": to_prompt_lines(&memories),
        });

        let action = match self
            .complete_json::<ActionPayload>(prompts::ACTION_PROMPT, &payload, ModelTier::Large)
            .await
        {
            Err(e) => {
                warn!(target = "cognitive.act", error = %e, "Act phase failed");
                Action::stop(format!("Act phase failed: {e}"))
            }
            Ok(payload) => match payload.actions.into_iter().next() {
                None => {
                    warn!(target = "cognitive.act", "No actions generated");
                    Action::stop("No valid actions available")
                }
                Some(spec) => match spec.into_action() {
                    Ok(action) => action,
                    Err(e) => {
                        warn!(target = "cognitive.act", error = %e, "Malformed action rejected");
                        Action::stop(format!("Malformed action rejected: {e}"))
                    }
                },
            },
        };

        self.record(
            persona,
            memory,
            MemoryKind::Action,
            format!("Action: {}", action.describe()),
        )
        .await;
        action
    }
}
