//! LLM module: completion-service contract, HTTP client, structured decoding
//!
//! This module provides:
//! - `CompletionService` / `Embedder` traits consumed by the decision policies
//! - `LlmClientConfig`, `LlmClient` for talking to OpenAI-compatible backends
//! - `decode_json` and the structured payload shapes returned by each phase
//! - `prompts`: system prompts for the cognitive cycle

mod client;
mod decode;
pub mod prompts;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

pub use client::{LlmClient, LlmClientConfig};
pub use decode::{
    decode_json, extract_json_object, ActionPayload, ActionSpec, ImportancePayload,
    InsightsPayload, PerceptionPayload, PlanPayload, ThoughtsPayload,
};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Model size class requested by a phase. Cheap phases (perception,
/// reflection, scoring) use `Small`; planning and acting use `Large`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    #[default]
    Small,
    Large,
}

/// Request to a completion service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Ask the backend for a JSON object response
    pub json_mode: bool,
    pub tier: ModelTier,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            json_mode: false,
            tier: ModelTier::default(),
        }
    }

    /// System prompt plus a JSON user payload, requesting structured output.
    pub fn structured(system: impl Into<String>, payload: &Value) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system),
                ChatMessage::user(payload.to_string()),
            ],
            json_mode: true,
            tier: ModelTier::default(),
        }
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    /// Content of the leading system message, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Response from a completion service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
    pub model: Option<String>,
    pub usage: Option<Value>,
}

impl CompletionResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// External completion service consumed by policy phases.
///
/// Failures are returned as errors; callers decide whether a failure degrades
/// to an empty contribution or a fallback action.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;
}

/// Optional semantic embedding service used for similarity-aware retrieval.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each input; the output has one vector per input, in order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;
}
