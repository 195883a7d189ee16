use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use super::{CompletionRequest, CompletionResponse, CompletionService, Embedder, ModelTier};
use crate::{Result, UxsimError};

/// Configuration for LlmClient loaded from environment variables
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String, // e.g., https://api.openai.com/v1
    pub model: String,    // large tier, e.g., gpt-4o
    pub small_model: Option<String>,
    pub embedding_model: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("LLM_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: std::env::var("LLM_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o".to_string()),
            small_model: std::env::var("LLM_SMALL_MODEL")
                .ok()
                .filter(|s| !s.is_empty()),
            embedding_model: std::env::var("LLM_EMBEDDING_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            api_key: std::env::var("LLM_API_KEY").ok().filter(|s| !s.is_empty()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
            temperature: std::env::var("LLM_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse::<f32>().ok())
                .unwrap_or(0.7),
            max_tokens: std::env::var("LLM_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(1_000),
        }
    }
}

impl LlmClientConfig {
    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Large => &self.model,
            ModelTier::Small => self.small_model.as_deref().unwrap_or(&self.model),
        }
    }
}

/// HTTP client for OpenAI-compatible chat completion and embedding endpoints
#[derive(Clone)]
pub struct LlmClient {
    pub(crate) http: Client,
    pub(crate) cfg: LlmClientConfig,
}

impl LlmClient {
    pub fn new(cfg: LlmClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| UxsimError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmClientConfig::default())
    }

    pub fn config(&self) -> &LlmClientConfig {
        &self.cfg
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), path);
        debug!(target = "llm_client", "POST {}", url);

        let mut req = self
            .http
            .post(&url)
            .header("content-type", "application/json");
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .json(body)
            .send()
            .await
            .map_err(|e| UxsimError::Completion(format!("{path} HTTP error: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!(target = "llm_client", %status, body = %text, "LLM backend error");
            return Err(UxsimError::Completion(format!(
                "{path} error: status={status} body={text}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| UxsimError::Completion(format!("Failed to parse {path} JSON: {e}")))
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    /// Contract:
    /// - Input: role-tagged messages, JSON-mode flag, model tier
    /// - Output: assistant text (a JSON object in JSON mode)
    /// - Error: network, HTTP status, or missing content
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let mut body = json!({
            "model": self.cfg.model_for(request.tier),
            "messages": request.messages,
            "max_tokens": self.cfg.max_tokens,
            "temperature": self.cfg.temperature,
        });
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }

        let val = self.post_json("chat/completions", &body).await?;
        let text = extract_text_from_chat_completions(&val).ok_or_else(|| {
            UxsimError::Completion("Missing choices[0].message.content in chat completions".into())
        })?;

        Ok(CompletionResponse {
            text,
            model: val
                .get("model")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            usage: val.get("usage").cloned(),
        })
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "model": self.cfg.embedding_model,
            "input": inputs,
        });
        let val = self.post_json("embeddings", &body).await?;
        let vectors = extract_embeddings(&val).ok_or_else(|| {
            UxsimError::Completion("Missing data[].embedding in embeddings response".into())
        })?;
        if vectors.len() != inputs.len() {
            return Err(UxsimError::Completion(format!(
                "Expected {} embeddings, got {}",
                inputs.len(),
                vectors.len()
            )));
        }
        Ok(vectors)
    }
}

fn extract_text_from_chat_completions(v: &Value) -> Option<String> {
    v.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(|s| s.to_string())
}

fn extract_embeddings(v: &Value) -> Option<Vec<Vec<f32>>> {
    v.get("data")?
        .as_array()?
        .iter()
        .map(|item| {
            item.get("embedding")?
                .as_array()?
                .iter()
                .map(|x| x.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<f32>>>()
        })
        .collect()
}
