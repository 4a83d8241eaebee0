//! Language-model client behind the optional selection override and model-phrased replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, instrument};
use trailhead_core::config::LlmConfig;

/// Which configured model serves a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelTier {
    LowLatency,
    Thinking,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("language model is disabled")]
    Disabled,
    #[error("invalid llm configuration: {0}")]
    InvalidConfig(String),
    #[error("llm request timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    #[error("llm http failure (status {status:?}): {message}")]
    Http { status: Option<u16>, message: String },
    #[error("unexpected llm response: {0}")]
    ResponseFormat(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String, LlmError>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint (OpenAI, Ollama).
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    thinking_model: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::InvalidConfig(error.to_string()))?;

        Ok(Self {
            http,
            base_url: config.effective_base_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            thinking_model: config.thinking_model.clone(),
            timeout,
        })
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::LowLatency => &self.model,
            ModelTier::Thinking => &self.thinking_model,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(api_key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                .map_err(|_| {
                    LlmError::InvalidConfig("api key contains invalid header characters".into())
                })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = %self.model_for(tier)))]
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String, LlmError> {
        let body = build_request_body(self.model_for(tier), prompt);
        let response = self
            .http
            .post(self.completions_url())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout {
                        elapsed_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                } else {
                    LlmError::Http {
                        status: error.status().map(|status| status.as_u16()),
                        message: error.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|error| LlmError::ResponseFormat(format!("unreadable body: {error}")))?;
        if !status.is_success() {
            return Err(LlmError::Http {
                status: Some(status.as_u16()),
                message: text.chars().take(200).collect(),
            });
        }

        let content = parse_completion(&text)?;
        debug!(event_name = "llm.completion.received", chars = content.len(), "llm replied");
        Ok(content)
    }
}

/// Builds the client when the model is enabled; `None` means rules only.
pub fn client_from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, LlmError> {
    if !config.enabled {
        return Ok(None);
    }
    let client: Arc<dyn LlmClient> = Arc::new(ChatCompletionsClient::from_config(config)?);
    Ok(Some(client))
}

pub fn build_request_body(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "temperature": 0.1,
        "messages": [
            { "role": "user", "content": prompt }
        ]
    })
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

pub fn parse_completion(body: &str) -> Result<String, LlmError> {
    let response = serde_json::from_str::<CompletionResponse>(body)
        .map_err(|error| LlmError::ResponseFormat(error.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| LlmError::ResponseFormat("completion has no content".to_string()))
}
