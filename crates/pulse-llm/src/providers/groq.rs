//! Groq provider implementation
//!
//! Groq serves open-weight models behind an OpenAI-compatible chat
//! completions API. See: https://console.groq.com/docs/api-reference
//!
//! # Example
//!
//! ```no_run
//! use pulse_llm::{CompletionRequest, LLMProvider};
//! use pulse_llm::providers::{GroqConfig, GroqProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GroqConfig::new(std::env::var("GROQ_API_KEY")?)
//!         .with_fallback_model("mixtral-8x7b-32768");
//!     let provider = GroqProvider::with_config(config)?;
//!
//!     let request = CompletionRequest::prompt("llama-3.3-70b-versatile", "Hello!")
//!         .with_max_tokens(100);
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.text());
//!     Ok(())
//! }
//! ```

use crate::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, Result, Role,
    StopReason, TokenUsage,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for the Groq provider
#[derive(Debug, Clone)]
pub struct GroqConfig {
    /// API key for authentication
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API, without a trailing slash
    pub api_base: String,

    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,

    /// Model to use once when the requested model is reported missing
    pub fallback_model: Option<String>,
}

impl GroqConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_GROQ_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            fallback_model: None,
        }
    }

    /// Set custom API base URL (any OpenAI-compatible endpoint)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the fallback model
    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = Some(model.into());
        self
    }
}

/// Groq chat-completion provider
pub struct GroqProvider {
    client: Client,
    config: GroqConfig,
}

impl GroqProvider {
    /// Create a new provider with custom configuration
    pub fn with_config(config: GroqConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LLMError::ConfigurationError(
                "Groq API key must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GroqConfig::new(api_key))
    }

    /// Get the current configuration
    pub fn config(&self) -> &GroqConfig {
        &self.config
    }

    /// Send one request for one model
    async fn send(&self, model: &str, request: &CompletionRequest) -> Result<CompletionResponse> {
        let wire_request = ChatRequest {
            model: model.to_string(),
            messages: build_chat_messages(request.system.as_deref(), &request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(self.config.chat_url())
            .bearer_auth(&self.config.api_key)
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), model, error_text));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        into_completion_response(chat_response, model)
    }

    fn map_transport_error(&self, err: reqwest::Error) -> LLMError {
        if err.is_timeout() {
            LLMError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else {
            LLMError::HttpError(err)
        }
    }
}

#[async_trait]
impl LLMProvider for GroqProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        validate_temperature(request.temperature)?;
        debug!("Sending request to {}", self.config.api_base);

        match self.send(&request.model, &request).await {
            Err(LLMError::ModelNotFound(missing)) => match &self.config.fallback_model {
                Some(fallback) if *fallback != missing => {
                    warn!("Model {} not found, falling back to {}", missing, fallback);
                    self.send(fallback, &request).await
                }
                _ => Err(LLMError::ModelNotFound(missing)),
            },
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        "groq"
    }
}

fn validate_temperature(temperature: Option<f32>) -> Result<()> {
    match temperature {
        Some(t) if !(0.0..=1.0).contains(&t) => Err(LLMError::InvalidRequest(format!(
            "Temperature must be between 0.0 and 1.0, got {t}"
        ))),
        _ => Ok(()),
    }
}

fn map_status_error(status: u16, model: &str, body: String) -> LLMError {
    match status {
        401 | 403 => LLMError::AuthenticationFailed,
        429 => LLMError::RateLimitExceeded(body),
        404 => LLMError::ModelNotFound(model.to_string()),
        // Groq reports decommissioned models as 400 with this code
        400 if body.contains("model_not_found") || body.contains("model_decommissioned") => {
            LLMError::ModelNotFound(model.to_string())
        }
        400 => LLMError::InvalidRequest(body),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {body}")),
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

// ============================================================================
// Conversion functions
// ============================================================================

/// System prompt goes first in the messages array
fn build_chat_messages(system: Option<&str>, messages: &[Message]) -> Vec<ChatMessage> {
    system
        .map(|sys| ChatMessage {
            role: Role::System.as_str().to_string(),
            content: Some(sys.to_string()),
        })
        .into_iter()
        .chain(messages.iter().map(|msg| ChatMessage {
            role: msg.role.as_str().to_string(),
            content: Some(msg.content.clone()),
        }))
        .collect()
}

fn into_completion_response(response: ChatResponse, requested_model: &str) -> Result<CompletionResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::UnexpectedResponse("No choices in response".to_string()))?;

    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let stop_reason = map_stop_reason(choice.finish_reason.as_deref().unwrap_or("stop"));
    debug!(
        "Received response - stop_reason: {:?}, tokens: {}/{}",
        stop_reason, usage.input_tokens, usage.output_tokens
    );

    Ok(CompletionResponse {
        message: Message::assistant(choice.message.content.unwrap_or_default()),
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        stop_reason,
        usage,
    })
}

/// Map OpenAI-style finish reasons to ours
fn map_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "length" => StopReason::MaxTokens,
        "content_filter" => StopReason::ContentFilter,
        _ => {
            debug!("Unknown stop reason: {}", reason);
            StopReason::EndTurn
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn test_provider_creation() {
        let provider = GroqProvider::new("gsk-test").unwrap();
        assert_eq!(provider.name(), "groq");
        assert_eq!(provider.config().api_key, "gsk-test");
        assert_eq!(provider.config().api_base, "https://api.groq.com/openai/v1");
        assert!(provider.config().fallback_model.is_none());
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = GroqProvider::new("  ");
        assert!(matches!(result, Err(LLMError::ConfigurationError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = GroqConfig::new("gsk-test")
            .with_api_base("http://localhost:8000/v1")
            .with_timeout(15)
            .with_fallback_model("mixtral-8x7b-32768");

        assert_eq!(config.api_base, "http://localhost:8000/v1");
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.fallback_model.as_deref(), Some("mixtral-8x7b-32768"));
    }

    #[test]
    fn test_api_base_trailing_slash() {
        let config = GroqConfig::new("gsk-test").with_api_base("https://proxy.example.com/v1/");
        assert_eq!(config.api_base, "https://proxy.example.com/v1");
        assert_eq!(config.chat_url(), "https://proxy.example.com/v1/chat/completions");

        let default = GroqConfig::new("gsk-test");
        assert_eq!(default.chat_url(), "https://api.groq.com/openai/v1/chat/completions");
    }

    #[test]
    fn test_temperature_validation() {
        assert!(validate_temperature(None).is_ok());
        assert!(validate_temperature(Some(0.7)).is_ok());
        assert!(matches!(
            validate_temperature(Some(1.5)),
            Err(LLMError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_system_message_goes_first() {
        let messages = build_chat_messages(Some("Be terse"), &[Message::user("Hi")]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content.as_deref(), Some("Be terse"));
        assert_eq!(messages[1].role, Role::User.as_str());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(map_status_error(401, "m", String::new()), LLMError::AuthenticationFailed));
        assert!(matches!(map_status_error(429, "m", "slow".into()), LLMError::RateLimitExceeded(_)));
        assert!(matches!(map_status_error(404, "m", String::new()), LLMError::ModelNotFound(m) if m == "m"));
        assert!(matches!(
            map_status_error(400, "old", r#"{"error":{"code":"model_decommissioned"}}"#.into()),
            LLMError::ModelNotFound(_)
        ));
        assert!(matches!(map_status_error(400, "m", "bad json".into()), LLMError::InvalidRequest(_)));
        assert!(matches!(map_status_error(503, "m", "down".into()), LLMError::RequestFailed(_)));
    }

    #[test]
    fn test_response_conversion() {
        let raw = r#"{
            "model": "llama-3.3-70b-versatile",
            "choices": [{"message": {"role": "assistant", "content": "{\"recommendation\":\"hold\"}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let response = into_completion_response(parsed, "requested").unwrap();

        assert_eq!(response.model, "llama-3.3-70b-versatile");
        assert_eq!(response.text(), r#"{"recommendation":"hold"}"#);
        assert_eq!(response.stop_reason, StopReason::EndTurn);
        assert_eq!(response.usage.input_tokens, 120);
        assert_eq!(response.usage.output_tokens, 30);
    }

    #[test]
    fn test_response_without_choices() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let result = into_completion_response(parsed, "requested");
        assert!(matches!(result, Err(LLMError::UnexpectedResponse(_))));
    }

    #[test]
    fn test_stop_reason_mapping() {
        assert_eq!(map_stop_reason("stop"), StopReason::EndTurn);
        assert_eq!(map_stop_reason("length"), StopReason::MaxTokens);
        assert_eq!(map_stop_reason("content_filter"), StopReason::ContentFilter);
        assert_eq!(map_stop_reason("mystery"), StopReason::EndTurn);
    }
}
