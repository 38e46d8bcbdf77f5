//! Completion request and response types

use crate::Message;
use serde::{Deserialize, Serialize};

/// Default completion token cap
const DEFAULT_MAX_TOKENS: usize = 1024;

/// One chat completion: an optional system prompt followed by the
/// conversation so far
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier (provider-specific)
    pub model: String,

    /// Conversation messages, oldest first
    pub messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub max_tokens: usize,

    /// Sampling temperature (0.0-1.0); provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Single-turn request carrying one user prompt
    pub fn prompt(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![Message::user(prompt)],
            system: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Text of the most recent message
    pub fn last_text(&self) -> Option<&str> {
        self.messages.last().map(Message::text)
    }
}

/// Reply to a [`CompletionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub message: Message,

    /// Model that actually served the request, which differs from the
    /// requested one after a fallback
    pub model: String,

    pub stop_reason: StopReason,

    pub usage: TokenUsage,
}

impl CompletionResponse {
    /// Generated text
    pub fn text(&self) -> &str {
        self.message.text()
    }

    /// Whether the reply was cut off by the token cap
    pub fn truncated(&self) -> bool {
        self.stop_reason == StopReason::MaxTokens
    }
}

/// Why generation stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    /// Output withheld by the provider's content filter
    ContentFilter,
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}
