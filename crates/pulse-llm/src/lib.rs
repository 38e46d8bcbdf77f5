//! LLM provider abstraction layer for stock-pulse
//!
//! This crate provides provider-agnostic abstractions for single-shot
//! chat completions. It includes:
//!
//! - Message types for LLM communication
//! - Completion request/response types
//! - Provider trait for LLM implementations
//! - A Groq provider speaking the OpenAI-compatible chat API (behind the
//!   `groq` feature, enabled by default)

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;

// Provider implementations (feature-gated)
#[cfg(feature = "groq")]
pub mod providers;
