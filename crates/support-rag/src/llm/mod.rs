//! LLM Module - streaming chat completion against hosted model APIs

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

pub mod external;
pub mod streaming;

pub use external::ExternalProvider;
pub use streaming::TokenStream;

pub use crate::types::{ChatMessage, ChatRole};

/// External API providers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiProvider {
    /// Google Gemini (`generativelanguage.googleapis.com`)
    Google,
    OpenAI,
    /// Any OpenAI-compatible chat completions endpoint
    Custom { endpoint: String },
}

/// Core trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Streaming chat completion with tool support.
    ///
    /// The returned channel ends with exactly one `Done` or `Failed` event.
    /// Dropping the receiver abandons the request.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>>;

    /// Get provider info
    fn info(&self) -> ProviderInfo;
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl From<&crate::config::LlmSettings> for GenerationConfig {
    fn from(settings: &crate::config::LlmSettings) -> Self {
        Self {
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

/// Schema describing a tool the LLM can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name (must match what the LLM will emit)
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema for the tool's parameters
    pub parameters: JsonValue,
}

/// A streaming event from the chat completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    /// A fragment of text content
    ContentDelta(String),
    /// A piece of a tool call. Fragments sharing a `call_id` belong to one
    /// call; `arguments` fragments concatenate in arrival order.
    ToolCallDelta {
        call_id: String,
        name: Option<String>,
        arguments: String,
    },
    /// Stream finished normally
    Done,
    /// Transport or decoding failure; no further events follow
    Failed(String),
}

/// Provider information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub model: String,
    pub supports_functions: bool,
}
