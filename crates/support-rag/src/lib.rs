pub mod config;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod orchestrator;
pub mod rag;
pub mod tools;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-export primary types for convenience
pub use config::{ConfigResolver, EffectiveConfig, EnvDefaults, SupportConfig, UiConfig};
pub use engine::{DefaultEngineFactory, EngineCache, EngineFactory, EngineHandle};
pub use error::{ConfigError, GenerationError, RetrievalError, ToolError};
pub use orchestrator::{GenerationOrchestrator, TurnOutcome};
pub use rag::{PromptAssembler, Retriever};
pub use tools::{ToolCallResult, ToolExecutor};
pub use types::{ChatMessage, ChatRole, RetrievedChunk};

// Re-export LLM types
pub use llm::{ApiProvider, ChatStreamEvent, LLMProvider, TokenStream, ToolSchema};

pub use anyhow::{Error, Result};
