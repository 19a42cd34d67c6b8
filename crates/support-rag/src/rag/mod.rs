//! Retrieval and prompt assembly for a support turn

pub mod prompt;
pub mod retriever;

pub use prompt::{build_messages, persona_prompt, PromptAssembler};
pub use retriever::{format_context, Retriever, NO_KNOWLEDGE_BASE_CONTEXT, NO_MATCHES_CONTEXT};
