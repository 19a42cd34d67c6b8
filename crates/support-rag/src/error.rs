//! Error taxonomy for a support turn.
//!
//! Every variant is caught where it occurs and rendered into a single chat
//! fragment by the orchestrator. None of them escape `respond`.

use std::time::Duration;

use thiserror::Error;

/// Credential missing or the engine could not be built from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no model credential configured")]
    MissingCredential,
    #[error("failed to initialize engine: {0}")]
    EngineInit(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Knowledge base query failed, or there is no knowledge base at all.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("knowledge base not loaded")]
    NoKnowledgeBase,
    #[error("failed to embed query: {0}")]
    Embedding(String),
    #[error("index query failed: {0}")]
    Index(String),
}

/// LLM transport or stream failure.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Transport(String),
    #[error("no stream event received within {0:?}")]
    Timeout(Duration),
    #[error("malformed stream chunk: {0}")]
    MalformedChunk(String),
    #[error("stream closed before completion")]
    StreamClosed,
}

/// Issue tracker failure. Always downgraded to a `ToolCallResult`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("issue tracker returned HTTP {status}: {body}")]
    Remote { status: u16, body: String },
    #[error("{0}")]
    Transport(String),
    #[error("issue tracker request timed out after {0:?}")]
    Timeout(Duration),
}
