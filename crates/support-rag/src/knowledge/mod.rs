//! Read-only client boundary to the prebuilt knowledge base.
//!
//! Building the index (loading documents, chunking, embedding) happens
//! offline; this module only loads and queries it.

pub mod embeddings;
pub mod index;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

pub use embeddings::{EmbeddingModel, GoogleEmbeddings};
pub use index::VectorIndex;

/// A knowledge base hit with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub source_id: String,
    pub page_number: Option<u32>,
    pub relevance_score: f32,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Up to `k` chunks, most relevant first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrievalError>;
}
