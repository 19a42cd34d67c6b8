//! Generation engine instances and their single-slot cache.

pub mod cache;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SupportConfig;
use crate::knowledge::{EmbeddingModel, GoogleEmbeddings, KnowledgeBase, VectorIndex};
use crate::llm::{ExternalProvider, LLMProvider};

pub use cache::EngineCache;

/// Everything a turn needs from one (model, credential) pair.
pub struct EngineBindings {
    /// `None` when no index has been built.
    pub knowledge: Option<Arc<dyn KnowledgeBase>>,
    pub llm: Arc<dyn LLMProvider>,
}

/// A constructed engine. Immutable once built; the cache swaps whole handles.
pub struct EngineHandle {
    model_name: String,
    credential: String,
    bindings: EngineBindings,
}

impl EngineHandle {
    pub fn new(model_name: String, credential: String, bindings: EngineBindings) -> Self {
        Self {
            model_name,
            credential,
            bindings,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn knowledge(&self) -> Option<&Arc<dyn KnowledgeBase>> {
        self.bindings.knowledge.as_ref()
    }

    pub fn llm(&self) -> &Arc<dyn LLMProvider> {
        &self.bindings.llm
    }

    pub(crate) fn matches(&self, model_name: &str, credential: &str) -> bool {
        self.model_name == model_name && self.credential == credential
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("model_name", &self.model_name)
            .field("has_knowledge_base", &self.bindings.knowledge.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds engine bindings for a (model, credential) pair.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn build(&self, model_name: &str, credential: &str) -> Result<EngineBindings>;
}

/// Binds Google embeddings, the on-disk vector index, and the configured
/// chat provider.
pub struct DefaultEngineFactory {
    config: SupportConfig,
}

impl DefaultEngineFactory {
    pub fn new(config: SupportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineFactory for DefaultEngineFactory {
    async fn build(&self, model_name: &str, credential: &str) -> Result<EngineBindings> {
        let embeddings: Arc<dyn EmbeddingModel> = Arc::new(
            GoogleEmbeddings::new(
                credential.to_string(),
                self.config.retrieval.embedding_model.clone(),
                self.config.retrieval.embedding_cache_size,
            )
            .context("Failed to create embedding client")?,
        );

        let index_path = self.config.resolved_index_path();
        let knowledge = VectorIndex::load(&index_path, embeddings)
            .context("Failed to load vector index")?
            .map(|index| Arc::new(index) as Arc<dyn KnowledgeBase>);

        let llm = ExternalProvider::new(
            self.config.llm.provider.clone(),
            credential.to_string(),
            model_name.to_string(),
            Duration::from_secs(self.config.llm.request_timeout_secs),
        )
        .context("Failed to create LLM provider")?;

        Ok(EngineBindings {
            knowledge,
            llm: Arc::new(llm),
        })
    }
}
