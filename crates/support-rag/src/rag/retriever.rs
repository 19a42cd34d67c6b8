use crate::engine::EngineHandle;
use crate::error::RetrievalError;
use crate::types::{PageLabel, RetrievedChunk};

/// Context used when the engine has no knowledge base at all.
pub const NO_KNOWLEDGE_BASE_CONTEXT: &str =
    "No knowledge base is loaded; no document context is available.";

/// Context used when the knowledge base returned nothing for the query.
pub const NO_MATCHES_CONTEXT: &str = "No relevant documents were found for this question.";

/// Top-k similarity lookup against the engine's knowledge base.
#[derive(Debug, Clone)]
pub struct Retriever {
    top_k: usize,
}

impl Retriever {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunks in the order the index ranked them; nothing is re-ranked here.
    pub async fn retrieve(
        &self,
        engine: &EngineHandle,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let knowledge = engine.knowledge().ok_or(RetrievalError::NoKnowledgeBase)?;
        let mut hits = knowledge.query(query, self.top_k).await?;
        hits.truncate(self.top_k);

        tracing::debug!(
            chunks = hits.len(),
            top_score = hits.first().map(|h| h.relevance_score).unwrap_or(0.0),
            "Retrieved context"
        );

        Ok(hits
            .into_iter()
            .map(|h| RetrievedChunk {
                content: h.content,
                source_id: h.source_id,
                page_number: h.page_number,
            })
            .collect())
    }
}

/// Render chunks with provenance, one chunk per block.
///
/// Newlines inside a chunk become spaces so each chunk's content sits on a
/// single line.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return NO_MATCHES_CONTEXT.to_string();
    }
    chunks
        .iter()
        .map(|c| {
            let content = c.content.replace("\r\n", " ").replace(['\n', '\r'], " ");
            format!(
                "Content: {}\nSource: {} (Page {})",
                content,
                c.source_id,
                PageLabel(c.page_number)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
