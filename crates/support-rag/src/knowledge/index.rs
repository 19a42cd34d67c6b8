use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::{EmbeddingModel, KnowledgeBase, ScoredChunk};
use crate::error::RetrievalError;

/// On-disk layout of a prebuilt index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub dimension: usize,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub content: String,
    pub source: String,
    #[serde(default)]
    pub page: Option<u32>,
    pub vector: Vec<f32>,
}

/// Brute-force cosine similarity over a prebuilt, in-memory index.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dimension: usize,
    embeddings: Arc<dyn EmbeddingModel>,
}

impl VectorIndex {
    pub fn new(file: IndexFile, embeddings: Arc<dyn EmbeddingModel>) -> Result<Self> {
        if let Some(bad) = file.entries.iter().position(|e| e.vector.len() != file.dimension) {
            return Err(anyhow!(
                "index entry {} has dimension {}, expected {}",
                bad,
                file.entries[bad].vector.len(),
                file.dimension
            ));
        }
        if let Some(expected) = embeddings.dimension() {
            if expected != file.dimension {
                return Err(anyhow!(
                    "embedding model produces {} dimensions but index has {}",
                    expected,
                    file.dimension
                ));
            }
        }
        Ok(Self {
            entries: file.entries,
            dimension: file.dimension,
            embeddings,
        })
    }

    /// Load an index file. `Ok(None)` means no index has been built yet.
    pub fn load(path: &Path, embeddings: Arc<dyn EmbeddingModel>) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Vector index not found");
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read index {}", path.display()))?;
        let file: IndexFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse index {}", path.display()))?;
        let index = Self::new(file, embeddings)?;
        tracing::info!(
            path = %path.display(),
            entries = index.len(),
            dimension = index.dimension,
            "Loaded vector index"
        );
        Ok(Some(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rank(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, score)| {
                let entry = &self.entries[i];
                ScoredChunk {
                    content: entry.content.clone(),
                    source_id: entry.source.clone(),
                    page_number: entry.page,
                    relevance_score: score,
                }
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeBase for VectorIndex {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let query = self
            .embeddings
            .embed_query(text)
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
        if query.len() != self.dimension {
            return Err(RetrievalError::Index(format!(
                "query embedding has {} dimensions, index has {}",
                query.len(),
                self.dimension
            )));
        }
        Ok(self.rank(&query, k))
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
