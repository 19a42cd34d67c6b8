use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::json;
use std::num::NonZeroUsize;
use std::time::Duration;

/// Unified embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding vector dimension, when known up front
    fn dimension(&self) -> Option<usize>;
}

/// Google `embedContent` endpoint, bound to one API key.
pub struct GoogleEmbeddings {
    client: Client,
    api_key: String,
    model: String,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl GoogleEmbeddings {
    pub fn new(api_key: String, model: String, cache_size: usize) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(30))
            .build()?;
        let capacity = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            client,
            api_key,
            model,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:embedContent",
            self.model
        )
    }
}

#[async_trait]
impl EmbeddingModel for GoogleEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.cache.lock().get(text) {
            return Ok(cached.clone());
        }

        let request = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_QUERY",
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            let preview: String = error.chars().take(300).collect();
            return Err(anyhow!("Google embedding API error ({}): {}", status, preview));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse embedding response")?;
        let values: Vec<f32> = body["embedding"]["values"]
            .as_array()
            .ok_or_else(|| anyhow!("Embedding response has no values"))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        if values.is_empty() {
            return Err(anyhow!("Embedding response was empty"));
        }

        self.cache.lock().put(text.to_string(), values.clone());
        Ok(values)
    }

    fn dimension(&self) -> Option<usize> {
        None
    }
}
