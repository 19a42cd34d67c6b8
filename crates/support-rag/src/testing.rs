//! Test doubles shared by the unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::engine::{EngineBindings, EngineFactory, EngineHandle};
use crate::error::{RetrievalError, ToolError};
use crate::knowledge::{EmbeddingModel, KnowledgeBase, ScoredChunk};
use crate::llm::{ChatStreamEvent, GenerationConfig, LLMProvider, ProviderInfo, ToolSchema};
use crate::tools::{CreatedIssue, IssueTracker, NewIssue};
use crate::types::ChatMessage;

/// Returns the same vector for every query.
pub struct FixedEmbeddings {
    vector: Vec<f32>,
}

impl FixedEmbeddings {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl EmbeddingModel for FixedEmbeddings {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.vector.len())
    }
}

pub struct InMemoryKnowledgeBase {
    hits: Vec<ScoredChunk>,
    failure: Option<String>,
    queries: AtomicUsize,
}

impl InMemoryKnowledgeBase {
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self {
            hits,
            failure: None,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Vec::new(),
            failure: Some(message.to_string()),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryKnowledgeBase {
    async fn query(&self, _text: &str, k: usize) -> Result<Vec<ScoredChunk>, RetrievalError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(RetrievalError::Index(message.clone()));
        }
        Ok(self.hits.iter().take(k).cloned().collect())
    }
}

/// Replays a fixed event script and records every message list it was sent.
pub struct ScriptedProvider {
    events: Vec<ChatStreamEvent>,
    delay: Duration,
    refuse: Option<String>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    /// One `ContentDelta` per fragment, then `Done`.
    pub fn text(fragments: &[&str]) -> Self {
        let mut events: Vec<ChatStreamEvent> = fragments
            .iter()
            .map(|f| ChatStreamEvent::ContentDelta(f.to_string()))
            .collect();
        events.push(ChatStreamEvent::Done);
        Self::events(events)
    }

    /// Exactly the given events; no `Done` is appended.
    pub fn events(events: Vec<ChatStreamEvent>) -> Self {
        Self {
            events,
            delay: Duration::ZERO,
            refuse: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `chat_stream` itself fails before any event.
    pub fn refusing(message: &str) -> Self {
        Self {
            refuse: Some(message.to_string()),
            ..Self::events(Vec::new())
        }
    }

    /// Sleep before each event. The sender stays open until the script ends.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSchema],
        _config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        self.requests.lock().push(messages.to_vec());
        if let Some(message) = &self.refuse {
            return Err(anyhow!("{}", message));
        }

        let (tx, rx) = mpsc::channel(16);
        let events = self.events.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            for event in events {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "scripted".to_string(),
            model: "scripted".to_string(),
            supports_functions: true,
        }
    }
}

/// Provider that never sends an event and never closes the stream.
pub struct StalledProvider;

#[async_trait]
impl LLMProvider for StalledProvider {
    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSchema],
        _config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            tx.closed().await;
        });
        Ok(rx)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "stalled".to_string(),
            model: "stalled".to_string(),
            supports_functions: true,
        }
    }
}

pub fn engine_with(
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    llm: Arc<dyn LLMProvider>,
) -> Arc<EngineHandle> {
    Arc::new(EngineHandle::new(
        "test-model".to_string(),
        "test-key".to_string(),
        EngineBindings { knowledge, llm },
    ))
}

/// Counts build attempts and hands out the same bindings every time.
pub struct CountingFactory {
    knowledge: Option<Arc<dyn KnowledgeBase>>,
    llm: Arc<dyn LLMProvider>,
    failing_credential: Option<String>,
    builds: AtomicUsize,
    models: Mutex<Vec<String>>,
}

impl Default for CountingFactory {
    fn default() -> Self {
        Self::with(None, Arc::new(ScriptedProvider::text(&["ok"])))
    }
}

impl CountingFactory {
    pub fn with(knowledge: Option<Arc<dyn KnowledgeBase>>, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            knowledge,
            llm,
            failing_credential: None,
            builds: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    /// Builds fail whenever the credential equals `credential`.
    pub fn failing_for(credential: &str) -> Self {
        Self {
            failing_credential: Some(credential.to_string()),
            ..Self::default()
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn models(&self) -> Vec<String> {
        self.models.lock().clone()
    }
}

#[async_trait]
impl EngineFactory for CountingFactory {
    async fn build(&self, model_name: &str, credential: &str) -> Result<EngineBindings> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.models.lock().push(model_name.to_string());
        if self.failing_credential.as_deref() == Some(credential) {
            return Err(anyhow!("API key not valid"));
        }
        Ok(EngineBindings {
            knowledge: self.knowledge.clone(),
            llm: self.llm.clone(),
        })
    }
}

/// Issue tracker that records requests instead of calling out.
pub struct RecordingTracker {
    failure: Option<(u16, String)>,
    delay: Duration,
    calls: Mutex<Vec<(String, String, NewIssue)>>,
}

impl RecordingTracker {
    /// Issues are numbered from 7 upward.
    pub fn ok() -> Self {
        Self {
            failure: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            failure: Some((status, body.to_string())),
            ..Self::ok()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<(String, String, NewIssue)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    async fn create_issue(
        &self,
        token: &str,
        repo: &str,
        issue: &NewIssue,
    ) -> Result<CreatedIssue, ToolError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let number = {
            let mut calls = self.calls.lock();
            calls.push((token.to_string(), repo.to_string(), issue.clone()));
            6 + calls.len() as u64
        };
        if let Some((status, body)) = &self.failure {
            return Err(ToolError::Remote {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(CreatedIssue {
            html_url: format!("https://github.com/{}/issues/{}", repo, number),
            number,
        })
    }
}
