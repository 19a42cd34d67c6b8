//! Per-turn pipeline: resolve config, acquire engine, retrieve, stream, run tools.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::Instrument;

use crate::config::{ConfigResolver, EffectiveConfig, SupportConfig, UiConfig};
use crate::engine::EngineCache;
use crate::error::{GenerationError, RetrievalError, ToolError};
use crate::llm::{ChatStreamEvent, GenerationConfig, TokenStream};
use crate::rag::{format_context, PromptAssembler, Retriever, NO_KNOWLEDGE_BASE_CONTEXT};
use crate::tools::{support_ticket_schema, ToolCallResult, ToolExecutor, CREATE_SUPPORT_TICKET};
use crate::types::{ChatMessage, ToolCallRequest};

pub const UNCONFIGURED_NOTICE: &str =
    "⚠️ Please enter your Google API Key in the settings to start.";

const SYSTEM_PREFIX: &str = "\n\n[System]: ";
const OUTPUT_BUFFER: usize = 64;

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Unconfigured,
    EngineUnavailable,
    RetrievalFailed,
    GenerationFailed,
    Completed,
    /// The consumer dropped the output stream.
    Cancelled,
}

/// Runs one support turn per `respond` call.
///
/// Cheap to clone; every clone shares the same engine cache and tool executor.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    resolver: ConfigResolver,
    cache: Arc<EngineCache>,
    retriever: Retriever,
    prompts: PromptAssembler,
    executor: Arc<ToolExecutor>,
    generation: GenerationConfig,
    idle_timeout: Duration,
}

impl GenerationOrchestrator {
    pub fn new(
        config: &SupportConfig,
        resolver: ConfigResolver,
        cache: Arc<EngineCache>,
        executor: Arc<ToolExecutor>,
    ) -> Self {
        Self {
            resolver,
            cache,
            retriever: Retriever::new(config.retrieval.top_k),
            prompts: PromptAssembler::for_company(&config.company),
            executor,
            generation: GenerationConfig::from(&config.llm),
            idle_timeout: Duration::from_secs(config.llm.stream_idle_timeout_secs),
        }
    }

    /// Longest gap tolerated between two stream events.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn cache(&self) -> &Arc<EngineCache> {
        &self.cache
    }

    /// Start a turn and return its fragments.
    ///
    /// `history` is the prior conversation, oldest first, without the current
    /// query. Dropping the returned stream cancels the turn.
    pub fn respond(&self, query: &str, history: Vec<ChatMessage>, ui: &UiConfig) -> TokenStream {
        let effective = self.resolver.resolve(ui);
        self.generate(query, history, effective)
    }

    /// Same as `respond` with configuration already resolved.
    pub fn generate(
        &self,
        query: &str,
        history: Vec<ChatMessage>,
        config: EffectiveConfig,
    ) -> TokenStream {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let this = self.clone();
        let query = query.to_string();
        let span = tracing::info_span!("turn", model = %config.model_name);

        tokio::spawn(
            async move {
                let outcome = this.run_turn(&query, &history, &config, &tx).await;
                tracing::info!(outcome = ?outcome, "Turn finished");
            }
            .instrument(span),
        );

        TokenStream::new(rx)
    }

    /// Drive one turn to completion, writing fragments into `tx`.
    pub async fn run_turn(
        &self,
        query: &str,
        history: &[ChatMessage],
        config: &EffectiveConfig,
        tx: &mpsc::Sender<String>,
    ) -> TurnOutcome {
        let Some(credential) = config.credential.as_deref() else {
            tracing::warn!("No model credential configured");
            emit(tx, UNCONFIGURED_NOTICE).await;
            return TurnOutcome::Unconfigured;
        };

        let engine = match self.cache.acquire(&config.model_name, Some(credential)).await {
            Ok(engine) => engine,
            Err(e) => {
                emit(tx, format!("❌ System Error: Failed to initialize AI Engine. {}", e)).await;
                return TurnOutcome::EngineUnavailable;
            }
        };

        let context = match self.retriever.retrieve(&engine, query).await {
            Ok(chunks) => format_context(&chunks),
            Err(RetrievalError::NoKnowledgeBase) => {
                tracing::warn!("No knowledge base loaded, answering without document context");
                NO_KNOWLEDGE_BASE_CONTEXT.to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "Retrieval failed");
                emit(tx, format!("Retrieval Error: {}", e)).await;
                return TurnOutcome::RetrievalFailed;
            }
        };

        let messages = self.prompts.build(&context, history, query);
        tracing::debug!(
            messages = messages.len(),
            history = history.len(),
            "Assembled prompt"
        );

        let tools = [support_ticket_schema()];
        let mut events = match engine.llm().chat_stream(&messages, &tools, &self.generation).await {
            Ok(events) => events,
            Err(e) => {
                let e = GenerationError::Transport(format!("{:#}", e));
                tracing::error!(error = %e, "Failed to open LLM stream");
                emit(tx, format!("LLM Error: {}", e)).await;
                return TurnOutcome::GenerationFailed;
            }
        };

        let mut pending = PendingToolCalls::default();
        let mut streamed_text = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => {
                    tracing::info!("Output stream dropped, abandoning generation");
                    return TurnOutcome::Cancelled;
                }
                next = tokio::time::timeout(self.idle_timeout, events.recv()) => next,
            };
            let failure = match next {
                Ok(Some(ChatStreamEvent::ContentDelta(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    streamed_text = true;
                    if !emit(tx, text).await {
                        tracing::info!("Output stream dropped, abandoning generation");
                        return TurnOutcome::Cancelled;
                    }
                    continue;
                }
                Ok(Some(ChatStreamEvent::ToolCallDelta {
                    call_id,
                    name,
                    arguments,
                })) => {
                    pending.push(call_id, name, &arguments);
                    continue;
                }
                Ok(Some(ChatStreamEvent::Done)) => break,
                Ok(Some(ChatStreamEvent::Failed(reason))) => GenerationError::Transport(reason),
                Ok(None) => GenerationError::StreamClosed,
                Err(_) => GenerationError::Timeout(self.idle_timeout),
            };

            tracing::error!(error = %failure, streamed_text, "Generation failed");
            let prefix = if streamed_text { "\n\n" } else { "" };
            emit(tx, format!("{}LLM Error: {}", prefix, failure)).await;
            return TurnOutcome::GenerationFailed;
        }
        drop(events);

        if tx.is_closed() {
            tracing::info!(
                pending_calls = pending.len(),
                "Output stream dropped before tool execution"
            );
            return TurnOutcome::Cancelled;
        }

        for call in pending.finish() {
            if tx.is_closed() {
                return TurnOutcome::Cancelled;
            }
            let result = match call {
                Ok(request) => {
                    self.executor
                        .execute(
                            &request,
                            config.ticket_token.as_deref(),
                            config.ticket_repo_id.as_deref(),
                        )
                        .await
                }
                Err(e) => rejected_call(e),
            };
            let Some(result) = result else { continue };
            if !emit(tx, format!("{}{}", SYSTEM_PREFIX, result)).await {
                return TurnOutcome::Cancelled;
            }
        }

        TurnOutcome::Completed
    }
}

/// Returns false once the consumer has gone away.
async fn emit(tx: &mpsc::Sender<String>, fragment: impl Into<String>) -> bool {
    tx.send(fragment.into()).await.is_ok()
}

fn rejected_call(error: ToolError) -> Option<ToolCallResult> {
    match &error {
        ToolError::InvalidArguments { tool, .. } if tool == CREATE_SUPPORT_TICKET => {
            tracing::warn!(error = %error, "Ticket call carried unusable arguments");
            Some(ToolCallResult::failure(format!("Failed to create GitHub issue: {}", error)))
        }
        _ => {
            tracing::debug!(error = %error, "Dropping malformed call to unrecognized tool");
            None
        }
    }
}

#[derive(Debug)]
struct PendingCall {
    call_id: String,
    name: Option<String>,
    arguments: String,
}

/// Tool-call fragments grouped by call id, in first-seen order.
#[derive(Debug, Default)]
struct PendingToolCalls {
    calls: Vec<PendingCall>,
    by_id: HashMap<String, usize>,
}

impl PendingToolCalls {
    fn push(&mut self, call_id: String, name: Option<String>, arguments: &str) {
        let slot = match self.by_id.get(&call_id) {
            Some(&slot) => slot,
            None => {
                self.by_id.insert(call_id.clone(), self.calls.len());
                self.calls.push(PendingCall {
                    call_id,
                    name: None,
                    arguments: String::new(),
                });
                self.calls.len() - 1
            }
        };
        let call = &mut self.calls[slot];
        if call.name.is_none() {
            call.name = name.filter(|n| !n.is_empty());
        }
        call.arguments.push_str(arguments);
    }

    fn len(&self) -> usize {
        self.calls.len()
    }

    /// Parse each merged argument buffer once. Calls that never got a name
    /// are dropped.
    fn finish(self) -> Vec<Result<ToolCallRequest, ToolError>> {
        self.calls
            .into_iter()
            .filter_map(|call| {
                let Some(tool_name) = call.name else {
                    tracing::warn!(call_id = %call.call_id, "Tool call without a name, skipping");
                    return None;
                };
                Some(parse_arguments(&tool_name, &call.arguments).map(|arguments| {
                    ToolCallRequest {
                        call_id: call.call_id,
                        tool_name,
                        arguments,
                    }
                }))
            })
            .collect()
    }
}

fn parse_arguments(
    tool_name: &str,
    raw: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool: tool_name.to_string(),
        reason,
    };
    if raw.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(invalid(format!("expected a JSON object, got {}", other))),
        Err(e) => Err(invalid(e.to_string())),
    }
}
