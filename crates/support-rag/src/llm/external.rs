//! External API provider with SSE streaming and tool calling
//! Supports Google Gemini and OpenAI-compatible chat completion APIs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::GenerationError;

use super::{
    ApiProvider, ChatMessage, ChatRole, ChatStreamEvent, GenerationConfig, LLMProvider,
    ProviderInfo, ToolSchema,
};

const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Hosted LLM reached over HTTP
pub struct ExternalProvider {
    provider: ApiProvider,
    api_key: String,
    model: String,
    client: Client,
}

impl ExternalProvider {
    pub fn new(
        provider: ApiProvider,
        api_key: String,
        model: String,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(request_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()?;

        tracing::info!(
            provider = ?provider,
            model = %model,
            timeout_secs = request_timeout.as_secs(),
            "Creating ExternalProvider"
        );

        Ok(Self {
            provider,
            api_key,
            model,
            client,
        })
    }

    fn get_endpoint(&self) -> String {
        match &self.provider {
            ApiProvider::Google => format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                GOOGLE_API_BASE, self.model
            ),
            ApiProvider::OpenAI => "https://api.openai.com/v1/chat/completions".to_string(),
            ApiProvider::Custom { endpoint } => endpoint.clone(),
        }
    }

    /// Send a streaming request and check the response looks like an event stream.
    async fn open_stream(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let endpoint = self.get_endpoint();
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                anyhow!(
                    "Chat stream to {} timed out, check network connectivity",
                    endpoint
                )
            } else if e.is_connect() {
                anyhow!("Failed to connect to {} for chat stream: {}", endpoint, e)
            } else {
                anyhow!("Chat stream request to {} failed: {}", endpoint, e)
            }
        })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !status.is_success() || content_type.contains("text/html") {
            let error = response.text().await.unwrap_or_default();
            let preview: String = error.chars().take(300).collect();
            return Err(anyhow!(
                "Chat streaming error (HTTP {}, content-type: {}): {}",
                status,
                content_type,
                preview
            ));
        }
        Ok(response)
    }

    // ==================== Google Gemini ====================

    fn google_request(
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Value {
        let mut contents = Vec::new();
        let mut system_parts = Vec::new();

        for m in messages {
            match m.role {
                ChatRole::System => system_parts.push(json!({ "text": m.content })),
                ChatRole::User => contents.push(json!({
                    "role": "user",
                    "parts": [{ "text": m.content }]
                })),
                ChatRole::Assistant => contents.push(json!({
                    "role": "model",
                    "parts": [{ "text": m.content }]
                })),
            }
        }

        let mut request = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": config.temperature,
                "maxOutputTokens": config.max_tokens,
            }
        });

        if !system_parts.is_empty() {
            request["systemInstruction"] = json!({ "parts": system_parts });
        }

        if !tools.is_empty() {
            let functions: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            request["tools"] = json!([{ "functionDeclarations": functions }]);
        }

        request
    }

    async fn google_chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        let request = Self::google_request(messages, tools, config);
        let response = self
            .open_stream(
                self.client
                    .post(self.get_endpoint())
                    .header("x-goog-api-key", &self.api_key)
                    .json(&request),
            )
            .await?;

        Ok(spawn_sse_reader(response, StreamDialect::Google))
    }

    // ==================== OpenAI-compatible ====================

    fn openai_request(
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Value {
        let formatted: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut request = json!({
            "model": model,
            "messages": formatted,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "stream": true
        });

        if !tools.is_empty() {
            request["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                }))
                .collect::<Vec<_>>());
            request["tool_choice"] = json!("auto");
        }

        request
    }

    async fn openai_chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        let request = Self::openai_request(&self.model, messages, tools, config);
        let response = self
            .open_stream(
                self.client
                    .post(self.get_endpoint())
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&request),
            )
            .await?;

        Ok(spawn_sse_reader(response, StreamDialect::OpenAI))
    }
}

#[async_trait]
impl LLMProvider for ExternalProvider {
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
        config: &GenerationConfig,
    ) -> Result<mpsc::Receiver<ChatStreamEvent>> {
        match &self.provider {
            ApiProvider::Google => self.google_chat_stream(messages, tools, config).await,
            ApiProvider::OpenAI | ApiProvider::Custom { .. } => {
                self.openai_chat_stream(messages, tools, config).await
            }
        }
    }

    fn info(&self) -> ProviderInfo {
        let name = match &self.provider {
            ApiProvider::Google => "Google",
            ApiProvider::OpenAI => "OpenAI",
            ApiProvider::Custom { .. } => "Custom",
        };
        ProviderInfo {
            name: name.to_string(),
            model: self.model.clone(),
            supports_functions: true,
        }
    }
}

// ==================== SSE decoding ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamDialect {
    Google,
    OpenAI,
}

/// What a single `data:` payload means for the stream.
enum Decoded {
    Events(Vec<ChatStreamEvent>),
    Finished,
}

/// Splits raw bytes into complete lines, keeping partial UTF-8 sequences
/// buffered until the rest of the line arrives.
#[derive(Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line).trim().to_string());
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        Some(line)
    }
}

fn spawn_sse_reader(
    response: reqwest::Response,
    dialect: StreamDialect,
) -> mpsc::Receiver<ChatStreamEvent> {
    let (tx, rx) = mpsc::channel::<ChatStreamEvent>(256);
    let mut byte_stream = response.bytes_stream();

    tokio::spawn(async move {
        let mut lines = LineBuffer::default();
        let mut decoder = SseDecoder::new(dialect);

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    let failure = GenerationError::Transport(format!("stream interrupted: {}", e));
                    let _ = tx.send(ChatStreamEvent::Failed(failure.to_string())).await;
                    return;
                }
            };

            for line in lines.push(&chunk) {
                if !forward_line(&tx, &mut decoder, &line).await {
                    return;
                }
            }
        }

        if let Some(line) = lines.finish() {
            if !forward_line(&tx, &mut decoder, &line).await {
                return;
            }
        }

        // Google has no terminator line; a finishReason marks the last chunk.
        let last = if decoder.completed() {
            ChatStreamEvent::Done
        } else {
            tracing::warn!(dialect = ?dialect, "Chat stream ended without a completion marker");
            ChatStreamEvent::Failed(GenerationError::StreamClosed.to_string())
        };
        let _ = tx.send(last).await;
    });

    rx
}

/// Decode one line and forward its events. Returns false once the stream is over
/// or the receiver is gone.
async fn forward_line(
    tx: &mpsc::Sender<ChatStreamEvent>,
    decoder: &mut SseDecoder,
    line: &str,
) -> bool {
    let Some(data) = line.strip_prefix("data:") else {
        return true;
    };
    match decoder.decode(data.trim()) {
        Ok(Decoded::Events(events)) => {
            for event in events {
                if tx.send(event).await.is_err() {
                    return false;
                }
            }
            true
        }
        Ok(Decoded::Finished) => {
            let _ = tx.send(ChatStreamEvent::Done).await;
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed chunk in chat stream");
            let _ = tx.send(ChatStreamEvent::Failed(e.to_string())).await;
            false
        }
    }
}

struct SseDecoder {
    dialect: StreamDialect,
    /// OpenAI tool call index -> call id, so later deltas without an id
    /// still land on the right call.
    openai_ids: std::collections::HashMap<u64, String>,
    /// `[DONE]` (OpenAI) or a candidate `finishReason` (Google) was seen.
    completed: bool,
}

impl SseDecoder {
    fn new(dialect: StreamDialect) -> Self {
        Self {
            dialect,
            openai_ids: std::collections::HashMap::new(),
            completed: false,
        }
    }

    fn completed(&self) -> bool {
        self.completed
    }

    fn decode(&mut self, data: &str) -> Result<Decoded> {
        if data.is_empty() {
            return Ok(Decoded::Events(Vec::new()));
        }
        if data == "[DONE]" {
            self.completed = true;
            return Ok(Decoded::Finished);
        }
        let parsed: Value = serde_json::from_str(data).map_err(|e| {
            let preview: String = data.chars().take(200).collect();
            GenerationError::MalformedChunk(format!("{} ({})", preview, e))
        })?;
        if let Some(error) = parsed.get("error") {
            return Err(anyhow!("provider reported error: {}", error));
        }
        let events = match self.dialect {
            StreamDialect::Google => {
                if parsed["candidates"][0]["finishReason"].is_string() {
                    self.completed = true;
                }
                decode_google_chunk(&parsed)
            }
            StreamDialect::OpenAI => self.decode_openai_chunk(&parsed),
        };
        Ok(Decoded::Events(events))
    }

    fn decode_openai_chunk(&mut self, parsed: &Value) -> Vec<ChatStreamEvent> {
        let mut events = Vec::new();
        let delta = &parsed["choices"][0]["delta"];

        if let Some(content) = delta["content"].as_str() {
            if !content.is_empty() {
                events.push(ChatStreamEvent::ContentDelta(content.to_string()));
            }
        }

        if let Some(tcs) = delta["tool_calls"].as_array() {
            for tc_delta in tcs {
                let idx = tc_delta["index"].as_u64().unwrap_or(0);
                let call_id = match tc_delta["id"].as_str().filter(|id| !id.is_empty()) {
                    Some(id) => self
                        .openai_ids
                        .entry(idx)
                        .or_insert_with(|| id.to_string())
                        .clone(),
                    None => self
                        .openai_ids
                        .entry(idx)
                        .or_insert_with(|| format!("call_{}", idx))
                        .clone(),
                };
                let name = tc_delta["function"]["name"]
                    .as_str()
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                let arguments = tc_delta["function"]["arguments"]
                    .as_str()
                    .unwrap_or("")
                    .to_string();
                events.push(ChatStreamEvent::ToolCallDelta {
                    call_id,
                    name,
                    arguments,
                });
            }
        }

        events
    }
}

fn decode_google_chunk(parsed: &Value) -> Vec<ChatStreamEvent> {
    let mut events = Vec::new();
    let Some(parts) = parsed["candidates"][0]["content"]["parts"].as_array() else {
        return events;
    };

    for part in parts {
        if let Some(text) = part["text"].as_str() {
            if !text.is_empty() {
                events.push(ChatStreamEvent::ContentDelta(text.to_string()));
            }
        }
        if let Some(fc) = part.get("functionCall") {
            if let Some(name) = fc["name"].as_str() {
                let call_id = fc["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        format!(
                            "call_{}",
                            uuid::Uuid::new_v4()
                                .to_string()
                                .split('-')
                                .next()
                                .unwrap_or("0")
                        )
                    });
                let arguments =
                    serde_json::to_string(&fc["args"]).unwrap_or_else(|_| "{}".to_string());
                events.push(ChatStreamEvent::ToolCallDelta {
                    call_id,
                    name: Some(name.to_string()),
                    arguments,
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn config() -> GenerationConfig {
        GenerationConfig {
            max_tokens: 512,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_google_request_merges_system_messages_in_order() {
        let messages = vec![
            ChatMessage::system("persona"),
            ChatMessage::system("Context available:\nfoo"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
            ChatMessage::user("question"),
        ];
        let request = ExternalProvider::google_request(&messages, &[], &config());

        let system = request["systemInstruction"]["parts"].as_array().unwrap();
        assert_eq!(system.len(), 2);
        assert_eq!(system[0]["text"], "persona");
        assert_eq!(system[1]["text"], "Context available:\nfoo");

        let contents = request["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "question");
        assert!(request.get("tools").is_none());
    }

    #[test]
    fn test_google_request_declares_tools() {
        let tools = vec![ToolSchema {
            name: "create_support_ticket".to_string(),
            description: "d".to_string(),
            parameters: json!({ "type": "object" }),
        }];
        let request =
            ExternalProvider::google_request(&[ChatMessage::user("x")], &tools, &config());
        assert_eq!(
            request["tools"][0]["functionDeclarations"][0]["name"],
            "create_support_ticket"
        );
    }

    #[test]
    fn test_decode_google_text_and_function_call() {
        let chunk = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Sure, " },
                        { "functionCall": { "name": "create_support_ticket", "args": { "user_name": "Ann" } } }
                    ]
                }
            }]
        });
        let events = decode_google_chunk(&chunk);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatStreamEvent::ContentDelta("Sure, ".to_string()));
        match &events[1] {
            ChatStreamEvent::ToolCallDelta { call_id, name, arguments } => {
                assert!(call_id.starts_with("call_"));
                assert_eq!(name.as_deref(), Some("create_support_ticket"));
                assert_eq!(arguments, r#"{"user_name":"Ann"}"#);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_openai_deltas_keep_call_id_across_chunks() {
        let mut decoder = SseDecoder::new(StreamDialect::OpenAI);
        let first = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"create_support_ticket","arguments":"{\"user_"}}]}}]}"#;
        let second = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"name\":\"Ann\"}"}}]}}]}"#;

        let Decoded::Events(a) = decoder.decode(first).unwrap() else { panic!() };
        let Decoded::Events(b) = decoder.decode(second).unwrap() else { panic!() };

        assert_eq!(
            a[0],
            ChatStreamEvent::ToolCallDelta {
                call_id: "call_abc".to_string(),
                name: Some("create_support_ticket".to_string()),
                arguments: "{\"user_".to_string(),
            }
        );
        assert_eq!(
            b[0],
            ChatStreamEvent::ToolCallDelta {
                call_id: "call_abc".to_string(),
                name: None,
                arguments: "name\":\"Ann\"}".to_string(),
            }
        );
    }

    #[test]
    fn test_decoder_done_and_malformed() {
        let mut decoder = SseDecoder::new(StreamDialect::OpenAI);
        assert!(matches!(decoder.decode("[DONE]").unwrap(), Decoded::Finished));
        assert!(decoder.decode("{not json").is_err());
        assert!(decoder.decode(r#"{"error":{"message":"quota"}}"#).is_err());
    }

    #[test]
    fn test_line_buffer_holds_partial_lines() {
        let mut buffer = LineBuffer::default();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b":1}\n\ndata: x");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new()]);
        assert_eq!(buffer.finish().as_deref(), Some("data: x"));
    }

    #[test]
    fn test_line_buffer_split_utf8() {
        let mut buffer = LineBuffer::default();
        let bytes = "data: café\n".as_bytes();
        let split = bytes.len() - 2;
        assert!(buffer.push(&bytes[..split]).is_empty());
        assert_eq!(buffer.push(&bytes[split..]), vec!["data: café".to_string()]);
    }

    #[test]
    fn test_google_finish_reason_marks_completion() {
        let mut decoder = SseDecoder::new(StreamDialect::Google);
        decoder
            .decode(r#"{"candidates":[{"content":{"parts":[{"text":"Hi"}]}}]}"#)
            .unwrap();
        assert!(!decoder.completed());
        decoder
            .decode(r#"{"candidates":[{"content":{"parts":[{"text":"."}]},"finishReason":"STOP"}]}"#)
            .unwrap();
        assert!(decoder.completed());
    }

    // ---- transport, against a one-shot local HTTP server ----

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                return;
            }
        }
    }

    /// Serve one response with a close-delimited body and return its URL.
    async fn serve_once(status: &'static str, content_type: &'static str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n",
                status, content_type
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn custom_provider(endpoint: String) -> ExternalProvider {
        ExternalProvider::new(
            ApiProvider::Custom { endpoint },
            "test-key".to_string(),
            "test-model".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn drain(mut rx: mpsc::Receiver<ChatStreamEvent>) -> Vec<ChatStreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    async fn stream_events(body: &str) -> Vec<ChatStreamEvent> {
        let url = serve_once("200 OK", "text/event-stream", body).await;
        let rx = custom_provider(url)
            .chat_stream(&[ChatMessage::user("hi")], &[], &config())
            .await
            .unwrap();
        drain(rx).await
    }

    #[tokio::test]
    async fn test_openai_stream_ends_with_done_marker() {
        let events = stream_events(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
             data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n\
             data: [DONE]\n\n",
        )
        .await;

        assert_eq!(
            events,
            vec![
                ChatStreamEvent::ContentDelta("Hello".to_string()),
                ChatStreamEvent::ContentDelta(" there".to_string()),
                ChatStreamEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_openai_stream_fails() {
        let events = stream_events(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Half an ans\"}}]}\n\n",
        )
        .await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ChatStreamEvent::ContentDelta("Half an ans".to_string()));
        assert_eq!(
            events[1],
            ChatStreamEvent::Failed("stream closed before completion".to_string())
        );
    }

    #[tokio::test]
    async fn test_truncated_tool_call_is_not_completed() {
        let events = stream_events(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\
             \"function\":{\"name\":\"create_support_ticket\",\"arguments\":\"{\\\"user_\"}}]}}]}\n\n",
        )
        .await;

        assert!(matches!(events.first(), Some(ChatStreamEvent::ToolCallDelta { .. })));
        assert!(matches!(events.last(), Some(ChatStreamEvent::Failed(_))));
        assert!(!events.contains(&ChatStreamEvent::Done));
    }

    #[tokio::test]
    async fn test_in_stream_error_chunk_fails() {
        let events = stream_events(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\
             data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n",
        )
        .await;

        assert_eq!(events.len(), 2);
        match &events[1] {
            ChatStreamEvent::Failed(reason) => assert!(reason.contains("quota exceeded")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_error_status_is_rejected() {
        let url = serve_once(
            "403 Forbidden",
            "application/json",
            r#"{"error":{"message":"API key not valid"}}"#,
        )
        .await;
        let err = custom_provider(url)
            .chat_stream(&[ChatMessage::user("hi")], &[], &config())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("403"));
        assert!(message.contains("API key not valid"));
    }

    #[tokio::test]
    async fn test_html_response_is_rejected() {
        let url = serve_once("200 OK", "text/html", "<html>captive portal</html>").await;
        let result = custom_provider(url)
            .chat_stream(&[ChatMessage::user("hi")], &[], &config())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_google_stream_completion_follows_finish_reason() {
        let finished = serve_once(
            "200 OK",
            "text/event-stream",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]},\"finishReason\":\"STOP\"}]}\n\n",
        )
        .await;
        let response = reqwest::get(&finished).await.unwrap();
        let events = drain(spawn_sse_reader(response, StreamDialect::Google)).await;
        assert_eq!(
            events,
            vec![ChatStreamEvent::ContentDelta("Hi".to_string()), ChatStreamEvent::Done]
        );

        let cut = serve_once(
            "200 OK",
            "text/event-stream",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\n",
        )
        .await;
        let response = reqwest::get(&cut).await.unwrap();
        let events = drain(spawn_sse_reader(response, StreamDialect::Google)).await;
        assert!(matches!(events.last(), Some(ChatStreamEvent::Failed(_))));
    }
}
