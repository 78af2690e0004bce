//! OpenAI-compatible model client.
//!
//! Implements both model contracts over `/chat/completions`. Streaming
//! responses are read as SSE `data:` lines on a spawned task that feeds an
//! mpsc channel; dropping the returned stream closes the channel, which stops
//! the task and drops the HTTP response.

use crate::config::ModelSettings;
use crate::constants::{MAX_SSE_LINE_BYTES, MAX_STREAM_LINES, STREAM_CHANNEL_CAPACITY};
use crate::memory::MemoryMessage;
use crate::model::*;
use crate::specs::openai::*;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::*;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

#[derive(Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    settings: ModelSettings,
    tools: Option<Arc<ToolRegistry>>,
}

/// How one streamed completion ended.
#[derive(Debug)]
pub(crate) enum SseRound {
    Finished {
        text: String,
        tool_calls: Vec<OpenAiToolCall>,
    },
    Failed(String),
    /// The consumer went away.
    Disconnected,
}

#[derive(Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl OpenAiCompatClient {
    pub fn new(http: reqwest::Client, settings: ModelSettings) -> Self {
        Self {
            http,
            settings,
            tools: None,
        }
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub(crate) fn build_messages(request: &ModelRequest) -> Vec<OpenAiMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(OpenAiMessage::System {
                content: request.system_prompt.clone(),
            });
        }
        for MemoryMessage { role, content } in &request.messages {
            messages.push(match role {
                ChatRole::User => OpenAiMessage::User {
                    content: content.clone(),
                },
                ChatRole::Ai => OpenAiMessage::Assistant {
                    content: Some(content.clone()),
                    tool_calls: Vec::new(),
                },
            });
        }
        messages
    }

    fn build_request(&self, messages: Vec<OpenAiMessage>, stream: bool) -> OpenAiRequest {
        let tools = match &self.tools {
            Some(t) if !t.is_empty() => Some(t.definitions()),
            _ => None,
        };
        OpenAiRequest {
            model: self.settings.model.clone(),
            messages,
            stream: if stream { Some(true) } else { None },
            max_tokens: Some(self.settings.max_tokens),
            tools,
        }
    }

    async fn post(&self, body: &OpenAiRequest) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.settings.base_url);
        let mut builder = self.http.post(&url).json(body);
        if !self.settings.api_key.is_empty() {
            builder = builder.bearer_auth(&self.settings.api_key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = match response.text().await {
                Ok(t) => t,
                Err(_) => "Unknown error (failed to read response text)".to_string(),
            };
            return Err(CodeloomError::UpstreamModel(format!(
                "{} returned status {}: {}",
                self.settings.model, status, err_body
            ))
            .into());
        }
        Ok(response)
    }

    fn lines(
        response: reqwest::Response,
    ) -> impl Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin + Send {
        let bytes_stream = response
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));
        FramedRead::new(
            tokio_util::io::StreamReader::new(bytes_stream),
            LinesCodec::new_with_max_length(MAX_SSE_LINE_BYTES),
        )
    }

    /// Reads one streamed completion, forwarding text deltas as they arrive
    /// and assembling tool calls by their stream index.
    pub(crate) async fn pump_sse<S>(lines: &mut S, tx: &mpsc::Sender<StreamEvent>) -> SseRound
    where
        S: Stream<Item = std::result::Result<String, LinesCodecError>> + Unpin,
    {
        let mut text = String::new();
        let mut tool_index_map: BTreeMap<u32, ToolCallBuffer> = BTreeMap::new();
        let mut finish_reason: Option<String> = None;
        let mut line_count = 0usize;

        while let Some(line_result) = lines.next().await {
            line_count += 1;
            if line_count > MAX_STREAM_LINES {
                tracing::error!(
                    "[☁️  -> ⚙️ ] Stream exceeded max line limit ({})",
                    MAX_STREAM_LINES
                );
                return SseRound::Failed("Stream exceeded max line limit".to_string());
            }

            let line = match line_result {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!("[☁️  -> ⚙️ ] Line Parse Error: {}", e);
                    return SseRound::Failed(format!("stream read error: {}", e));
                }
            };

            let data = match line.strip_prefix("data:") {
                Some(d) => d.trim_start(),
                None => continue,
            };

            if data == "[DONE]" {
                tracing::debug!("[☁️  -> ⚙️ ] Stream end marker [DONE] received");
                return Self::finish_round(text, tool_index_map);
            }

            if let Ok(err) = serde_json::from_str::<OpenAiErrorEnvelope>(data) {
                tracing::error!("[☁️  -> ⚙️ ] Stream Error: {}", err.error.message);
                return SseRound::Failed(err.error.message);
            }

            let chunk = match serde_json::from_str::<OpenAiChunk>(data) {
                Ok(c) => c,
                Err(_) => {
                    tracing::debug!(
                        "[STREAM] Unknown line format: {}",
                        crate::str_utils::first_n_chars_lossy(data, 200)
                    );
                    continue;
                }
            };

            for choice in chunk.choices {
                if let Some(content) = choice.delta.content {
                    if !content.is_empty() {
                        text.push_str(&content);
                        if tx.send(StreamEvent::PartialText(content)).await.is_err() {
                            tracing::trace!("Consumer dropped, stopping stream");
                            return SseRound::Disconnected;
                        }
                    }
                }
                for delta in choice.delta.tool_calls {
                    let entry = tool_index_map.entry(delta.index).or_default();
                    if let Some(id) = delta.id {
                        entry.id = Some(id);
                    }
                    if let Some(f) = delta.function {
                        if let Some(n) = f.name {
                            entry.name.push_str(&n);
                        }
                        if let Some(a) = f.arguments {
                            entry.arguments.push_str(&a);
                        }
                    }
                }
                if choice.finish_reason.is_some() {
                    finish_reason = choice.finish_reason;
                }
            }
        }

        match finish_reason {
            Some(reason) => {
                tracing::debug!("[☁️  -> ⚙️ ] Stream closed after finish_reason={}", reason);
                Self::finish_round(text, tool_index_map)
            }
            None => SseRound::Failed("model stream ended before completion".to_string()),
        }
    }

    fn finish_round(text: String, tool_index_map: BTreeMap<u32, ToolCallBuffer>) -> SseRound {
        let tool_calls = tool_index_map
            .into_values()
            .filter(|buf| !buf.name.is_empty())
            .map(|buf| OpenAiToolCall {
                id: match buf.id {
                    Some(id) => id,
                    None => format!("call_{}", uuid::Uuid::new_v4().simple()),
                },
                r#type: "function".to_string(),
                function: OpenAiFunctionCall {
                    name: buf.name,
                    arguments: buf.arguments,
                },
            })
            .collect();
        SseRound::Finished { text, tool_calls }
    }

    async fn send_terminal(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
        if tx.send(event).await.is_err() {
            tracing::trace!("Consumer dropped before terminal event");
        }
    }

    async fn run_text_stream(self, request: ModelRequest, tx: mpsc::Sender<StreamEvent>) {
        let body = self.build_request(Self::build_messages(&request), true);
        let response = match self.post(&body).await {
            Ok(r) => r,
            Err(e) => {
                Self::send_terminal(&tx, StreamEvent::Failed(e.inner.to_string())).await;
                return;
            }
        };
        let mut lines = Self::lines(response);
        match Self::pump_sse(&mut lines, &tx).await {
            SseRound::Finished { .. } => Self::send_terminal(&tx, StreamEvent::Completed).await,
            SseRound::Failed(msg) => Self::send_terminal(&tx, StreamEvent::Failed(msg)).await,
            SseRound::Disconnected => {}
        }
    }

    async fn run_tool_rounds(
        self,
        tools: Arc<ToolRegistry>,
        request: ModelRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let ctx = ToolContext {
            app_id: request.app_id,
        };
        let mut messages = Self::build_messages(&request);

        for round in 0..self.settings.max_tool_rounds {
            let body = self.build_request(messages.clone(), true);
            let response = match self.post(&body).await {
                Ok(r) => r,
                Err(e) => {
                    Self::send_terminal(&tx, StreamEvent::Failed(e.inner.to_string())).await;
                    return;
                }
            };
            let mut lines = Self::lines(response);
            let (text, tool_calls) = match Self::pump_sse(&mut lines, &tx).await {
                SseRound::Finished { text, tool_calls } => (text, tool_calls),
                SseRound::Failed(msg) => {
                    Self::send_terminal(&tx, StreamEvent::Failed(msg)).await;
                    return;
                }
                SseRound::Disconnected => return,
            };

            if tool_calls.is_empty() {
                tracing::debug!("[🔧] Tool loop finished after {} round(s)", round + 1);
                Self::send_terminal(&tx, StreamEvent::Completed).await;
                return;
            }

            messages.push(OpenAiMessage::Assistant {
                content: if text.is_empty() { None } else { Some(text) },
                tool_calls: tool_calls.clone(),
            });

            for call in tool_calls {
                let requested = StreamEvent::ToolCallRequested {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                };
                if tx.send(requested).await.is_err() {
                    return;
                }
                let result = tools
                    .execute(&call.function.name, &call.function.arguments, &ctx)
                    .await;
                let completed = StreamEvent::ToolCallCompleted {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    result: result.clone(),
                };
                if tx.send(completed).await.is_err() {
                    return;
                }
                messages.push(OpenAiMessage::Tool {
                    content: result,
                    tool_call_id: call.id,
                });
            }
        }

        tracing::warn!(
            "[🔧] Tool loop hit the round limit ({}) for app {}",
            self.settings.max_tool_rounds,
            request.app_id
        );
        Self::send_terminal(
            &tx,
            StreamEvent::Failed(format!(
                "tool call round limit ({}) exceeded",
                self.settings.max_tool_rounds
            )),
        )
        .await;
    }
}

#[async_trait]
impl ChatModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, request: ModelRequest) -> Result<String> {
        let body = self.build_request(Self::build_messages(&request), false);
        let response = self.post(&body).await?;
        let parsed: OpenAiResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        match content {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(CodeloomError::UpstreamModel(format!(
                "{} returned an empty response",
                self.settings.model
            ))
            .into()),
        }
    }

    async fn stream(&self, request: ModelRequest) -> Result<EventStream> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let client = self.clone();
        tokio::spawn(client.run_text_stream(request, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl ToolStreamingClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn stream_with_tools(&self, request: ModelRequest) -> Result<EventStream> {
        let tools = match &self.tools {
            Some(t) => t.clone(),
            None => {
                return Err(CodeloomError::Configuration(format!(
                    "model client {} has no tools registered",
                    self.settings.model
                ))
                .into())
            }
        };
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let client = self.clone();
        tokio::spawn(client.run_tool_rounds(tools, request, tx));
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}
