//! Model client contracts consumed by sessions.
//!
//! Streams carry their own terminal event: a well-formed stream ends with
//! `Completed` or `Failed`. A stream that simply stops is treated as a
//! mid-stream disconnect by the consumer.

use crate::memory::MemoryMessage;
use crate::types::*;
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub app_id: AppId,
    pub gen_type: GenerationType,
    pub system_prompt: String,
    /// Conversation window, ending with the prompt being answered.
    pub messages: Vec<MemoryMessage>,
}

/// Plain chat model used for single-file and multi-file generation.
#[async_trait]
pub trait ChatModelClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: ModelRequest) -> Result<String>;

    async fn stream(&self, request: ModelRequest) -> Result<EventStream>;
}

/// Streaming model that may call tools mid-generation. Tool requests and
/// their results are reported in-band as stream events.
#[async_trait]
pub trait ToolStreamingClient: Send + Sync {
    fn name(&self) -> &str;

    async fn stream_with_tools(&self, request: ModelRequest) -> Result<EventStream>;
}
