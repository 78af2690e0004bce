//! Conversational context bound to one (application, generation type) pair.

use crate::memory::{ChatMemory, MemoryMessage};
use crate::model::*;
use crate::prompts::system_prompt;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub enum SessionClient {
    Chat(Arc<dyn ChatModelClient>),
    Tooling(Arc<dyn ToolStreamingClient>),
}

impl SessionClient {
    pub fn name(&self) -> &str {
        match self {
            Self::Chat(c) => c.name(),
            Self::Tooling(c) => c.name(),
        }
    }
}

pub struct Session {
    app_id: AppId,
    gen_type: GenerationType,
    system_prompt: String,
    client: SessionClient,
    memory: Mutex<ChatMemory>,
}

impl Session {
    pub fn new(
        app_id: AppId,
        gen_type: GenerationType,
        client: SessionClient,
        memory: ChatMemory,
    ) -> Self {
        Self {
            app_id,
            gen_type,
            system_prompt: system_prompt(gen_type),
            client,
            memory: Mutex::new(memory),
        }
    }

    pub fn app_id(&self) -> AppId {
        self.app_id
    }

    pub fn gen_type(&self) -> GenerationType {
        self.gen_type
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub async fn memory_snapshot(&self) -> Vec<MemoryMessage> {
        self.memory.lock().await.snapshot()
    }

    pub async fn memory_len(&self) -> usize {
        self.memory.lock().await.len()
    }

    /// Appends the prompt to the window and captures the request. The lock is
    /// released before the model is called.
    async fn prepare(&self, prompt: &str) -> ModelRequest {
        let mut memory = self.memory.lock().await;
        memory.push_user_prompt(prompt);
        ModelRequest {
            app_id: self.app_id,
            gen_type: self.gen_type,
            system_prompt: self.system_prompt.clone(),
            messages: memory.snapshot(),
        }
    }

    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let client = match &self.client {
            SessionClient::Chat(c) => c.clone(),
            SessionClient::Tooling(_) => {
                return Err(CodeloomError::Configuration(format!(
                    "{} sessions only support streaming generation",
                    self.gen_type
                ))
                .into())
            }
        };
        let request = self.prepare(prompt).await;
        let text = client.complete(request).await?;
        self.remember_reply(&text).await;
        Ok(text)
    }

    pub async fn stream(&self, prompt: &str) -> Result<EventStream> {
        let request = self.prepare(prompt).await;
        tracing::debug!(
            "[🧠] app {} {} -> {} ({} messages in window)",
            self.app_id,
            self.gen_type,
            self.client.name(),
            request.messages.len()
        );
        match &self.client {
            SessionClient::Chat(c) => c.stream(request).await,
            SessionClient::Tooling(c) => c.stream_with_tools(request).await,
        }
    }

    /// Records the model's answer in the window. Empty replies are skipped.
    pub async fn remember_reply(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.memory.lock().await.push(ChatRole::Ai, text);
    }
}
