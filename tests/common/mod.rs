#![allow(dead_code)]

use async_trait::async_trait;
use codeloom::config::CoreConfig;
use codeloom::content_store::FsContentStore;
use codeloom::history::{ChatHistoryStore, SqliteChatHistory};
use codeloom::model::*;
use codeloom::registry::GenerationRegistry;
use codeloom::session_cache::ModelClients;
use codeloom::*;
use futures_util::StreamExt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Plays back fixed events. With `hang_after` set the stream never
/// terminates after the scripted events, like a stalled upstream.
pub struct ScriptedModel {
    pub reply: String,
    pub events: Vec<StreamEvent>,
    pub hang_after: bool,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            events: Vec::new(),
            hang_after: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn streaming(events: Vec<StreamEvent>) -> Self {
        Self {
            reply: String::new(),
            events,
            hang_after: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn hanging(events: Vec<StreamEvent>) -> Self {
        Self {
            hang_after: true,
            ..Self::streaming(events)
        }
    }

    fn event_stream(&self, request: ModelRequest) -> EventStream {
        self.requests.lock().unwrap().push(request);
        let events = futures_util::stream::iter(self.events.clone());
        if self.hang_after {
            Box::pin(events.chain(futures_util::stream::pending()))
        } else {
            Box::pin(events)
        }
    }
}

#[async_trait]
impl ChatModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted-chat"
    }

    async fn complete(&self, request: ModelRequest) -> codeloom::Result<String> {
        self.requests.lock().unwrap().push(request);
        if self.reply == "!fail" {
            return Err(CodeloomError::UpstreamModel("backend unavailable".into()).into());
        }
        Ok(self.reply.clone())
    }

    async fn stream(&self, request: ModelRequest) -> codeloom::Result<EventStream> {
        Ok(self.event_stream(request))
    }
}

#[async_trait]
impl ToolStreamingClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted-tools"
    }

    async fn stream_with_tools(&self, request: ModelRequest) -> codeloom::Result<EventStream> {
        Ok(self.event_stream(request))
    }
}

/// SQLite history that counts warm-start loads and slows them down so
/// concurrent misses overlap.
pub struct CountingHistory {
    pub inner: SqliteChatHistory,
    pub loads: AtomicUsize,
    pub load_delay: Duration,
}

impl CountingHistory {
    pub async fn new(load_delay: Duration) -> Self {
        Self {
            inner: SqliteChatHistory::in_memory().await.unwrap(),
            loads: AtomicUsize::new(0),
            load_delay,
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatHistoryStore for CountingHistory {
    async fn append(&self, app_id: AppId, role: ChatRole, text: &str) -> codeloom::Result<()> {
        self.inner.append(app_id, role, text).await
    }

    async fn load_recent(&self, app_id: AppId, max_count: usize) -> codeloom::Result<Vec<ChatTurn>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.load_delay).await;
        self.inner.load_recent(app_id, max_count).await
    }

    async fn delete_by_app(&self, app_id: AppId) -> codeloom::Result<u64> {
        self.inner.delete_by_app(app_id).await
    }
}

pub struct Harness {
    pub facade: GenerationFacade,
    pub history: Arc<CountingHistory>,
    pub root: tempfile::TempDir,
}

impl Harness {
    pub async fn new(chat: Arc<ScriptedModel>, tooling: Option<Arc<ScriptedModel>>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let history = Arc::new(CountingHistory::new(Duration::ZERO).await);
        let config = CoreConfig {
            output_root: root.path().to_path_buf(),
            ..CoreConfig::default()
        };
        let clients = ModelClients {
            chat: Some(chat as Arc<dyn ChatModelClient>),
            tooling: tooling.map(|t| t as Arc<dyn ToolStreamingClient>),
        };
        let facade = GenerationFacade::new(
            &config,
            Arc::new(GenerationRegistry::standard()),
            history.clone(),
            Arc::new(FsContentStore::new()),
            clients,
        );
        Self {
            facade,
            history,
            root,
        }
    }

    /// Turns for the app, oldest first.
    pub async fn turns(&self, app_id: AppId) -> Vec<ChatTurn> {
        let mut turns = self.history.inner.load_recent(app_id, 100).await.unwrap();
        turns.reverse();
        turns
    }
}

pub async fn collect(stream: GenerationStream) -> Vec<StreamMessage> {
    stream.collect::<Vec<_>>().await
}

pub fn read(dir: &Path, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.join(name)).ok()
}
