//! Session Cache
//!
//! Owns every live [`Session`], keyed by (application, generation type).
//! Entries expire a fixed time after creation and a fixed time after last
//! access, whichever comes first. Eviction only drops the cache's handle;
//! a generation still holding the `Arc<Session>` keeps running.

use crate::config::CoreConfig;
use crate::history::ChatHistoryStore;
use crate::memory::ChatMemory;
use crate::model::{ChatModelClient, ToolStreamingClient};
use crate::registry::{ClientKind, GenerationRegistry};
use crate::session::{Session, SessionClient};
use crate::types::*;
use moka::future::Cache;
use std::sync::Arc;

pub type SessionKey = (AppId, GenerationType);

/// Model clients sessions are bound to, by client kind.
#[derive(Clone, Default)]
pub struct ModelClients {
    pub chat: Option<Arc<dyn ChatModelClient>>,
    pub tooling: Option<Arc<dyn ToolStreamingClient>>,
}

pub struct SessionCache {
    sessions: Cache<SessionKey, Arc<Session>>,
    registry: Arc<GenerationRegistry>,
    history: Arc<dyn ChatHistoryStore>,
    clients: ModelClients,
    memory_window: usize,
}

impl SessionCache {
    pub fn new(
        config: &CoreConfig,
        registry: Arc<GenerationRegistry>,
        history: Arc<dyn ChatHistoryStore>,
        clients: ModelClients,
    ) -> Self {
        let sessions = Cache::builder()
            .max_capacity(config.cache_max_sessions)
            .time_to_live(config.expire_after_write)
            .time_to_idle(config.expire_after_access)
            .eviction_listener(|key: Arc<SessionKey>, _session, cause| {
                tracing::debug!(
                    "[🧠] Session app {} {} evicted ({:?})",
                    key.0,
                    key.1,
                    cause
                );
            })
            .build();

        Self {
            sessions,
            registry,
            history,
            clients,
            memory_window: config.memory_window,
        }
    }

    /// Returns the session for the pair, building it on first use. Concurrent
    /// misses on the same key share one construction.
    pub async fn get(&self, app_id: AppId, gen_type: GenerationType) -> Result<Arc<Session>> {
        self.sessions
            .try_get_with((app_id, gen_type), self.build(app_id, gen_type))
            .await
            .map_err(|shared| ObservedError::from_shared(&shared))
    }

    async fn build(&self, app_id: AppId, gen_type: GenerationType) -> Result<Arc<Session>> {
        let client = self.bind_client(gen_type)?;

        let mut memory = ChatMemory::new(self.memory_window);
        match self.history.load_recent(app_id, self.memory_window).await {
            Ok(turns) => {
                let loaded = memory.warm_start(turns);
                tracing::info!(
                    "[🧠] New session app {} {} on {} (warm start: {} turns)",
                    app_id,
                    gen_type,
                    client.name(),
                    loaded
                );
            }
            Err(e) => {
                tracing::warn!(
                    "[🧠] Warm start failed for app {}, starting empty: {}",
                    app_id,
                    e.inner
                );
            }
        }

        Ok(Arc::new(Session::new(app_id, gen_type, client, memory)))
    }

    fn bind_client(&self, gen_type: GenerationType) -> Result<SessionClient> {
        let profile = self.registry.profile(gen_type)?;
        let client = match profile.client_kind {
            ClientKind::Chat => self.clients.chat.clone().map(SessionClient::Chat),
            ClientKind::ToolStreaming => self.clients.tooling.clone().map(SessionClient::Tooling),
        };
        match client {
            Some(c) => Ok(c),
            None => Err(CodeloomError::Configuration(format!(
                "No {:?} model client configured for {}",
                profile.client_kind, gen_type
            ))
            .into()),
        }
    }

    pub async fn invalidate(&self, app_id: AppId, gen_type: GenerationType) {
        self.sessions.invalidate(&(app_id, gen_type)).await;
    }

    /// Drops every session of the application.
    pub async fn invalidate_app(&self, app_id: AppId) {
        for gen_type in GenerationType::ALL {
            self.invalidate(app_id, gen_type).await;
        }
    }

    pub async fn contains(&self, app_id: AppId, gen_type: GenerationType) -> bool {
        self.sessions.get(&(app_id, gen_type)).await.is_some()
    }

    /// Live entries after pending maintenance has run.
    pub async fn entry_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::SqliteChatHistory;
    use crate::model::{EventStream, ModelRequest};
    use async_trait::async_trait;

    struct NullChat;

    #[async_trait]
    impl ChatModelClient for NullChat {
        fn name(&self) -> &str {
            "null"
        }
        async fn complete(&self, _request: ModelRequest) -> Result<String> {
            Ok(String::new())
        }
        async fn stream(&self, _request: ModelRequest) -> Result<EventStream> {
            Ok(Box::pin(futures_util::stream::empty()))
        }
    }

    async fn cache(clients: ModelClients) -> (SessionCache, Arc<SqliteChatHistory>) {
        let history = Arc::new(SqliteChatHistory::in_memory().await.unwrap());
        let cache = SessionCache::new(
            &CoreConfig::default(),
            Arc::new(GenerationRegistry::standard()),
            history.clone(),
            clients,
        );
        (cache, history)
    }

    #[tokio::test]
    async fn test_get_is_memoized_per_key() {
        let (cache, _) = cache(ModelClients {
            chat: Some(Arc::new(NullChat)),
            tooling: None,
        })
        .await;
        let a = cache.get(AppId(1), GenerationType::SingleFile).await.unwrap();
        let b = cache.get(AppId(1), GenerationType::SingleFile).await.unwrap();
        let c = cache.get(AppId(1), GenerationType::MultiFile).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.entry_count().await, 2);
    }

    #[tokio::test]
    async fn test_missing_client_is_configuration_error_and_not_cached() {
        let (cache, _) = cache(ModelClients {
            chat: Some(Arc::new(NullChat)),
            tooling: None,
        })
        .await;
        let err = cache
            .get(AppId(1), GenerationType::ToolDrivenProject)
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(!cache.contains(AppId(1), GenerationType::ToolDrivenProject).await);
    }

    #[tokio::test]
    async fn test_warm_start_replays_history_oldest_first() {
        let (cache, history) = cache(ModelClients {
            chat: Some(Arc::new(NullChat)),
            tooling: None,
        })
        .await;
        history.append(AppId(5), ChatRole::User, "first").await.unwrap();
        history.append(AppId(5), ChatRole::Ai, "second").await.unwrap();

        let session = cache.get(AppId(5), GenerationType::SingleFile).await.unwrap();
        let window = session.memory_snapshot().await;
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "first");
        assert_eq!(window[1].content, "second");
    }

    #[tokio::test]
    async fn test_invalidate_app_drops_all_types() {
        let (cache, _) = cache(ModelClients {
            chat: Some(Arc::new(NullChat)),
            tooling: None,
        })
        .await;
        let held = cache.get(AppId(2), GenerationType::SingleFile).await.unwrap();
        cache.get(AppId(2), GenerationType::MultiFile).await.unwrap();
        cache.invalidate_app(AppId(2)).await;
        assert_eq!(cache.entry_count().await, 0);
        // Evicted sessions stay usable by whoever still holds them.
        assert_eq!(held.app_id(), AppId(2));
        let fresh = cache.get(AppId(2), GenerationType::SingleFile).await.unwrap();
        assert!(!Arc::ptr_eq(&held, &fresh));
    }
}
