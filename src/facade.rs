//! Generation Facade
//!
//! Entry point for one generation request. The user's message is written to
//! chat history before anything else runs; exactly one AI turn (the reply,
//! or a failure description) is written once the generation terminates.
//! Once a session exists, that same AI turn is pushed into its window, so
//! the window alternates the same way the replayed history does.
//!
//! Streaming text generations hand the accumulated reply to parse and save
//! on a detached task once the upstream completes. Failures there are logged
//! only; the caller already holds the full text.

use crate::config::CoreConfig;
use crate::constants::{AI_CANCELLED_TEXT, AI_FAILURE_PREFIX, STREAM_CHANNEL_CAPACITY};
use crate::content_store::ContentStore;
use crate::history::ChatHistoryStore;
use crate::parser::ParserDispatch;
use crate::registry::GenerationRegistry;
use crate::saver::SaverDispatch;
use crate::session::Session;
use crate::session_cache::{ModelClients, SessionCache};
use crate::stream_adapter::{StreamOutcome, ToolStreamAdapter};
use crate::types::*;
use futures_util::Stream;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

/// Caller-facing message stream. Dropping it, or calling [`cancel`], stops
/// forwarding and releases the upstream model request.
///
/// [`cancel`]: GenerationStream::cancel
pub struct GenerationStream {
    inner: ReceiverStream<StreamMessage>,
    cancel: CancellationToken,
}

impl GenerationStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for GenerationStream {
    type Item = StreamMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for GenerationStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct GenerationFacade {
    registry: Arc<GenerationRegistry>,
    sessions: Arc<SessionCache>,
    parsers: ParserDispatch,
    savers: SaverDispatch,
    history: Arc<dyn ChatHistoryStore>,
    tracker: TaskTracker,
}

impl GenerationFacade {
    pub fn new(
        config: &CoreConfig,
        registry: Arc<GenerationRegistry>,
        history: Arc<dyn ChatHistoryStore>,
        store: Arc<dyn ContentStore>,
        clients: ModelClients,
    ) -> Self {
        let sessions = Arc::new(SessionCache::new(
            config,
            registry.clone(),
            history.clone(),
            clients,
        ));
        Self {
            parsers: ParserDispatch::new(registry.clone()),
            savers: SaverDispatch::new(registry.clone(), store, config.output_root.clone()),
            registry,
            sessions,
            history,
            tracker: TaskTracker::new(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    pub fn savers(&self) -> &SaverDispatch {
        &self.savers
    }

    /// Generates, parses and saves in one call. Returns the artifact's
    /// directory.
    pub async fn generate(
        &self,
        app_id: AppId,
        message: &str,
        gen_type: GenerationType,
    ) -> Result<PathBuf> {
        let span = tracing::info_span!("generation", app_id = %app_id, gen_type = %gen_type);
        self.generate_inner(app_id, message, gen_type)
            .instrument(span)
            .await
    }

    async fn generate_inner(
        &self,
        app_id: AppId,
        message: &str,
        gen_type: GenerationType,
    ) -> Result<PathBuf> {
        Self::check_message(message)?;
        let profile = self.registry.profile(gen_type)?;
        if !profile.persists_artifact() {
            return Err(CodeloomError::Configuration(format!(
                "{} generation is only available as a stream",
                gen_type
            ))
            .into());
        }

        record_turn(self.history.as_ref(), app_id, ChatRole::User, message).await;

        let session = match self.sessions.get(app_id, gen_type).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("[⚙️ ] No session for app {}: {}", app_id, e.inner);
                let text = failure_text(&e.inner.to_string());
                record_turn(self.history.as_ref(), app_id, ChatRole::Ai, &text).await;
                return Err(e);
            }
        };
        let text = match session.complete(message).await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                let err: ObservedError =
                    CodeloomError::UpstreamModel("model returned an empty response".into()).into();
                let text = failure_text(&err.inner.to_string());
                close_turn(self.history.as_ref(), &session, app_id, &text).await;
                return Err(err);
            }
            Err(e) => {
                tracing::error!("[⚙️ ] Generation failed for app {}: {}", app_id, e.inner);
                let text = failure_text(&e.inner.to_string());
                close_turn(self.history.as_ref(), &session, app_id, &text).await;
                return Err(e);
            }
        };
        record_turn(self.history.as_ref(), app_id, ChatRole::Ai, &text).await;

        let artifact = self.parsers.parse(gen_type, &text)?;
        self.savers.save(gen_type, &artifact, app_id).await
    }

    /// Starts a streaming generation. The returned stream ends with either
    /// `Done` or `Error`, unless the caller cancels it first.
    pub async fn generate_stream(
        &self,
        app_id: AppId,
        message: &str,
        gen_type: GenerationType,
    ) -> Result<GenerationStream> {
        let span = tracing::info_span!("generation", app_id = %app_id, gen_type = %gen_type);
        self.generate_stream_inner(app_id, message, gen_type, span.clone())
            .instrument(span)
            .await
    }

    async fn generate_stream_inner(
        &self,
        app_id: AppId,
        message: &str,
        gen_type: GenerationType,
        span: tracing::Span,
    ) -> Result<GenerationStream> {
        Self::check_message(message)?;
        let persists = self.registry.profile(gen_type)?.persists_artifact();

        record_turn(self.history.as_ref(), app_id, ChatRole::User, message).await;

        let session = match self.sessions.get(app_id, gen_type).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("[⚙️ ] No session for app {}: {}", app_id, e.inner);
                let text = failure_text(&e.inner.to_string());
                record_turn(self.history.as_ref(), app_id, ChatRole::Ai, &text).await;
                return Err(e);
            }
        };
        let upstream = match session.stream(message).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!("[⚙️ ] Could not open stream for app {}: {}", app_id, e.inner);
                let text = failure_text(&e.inner.to_string());
                close_turn(self.history.as_ref(), &session, app_id, &text).await;
                return Err(e);
            }
        };

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let adapter = ToolStreamAdapter::new(tx, cancel.clone());

        let history = self.history.clone();
        let parsers = self.parsers.clone();
        let savers = self.savers.clone();
        let tracker = self.tracker.clone();

        self.tracker.spawn(
            async move {
                let mut reply = String::new();
                let outcome = adapter
                    .forward(upstream, |event| match event {
                        StreamEvent::PartialText(text) => reply.push_str(text),
                        StreamEvent::ToolCallRequested { name, .. } => {
                            reply.push_str(&format!("\n[tool call: {}]\n", name));
                        }
                        StreamEvent::ToolCallCompleted { result, .. } => {
                            reply.push_str(&format!("[tool result: {}]\n", result));
                        }
                        StreamEvent::Completed | StreamEvent::Failed(_) => {}
                    })
                    .await;
                drop(adapter);

                match outcome {
                    StreamOutcome::Completed => {
                        if reply.is_empty() {
                            let text = failure_text("model returned an empty response");
                            close_turn(history.as_ref(), &session, app_id, &text).await;
                            return;
                        }
                        close_turn(history.as_ref(), &session, app_id, &reply).await;
                        if persists {
                            tracker.spawn(
                                persist_in_background(parsers, savers, gen_type, app_id, reply)
                                    .in_current_span(),
                            );
                        }
                    }
                    StreamOutcome::Failed(msg) => {
                        tracing::error!("[⚙️ ] Stream failed for app {}: {}", app_id, msg);
                        close_turn(history.as_ref(), &session, app_id, &failure_text(&msg)).await;
                    }
                    StreamOutcome::Cancelled => {
                        tracing::info!("[⚙️ ] Stream for app {} cancelled by caller", app_id);
                        close_turn(history.as_ref(), &session, app_id, AI_CANCELLED_TEXT).await;
                    }
                }
            }
            .instrument(span),
        );

        Ok(GenerationStream {
            inner: ReceiverStream::new(rx),
            cancel,
        })
    }

    /// Removes an application's chat history and drops its sessions.
    pub async fn delete_app(&self, app_id: AppId) -> Result<u64> {
        let removed = self.history.delete_by_app(app_id).await?;
        self.sessions.invalidate_app(app_id).await;
        tracing::info!("[⚙️ ] Deleted {} history turns for app {}", removed, app_id);
        Ok(removed)
    }

    /// Waits for every in-flight stream and background save to finish.
    pub async fn drain_background_tasks(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    fn check_message(message: &str) -> Result<()> {
        if message.trim().is_empty() {
            return Err(CodeloomError::Validation("user message must not be empty".into()).into());
        }
        Ok(())
    }
}

async fn persist_in_background(
    parsers: ParserDispatch,
    savers: SaverDispatch,
    gen_type: GenerationType,
    app_id: AppId,
    reply: String,
) {
    let artifact = match parsers.parse(gen_type, &reply) {
        Ok(a) => a,
        Err(e) => {
            tracing::warn!("[💾] Not saving output for app {}: {}", app_id, e.inner);
            return;
        }
    };
    if let Err(e) = savers.save(gen_type, &artifact, app_id).await {
        tracing::error!("[💾] Background save failed for app {}: {}", app_id, e.inner);
    }
}

/// History writes never fail the generation they describe.
async fn record_turn(history: &dyn ChatHistoryStore, app_id: AppId, role: ChatRole, text: &str) {
    if let Err(e) = history.append(app_id, role, text).await {
        tracing::error!(
            "[💾] Failed to record {} turn for app {}: {}",
            role.as_str(),
            app_id,
            e.inner
        );
    }
}

/// Ends the turn in both the session window and durable history.
async fn close_turn(history: &dyn ChatHistoryStore, session: &Session, app_id: AppId, text: &str) {
    session.remember_reply(text).await;
    record_turn(history, app_id, ChatRole::Ai, text).await;
}

fn failure_text(error: &str) -> String {
    format!("{}{}", AI_FAILURE_PREFIX, error)
}
