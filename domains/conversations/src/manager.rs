//! Conversation State Manager
//!
//! Reconciles the in-memory session with the Remote Store and the
//! Inference Gateway. Every send runs one turn:
//!
//! 1. persist the user message (failure: error returned, session untouched)
//! 2. append it locally and raise `is_loading`
//! 3. send the whole history to the gateway
//! 4. persist the reply, attach its images, append it
//!
//! Gateway or reply-persistence failures set `is_error`. `is_loading` is
//! released on every exit path by [`TurnGuard`].
//!
//! Each turn is tagged with the session generation it started in. When the
//! selection changes mid-turn, the reply is still stored for its own thread
//! but never applied to the new session.

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::entities::{Message, NewMessage, Thread, DEFAULT_THREAD_TITLE};
use crate::domain::state::TurnEvent;
use crate::repository::ConversationStore;
use crate::session::ConversationSession;
use parley_common::{Error, Result};
use parley_gateway::{GatewayError, GenerateRequest, InferenceGateway};

/// Why a turn ended without an assistant message
#[derive(Debug, thiserror::Error)]
pub enum TurnFailure {
    #[error("Failed to get AI response: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to save AI response: {0}")]
    AssistantPersist(#[source] Error),
}

/// Result of [`ConversationManager::send_message`]
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank text or no thread selected; nothing happened
    Ignored,
    /// Both messages stored and shown
    Completed { user: Message, assistant: Message },
    /// User message shown, no reply; `is_error` is set
    Failed { user: Message, reason: TurnFailure },
    /// The selection changed while the turn ran; nothing applied to the new session
    Superseded { user: Message },
}

/// Releases the turn-in-flight state when dropped, unless the turn already
/// finished or its session was replaced.
struct TurnGuard<'a> {
    session: &'a watch::Sender<ConversationSession>,
    generation: u64,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.session
            .send_if_modified(|s| s.generation == generation && s.abandon_turn());
    }
}

/// Owner of the current conversation session
pub struct ConversationManager {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn InferenceGateway>,
    user_id: Option<Uuid>,
    session: watch::Sender<ConversationSession>,
}

impl ConversationManager {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn InferenceGateway>,
        user_id: Option<Uuid>,
    ) -> Self {
        let (session, _) = watch::channel(ConversationSession::default());
        Self {
            store,
            gateway,
            user_id,
            session,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> ConversationSession {
        self.session.borrow().clone()
    }

    /// Receiver that observes every session change, for re-rendering
    pub fn subscribe(&self) -> watch::Receiver<ConversationSession> {
        self.session.subscribe()
    }

    /// Replace the session with one for `thread` and load its history.
    ///
    /// A failed read leaves the history empty. A read that completes after
    /// another selection change is discarded.
    pub async fn select_thread(&self, thread: Option<Thread>) {
        let thread_id = thread.as_ref().map(|t| t.id);
        let mut generation = 0;
        self.session.send_modify(|s| {
            generation = s.generation + 1;
            *s = ConversationSession::new(generation, thread);
        });

        tracing::debug!(generation, thread_id = ?thread_id, "Thread selected");

        if let Some(thread_id) = thread_id {
            self.load_history(generation, thread_id).await;
        }
    }

    /// Re-read the selected thread's history
    pub async fn reload_messages(&self) {
        let (generation, thread_id) = {
            let session = self.session.borrow();
            (session.generation, session.selected_thread_id())
        };
        if let Some(thread_id) = thread_id {
            self.load_history(generation, thread_id).await;
        }
    }

    async fn load_history(&self, generation: u64, thread_id: Uuid) {
        match self.store.list_messages(thread_id).await {
            Ok(messages) => {
                let count = messages.len();
                let installed = self.session.send_if_modified(|s| {
                    if s.generation != generation {
                        return false;
                    }
                    s.install_history(messages);
                    true
                });

                if installed {
                    tracing::debug!(thread_id = %thread_id, count, "Thread history loaded");
                } else {
                    tracing::debug!(thread_id = %thread_id, "Discarding history for a replaced session");
                }
            }
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Failed to load thread history");
            }
        }
    }

    /// Run one chat turn for the selected thread.
    ///
    /// Returns `Err` only when the user message could not be stored (the
    /// session is left as it was) or when a turn is already in flight.
    /// Every failure after that is a [`TurnOutcome::Failed`].
    pub async fn send_message(&self, text: &str) -> Result<TurnOutcome> {
        let content = text.trim();
        if content.is_empty() {
            return Ok(TurnOutcome::Ignored);
        }

        let mut started: Option<Result<(u64, Uuid)>> = None;
        self.session.send_if_modified(|s| {
            let Some(thread_id) = s.selected_thread_id() else {
                return false;
            };
            match s.advance(TurnEvent::Submit) {
                Ok(()) => {
                    started = Some(Ok((s.generation, thread_id)));
                    true
                }
                Err(_) => {
                    started = Some(Err(Error::Conflict(format!(
                        "A reply is still pending in thread {}",
                        thread_id
                    ))));
                    false
                }
            }
        });

        let (generation, thread_id) = match started {
            None => return Ok(TurnOutcome::Ignored),
            Some(result) => result?,
        };
        let _guard = TurnGuard {
            session: &self.session,
            generation,
        };

        let new_user = NewMessage::user(thread_id, self.user_id, content.to_string())?;
        let user_message = match self.store.insert_message(&new_user).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Failed to send message");
                self.advance(generation, TurnEvent::UserMessageFailed);
                return Err(e);
            }
        };

        let context = self.advance_with(generation, TurnEvent::UserMessagePersisted, |s| {
            s.messages.push(user_message.clone());
            s.context()
        });
        let Some(context) = context else {
            tracing::debug!(thread_id = %thread_id, "Session replaced before the gateway call");
            return Ok(TurnOutcome::Superseded { user: user_message });
        };

        let request = GenerateRequest {
            user_id: self.user_id,
            thread_id,
            messages: context,
        };

        let reply = match self.gateway.generate(request).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Failed to get AI response");
                return Ok(self.fail(generation, TurnEvent::GatewayFailed, user_message, e.into()));
            }
        };

        let (answer, images) = reply.into_parts();
        self.advance(generation, TurnEvent::GatewayReplied);

        let new_assistant = NewMessage::assistant(thread_id, answer);
        let stored = match self.store.insert_message(&new_assistant).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Failed to save AI response");
                let reason = TurnFailure::AssistantPersist(e);
                return Ok(self.fail(
                    generation,
                    TurnEvent::AssistantMessageFailed,
                    user_message,
                    reason,
                ));
            }
        };
        let assistant = match stored.with_images(images) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Stored reply cannot carry images");
                let reason = TurnFailure::AssistantPersist(e);
                return Ok(self.fail(
                    generation,
                    TurnEvent::AssistantMessageFailed,
                    user_message,
                    reason,
                ));
            }
        };

        let applied = self.advance_with(generation, TurnEvent::AssistantMessagePersisted, |s| {
            s.messages.push(assistant.clone());
        });
        if applied.is_none() {
            tracing::debug!(
                thread_id = %thread_id,
                message_id = %assistant.id,
                "Reply stored but its session was replaced"
            );
            return Ok(TurnOutcome::Superseded { user: user_message });
        }

        tracing::info!(
            thread_id = %thread_id,
            user_message_id = %user_message.id,
            assistant_message_id = %assistant.id,
            images = assistant.images.len(),
            "Turn completed"
        );

        Ok(TurnOutcome::Completed {
            user: user_message,
            assistant,
        })
    }

    fn fail(
        &self,
        generation: u64,
        event: TurnEvent,
        user: Message,
        reason: TurnFailure,
    ) -> TurnOutcome {
        if self.advance(generation, event) {
            TurnOutcome::Failed { user, reason }
        } else {
            TurnOutcome::Superseded { user }
        }
    }

    /// Apply a turn event if `generation` is still the live session.
    fn advance(&self, generation: u64, event: TurnEvent) -> bool {
        self.advance_with(generation, event, |_| ()).is_some()
    }

    fn advance_with<R>(
        &self,
        generation: u64,
        event: TurnEvent,
        apply: impl FnOnce(&mut ConversationSession) -> R,
    ) -> Option<R> {
        let mut result = None;
        self.session.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            match s.advance(event) {
                Ok(()) => {
                    result = Some(apply(s));
                    true
                }
                Err(e) => {
                    tracing::error!(error = %e, "Turn state out of sync");
                    false
                }
            }
        });
        result
    }

    /// Threads of the signed-in user, newest first. Failures yield an empty list.
    pub async fn list_threads(&self) -> Vec<Thread> {
        let Some(user_id) = self.user_id else {
            tracing::debug!("No signed-in user; no threads to list");
            return Vec::new();
        };

        match self.store.list_threads(user_id).await {
            Ok(threads) => threads,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to fetch threads");
                Vec::new()
            }
        }
    }

    /// Create a thread (titled "New Chat" by default) and select it
    pub async fn create_thread(&self, title: Option<&str>) -> Result<Thread> {
        let user_id = self.user_id.ok_or_else(|| {
            Error::Authentication("A signed-in user is required to create threads".to_string())
        })?;

        let thread = Thread::new(
            user_id,
            Some(title.unwrap_or(DEFAULT_THREAD_TITLE).to_string()),
        )?;
        let created = self.store.create_thread(&thread).await?;

        tracing::info!(thread_id = %created.id, "Thread created");

        self.select_thread(Some(created.clone())).await;
        Ok(created)
    }

    /// Rename a thread; unchanged titles skip the store
    pub async fn rename_thread(&self, thread: &Thread, title: &str) -> Result<Thread> {
        if thread.title.as_deref() == Some(title) {
            return Ok(thread.clone());
        }
        Thread::validate_title(Some(title))?;

        let renamed = self
            .store
            .rename_thread(thread.id, Some(title.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound("Thread not found".to_string()))?;

        self.session
            .send_if_modified(|s| match s.selected_thread.as_mut() {
                Some(selected) if selected.id == renamed.id => {
                    selected.title = renamed.title.clone();
                    true
                }
                _ => false,
            });

        Ok(renamed)
    }

    /// Delete a thread and its messages; clears the selection if it was selected
    pub async fn delete_thread(&self, thread_id: Uuid) -> Result<bool> {
        let deleted = self.store.delete_thread(thread_id).await?;

        let selected = self.session.borrow().selected_thread_id();
        if selected == Some(thread_id) {
            self.select_thread(None).await;
        }

        tracing::info!(thread_id = %thread_id, deleted, "Thread deleted");
        Ok(deleted)
    }
}
