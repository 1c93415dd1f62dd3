//! In-memory conversation session
//!
//! One session exists per selected thread. Selecting another thread
//! replaces it wholesale under a new generation number, so work started
//! against the old session can tell that it no longer applies.

use uuid::Uuid;

use crate::domain::entities::{Message, Thread};
use crate::domain::state::{StateError, TurnEvent, TurnState, TurnStateMachine};
use parley_gateway::ContextMessage;

/// What the view layer renders
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationSession {
    /// Bumped on every selection change
    pub generation: u64,
    pub selected_thread: Option<Thread>,
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub is_error: bool,
    pub turn: TurnState,
}

impl ConversationSession {
    /// Fresh session for a selection; flags cleared and no turn in flight
    pub fn new(generation: u64, selected_thread: Option<Thread>) -> Self {
        Self {
            generation,
            selected_thread,
            ..Self::default()
        }
    }

    pub fn selected_thread_id(&self) -> Option<Uuid> {
        self.selected_thread.as_ref().map(|t| t.id)
    }

    /// Full history as gateway context, oldest first
    pub fn context(&self) -> Vec<ContextMessage> {
        self.messages.iter().map(Message::to_context).collect()
    }

    /// Install loaded history, keeping messages a running turn appended
    /// before the read finished.
    pub(crate) fn install_history(&mut self, loaded: Vec<Message>) {
        let pending: Vec<Message> = self
            .messages
            .drain(..)
            .filter(|m| !loaded.iter().any(|l| l.id == m.id))
            .collect();

        self.messages = loaded;
        if !pending.is_empty() {
            self.messages.extend(pending);
            self.messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        }
    }

    /// Advance the turn state machine and update the loading/error flags
    /// to match. `is_loading` and `is_error` are never both set.
    pub(crate) fn advance(&mut self, event: TurnEvent) -> Result<(), StateError> {
        let next = TurnStateMachine::transition(self.turn, event)?;

        match event {
            TurnEvent::Submit | TurnEvent::UserMessageFailed => {
                self.is_loading = false;
                self.is_error = false;
            }
            TurnEvent::UserMessagePersisted => self.is_loading = true,
            TurnEvent::GatewayReplied => {}
            TurnEvent::AssistantMessagePersisted => self.is_loading = false,
            TurnEvent::GatewayFailed | TurnEvent::AssistantMessageFailed => {
                self.is_loading = false;
                self.is_error = true;
            }
        }

        self.turn = next;
        Ok(())
    }

    /// Drop any in-flight turn back to Idle
    pub(crate) fn abandon_turn(&mut self) -> bool {
        if !self.turn.is_in_flight() {
            return false;
        }
        self.turn = TurnState::Idle;
        self.is_loading = false;
        true
    }
}
