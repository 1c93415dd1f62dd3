//! State machine for a single chat turn
//!
//! Idle → UserMessagePersisting → AwaitingAssistantReply →
//! AssistantMessagePersisting → Idle, with every failure returning to Idle.

pub use parley_common::StateError;
use serde::{Deserialize, Serialize};

/// Turn states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    #[default]
    Idle,
    UserMessagePersisting,
    AwaitingAssistantReply,
    AssistantMessagePersisting,
}

impl TurnState {
    /// Whether a turn is in flight
    pub fn is_in_flight(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// Get all valid next states from current state
    pub fn valid_transitions(&self) -> &'static [TurnState] {
        match self {
            Self::Idle => &[Self::UserMessagePersisting],
            Self::UserMessagePersisting => &[Self::AwaitingAssistantReply, Self::Idle],
            Self::AwaitingAssistantReply => &[Self::AssistantMessagePersisting, Self::Idle],
            Self::AssistantMessagePersisting => &[Self::Idle],
        }
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::UserMessagePersisting => write!(f, "user_message_persisting"),
            Self::AwaitingAssistantReply => write!(f, "awaiting_assistant_reply"),
            Self::AssistantMessagePersisting => write!(f, "assistant_message_persisting"),
        }
    }
}

/// Events that drive a turn
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnEvent {
    /// User submitted nonblank text
    Submit,
    /// User message stored
    UserMessagePersisted,
    /// User message write failed
    UserMessageFailed,
    /// Gateway answered
    GatewayReplied,
    /// Gateway call failed
    GatewayFailed,
    /// Assistant message stored
    AssistantMessagePersisted,
    /// Assistant message write failed
    AssistantMessageFailed,
}

impl std::fmt::Display for TurnEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit => write!(f, "submit"),
            Self::UserMessagePersisted => write!(f, "user_message_persisted"),
            Self::UserMessageFailed => write!(f, "user_message_failed"),
            Self::GatewayReplied => write!(f, "gateway_replied"),
            Self::GatewayFailed => write!(f, "gateway_failed"),
            Self::AssistantMessagePersisted => write!(f, "assistant_message_persisted"),
            Self::AssistantMessageFailed => write!(f, "assistant_message_failed"),
        }
    }
}

/// Turn state machine
pub struct TurnStateMachine;

impl TurnStateMachine {
    /// Attempt a state transition
    pub fn transition(current: TurnState, event: TurnEvent) -> Result<TurnState, StateError> {
        let next = match (&current, &event) {
            (TurnState::Idle, TurnEvent::Submit) => TurnState::UserMessagePersisting,
            (TurnState::UserMessagePersisting, TurnEvent::UserMessagePersisted) => {
                TurnState::AwaitingAssistantReply
            }
            (TurnState::UserMessagePersisting, TurnEvent::UserMessageFailed) => TurnState::Idle,
            (TurnState::AwaitingAssistantReply, TurnEvent::GatewayReplied) => {
                TurnState::AssistantMessagePersisting
            }
            (TurnState::AwaitingAssistantReply, TurnEvent::GatewayFailed) => TurnState::Idle,
            (TurnState::AssistantMessagePersisting, TurnEvent::AssistantMessagePersisted)
            | (TurnState::AssistantMessagePersisting, TurnEvent::AssistantMessageFailed) => {
                TurnState::Idle
            }
            _ => {
                return Err(StateError::InvalidTransition {
                    from: current.to_string(),
                    event: event.to_string(),
                });
            }
        };

        Ok(next)
    }
}
