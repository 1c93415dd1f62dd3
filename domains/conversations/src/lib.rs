//! Conversations domain: chat threads, messages, and the state manager
//! that drives each send/reply turn against the Remote Store and the
//! Inference Gateway.

pub mod domain;
pub mod manager;
pub mod repository;
pub mod session;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{Message, MessageRole, NewMessage, Thread, DEFAULT_THREAD_TITLE};
pub use domain::sections::{AnswerSections, AnswerView};
pub use domain::state::{StateError, TurnEvent, TurnState, TurnStateMachine};

// Re-export repository types
pub use repository::mock::{MockConversationStore, StoreOp};
pub use repository::{
    ConversationStore, ConversationsRepositories, MessageRepository, ThreadRepository,
};

pub use manager::{ConversationManager, TurnFailure, TurnOutcome};
pub use session::ConversationSession;
