//! Remote Store access for the Conversations domain
//!
//! [`ConversationStore`] is the seam the state manager talks through.
//! [`ConversationsRepositories`] implements it over PostgreSQL;
//! [`MockConversationStore`] keeps everything in memory.

pub mod messages;
pub mod mock;
pub mod threads;

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entities::{Message, NewMessage, Thread};
use parley_common::Result;

pub use messages::MessageRepository;
pub use mock::MockConversationStore;
pub use threads::ThreadRepository;

/// Create/read/update/delete over the Threads and Messages collections
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Threads owned by `user_id`, newest first
    async fn list_threads(&self, user_id: Uuid) -> Result<Vec<Thread>>;

    async fn create_thread(&self, thread: &Thread) -> Result<Thread>;

    /// `None` when the thread does not exist
    async fn rename_thread(&self, id: Uuid, title: Option<String>) -> Result<Option<Thread>>;

    /// Deletes the thread and all of its messages; `false` when it did not exist
    async fn delete_thread(&self, id: Uuid) -> Result<bool>;

    /// Messages of a thread, oldest first
    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>>;

    /// Persist a message; the store assigns `id` and `created_at`
    async fn insert_message(&self, message: &NewMessage) -> Result<Message>;
}

/// Combined repository access for the Conversations domain
#[derive(Clone)]
pub struct ConversationsRepositories {
    pub threads: ThreadRepository,
    pub messages: MessageRepository,
}

impl ConversationsRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            threads: ThreadRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl ConversationStore for ConversationsRepositories {
    async fn list_threads(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        self.threads.list_by_user(user_id).await
    }

    async fn create_thread(&self, thread: &Thread) -> Result<Thread> {
        self.threads.create(thread).await
    }

    async fn rename_thread(&self, id: Uuid, title: Option<String>) -> Result<Option<Thread>> {
        self.threads.rename(id, title).await
    }

    async fn delete_thread(&self, id: Uuid) -> Result<bool> {
        self.threads.delete(id).await
    }

    async fn list_messages(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        self.messages.list_by_thread(thread_id).await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        self.messages.create(message).await
    }
}
