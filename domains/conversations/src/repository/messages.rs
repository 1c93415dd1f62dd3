//! Message repository

use crate::domain::entities::{Message, NewMessage};
use parley_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List messages for a thread, ordered by created_at ASC
    pub async fn list_by_thread(&self, thread_id: Uuid) -> Result<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, thread_id, user_id, role, content, created_at
            FROM messages
            WHERE thread_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    /// Insert a message; id and created_at come from column defaults
    pub async fn create(&self, msg: &NewMessage) -> Result<Message> {
        let created = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (thread_id, user_id, role, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, thread_id, user_id, role, content, created_at
            "#,
        )
        .bind(msg.thread_id)
        .bind(msg.user_id)
        .bind(msg.role)
        .bind(&msg.content)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
