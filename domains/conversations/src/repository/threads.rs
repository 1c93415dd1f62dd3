//! Thread repository

use crate::domain::entities::Thread;
use parley_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ThreadRepository {
    pool: PgPool,
}

impl ThreadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List threads for a user, newest first
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Thread>> {
        let threads = sqlx::query_as::<_, Thread>(
            r#"
            SELECT id, user_id, title, created_at
            FROM threads
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(threads)
    }

    /// Create a new thread
    pub async fn create(&self, thread: &Thread) -> Result<Thread> {
        let created = sqlx::query_as::<_, Thread>(
            r#"
            INSERT INTO threads (id, user_id, title, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, title, created_at
            "#,
        )
        .bind(thread.id)
        .bind(thread.user_id)
        .bind(&thread.title)
        .bind(thread.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update thread title
    pub async fn rename(&self, id: Uuid, title: Option<String>) -> Result<Option<Thread>> {
        let updated = sqlx::query_as::<_, Thread>(
            r#"
            UPDATE threads SET title = $2
            WHERE id = $1
            RETURNING id, user_id, title, created_at
            "#,
        )
        .bind(id)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated)
    }

    /// Delete a thread; its messages go with it (ON DELETE CASCADE)
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM threads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
