//! Repositories for `chat_sessions` and `chat_messages`.

use mergedesk_core::types::DbId;
use sqlx::PgPool;

use crate::models::chat::{ChatMessage, ChatSession, CreateChatMessage};

const SESSION_COLUMNS: &str = "id, user_id, title, created_at, updated_at";
const MESSAGE_COLUMNS: &str = "id, session_id, role, content, message_metadata, created_at";

/// Chat sessions, scoped to their owning user.
pub struct ChatSessionRepo;

impl ChatSessionRepo {
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        title: Option<&str>,
    ) -> Result<ChatSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_sessions (user_id, title) VALUES ($1, $2) RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(user_id)
            .bind(title)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        user_id: DbId,
        id: DbId,
    ) -> Result<Option<ChatSession>, sqlx::Error> {
        let query =
            format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2");
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List the user's sessions, most recently active first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<ChatSession>, sqlx::Error> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = $1 ORDER BY updated_at DESC"
        );
        sqlx::query_as::<_, ChatSession>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Bump `updated_at` after new messages land.
    pub async fn touch(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE chat_sessions SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete a session and, by cascade, its messages.
    pub async fn delete(pool: &PgPool, user_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Messages within a session. Callers check session ownership first.
pub struct ChatMessageRepo;

impl ChatMessageRepo {
    pub async fn create(pool: &PgPool, input: &CreateChatMessage) -> Result<ChatMessage, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_messages (session_id, role, content, message_metadata)
             VALUES ($1, $2, $3, $4)
             RETURNING {MESSAGE_COLUMNS}"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(input.session_id)
            .bind(input.role.as_str())
            .bind(&input.content)
            .bind(&input.message_metadata)
            .fetch_one(pool)
            .await
    }

    /// Messages of a session in chronological order.
    pub async fn list_for_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages
             WHERE session_id = $1
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }

    /// The most recent `limit` messages of a session, returned oldest first.
    pub async fn list_recent(
        pool: &PgPool,
        session_id: DbId,
        limit: i64,
    ) -> Result<Vec<ChatMessage>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM (
                SELECT {MESSAGE_COLUMNS} FROM chat_messages
                WHERE session_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
             ) recent
             ORDER BY created_at ASC, id ASC"
        );
        sqlx::query_as::<_, ChatMessage>(&query)
            .bind(session_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
