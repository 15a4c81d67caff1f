use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::models::Message;

pub struct MessageService;

impl MessageService {
    /// Durably insert a message and return the full record. Successful
    /// completion is the caller's trigger to dispatch the message to the
    /// relay; membership was checked before this point.
    pub async fn append_message(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<Message, crate::error::AppError> {
        let id = Uuid::new_v4();
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, conversation_id, sender_id, content, is_read, created_at
            "#,
        )
        .bind(id)
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(db)
        .await?;

        Ok(message)
    }

    /// Full history for a conversation, oldest first.
    pub async fn list_messages(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
    ) -> Result<Vec<Message>, crate::error::AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, is_read, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;

        Ok(messages)
    }

    /// Mark every message sent to `user_id` in this conversation as read.
    /// Returns the number of rows updated.
    pub async fn mark_conversation_read(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, crate::error::AppError> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE \
             WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(db)
        .await?;

        Ok(result.rows_affected())
    }
}
