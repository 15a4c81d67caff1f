use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::models::{ConversationPeer, ConversationPreview, Message, PeerUser};

/// Conversation Directory: owns conversations and their membership truth.
/// The relay consults it on the write path only; room subscription never
/// goes through here.
pub struct ConversationService;

impl ConversationService {
    /// Find the direct conversation between two users, creating it (with
    /// both members) when none exists yet.
    pub async fn find_or_create_direct(
        db: &Pool<Postgres>,
        user_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<Uuid, crate::error::AppError> {
        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT c.id
            FROM conversations c
            JOIN conversation_members a ON a.conversation_id = c.id AND a.user_id = $1
            JOIN conversation_members b ON b.conversation_id = c.id AND b.user_id = $2
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(other_user_id)
        .fetch_optional(db)
        .await?;

        if let Some(id) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4();
        let mut tx = db.begin().await?;
        sqlx::query("INSERT INTO conversations (id) VALUES ($1)")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO conversation_members (conversation_id, user_id) \
             VALUES ($1, $2), ($1, $3) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(user_id)
        .bind(other_user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(id)
    }

    /// List all conversations for a user, most recent first, each with the
    /// other member and a last-message preview.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> Result<Vec<ConversationPreview>, crate::error::AppError> {
        let rows = sqlx::query(
            r#"
            SELECT
              c.id AS conversation_id,
              u.id AS peer_id, u.username AS peer_username, u.email AS peer_email,
              m.id AS msg_id, m.sender_id AS msg_sender_id, m.content AS msg_content,
              m.is_read AS msg_is_read, m.created_at AS msg_created_at
            FROM conversations c
            JOIN conversation_members cm ON cm.conversation_id = c.id AND cm.user_id = $1
            LEFT JOIN conversation_members other
              ON other.conversation_id = c.id AND other.user_id <> $1
            LEFT JOIN users u ON u.id = other.user_id
            LEFT JOIN LATERAL (
              SELECT id, sender_id, content, is_read, created_at
              FROM messages
              WHERE conversation_id = c.id
              ORDER BY created_at DESC
              LIMIT 1
            ) m ON TRUE
            ORDER BY c.created_at DESC
            LIMIT 100
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;

        let previews = rows
            .into_iter()
            .map(|row| {
                let conversation_id: Uuid = row.get("conversation_id");
                let peer = row
                    .try_get::<Uuid, _>("peer_id")
                    .ok()
                    .map(|id| PeerUser {
                        id,
                        username: row.get("peer_username"),
                        email: row.get("peer_email"),
                    });
                let last_message = row.try_get::<Uuid, _>("msg_id").ok().map(|id| Message {
                    id,
                    conversation_id,
                    sender_id: row.get("msg_sender_id"),
                    content: row.get("msg_content"),
                    is_read: row.get("msg_is_read"),
                    created_at: row.get("msg_created_at"),
                });
                ConversationPreview {
                    conversation_id,
                    peer,
                    last_message,
                }
            })
            .collect();

        Ok(previews)
    }

    pub async fn is_member(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, crate::error::AppError> {
        let rec = sqlx::query(
            "SELECT 1 FROM conversation_members WHERE conversation_id=$1 AND user_id=$2 LIMIT 1",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(rec.is_some())
    }

    /// Look up a conversation and its other member.
    /// Returns NotFound for an unknown id and Forbidden when the requesting
    /// user is not a member.
    pub async fn get_with_peer(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> Result<ConversationPeer, crate::error::AppError> {
        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM conversations WHERE id = $1")
                .bind(conversation_id)
                .fetch_optional(db)
                .await?;
        if exists.is_none() {
            return Err(crate::error::AppError::NotFound);
        }

        if !Self::is_member(db, conversation_id, user_id).await? {
            return Err(crate::error::AppError::Forbidden);
        }

        let row = sqlx::query(
            r#"
            SELECT u.id, u.username, u.email
            FROM conversation_members cm
            JOIN users u ON u.id = cm.user_id
            WHERE cm.conversation_id = $1 AND cm.user_id <> $2
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(crate::error::AppError::Internal)?;

        Ok(ConversationPeer {
            conversation_id,
            peer: PeerUser {
                id: row.get("id"),
                username: row.get("username"),
                email: row.get("email"),
            },
        })
    }
}
