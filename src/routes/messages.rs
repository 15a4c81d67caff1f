use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::models::Message;
use crate::services::{
    conversation_service::ConversationService, message_service::MessageService,
};
use crate::state::AppState;

const MAX_CONTENT_LEN: usize = 500;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// POST /api/v1/conversations/:id/messages. The write path: validate,
/// check sender membership, persist, then hand the durable record to the
/// dispatcher. Delivery is best-effort and never fails the request once the
/// row is committed.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), crate::error::AppError> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(crate::error::AppError::BadRequest(
            "message content must not be empty".into(),
        ));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(crate::error::AppError::BadRequest(format!(
            "message content exceeds {MAX_CONTENT_LEN} characters"
        )));
    }

    if !ConversationService::is_member(&state.db, conversation_id, user_id).await? {
        return Err(crate::error::AppError::Forbidden);
    }

    let message =
        MessageService::append_message(&state.db, conversation_id, user_id, content).await?;

    match serde_json::to_string(&message) {
        Ok(serialized) => state.dispatcher.dispatch(conversation_id, &serialized).await,
        Err(e) => error!(%conversation_id, error = %e, "failed to serialize message for dispatch"),
    }

    Ok((StatusCode::CREATED, Json(message)))
}
