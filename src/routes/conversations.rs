use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{ConversationPeer, ConversationPreview, Message};
use crate::services::{
    conversation_service::ConversationService, message_service::MessageService,
};
use crate::state::AppState;

/// GET /api/v1/conversations: every conversation the caller belongs to,
/// most recent first, with peer and last-message preview.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<ConversationPreview>>, crate::error::AppError> {
    let conversations = ConversationService::list_for_user(&state.db, user_id).await?;
    Ok(Json(conversations))
}

#[derive(Serialize)]
pub struct ConversationIdResponse {
    pub id: Uuid,
}

/// GET /api/v1/conversations/with/:user_id: the direct conversation with
/// that user, created on first contact.
pub async fn find_or_create_with_user(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(other_user_id): Path<Uuid>,
) -> Result<Json<ConversationIdResponse>, crate::error::AppError> {
    if other_user_id == user_id {
        return Err(crate::error::AppError::BadRequest(
            "cannot open a conversation with yourself".into(),
        ));
    }
    let id = ConversationService::find_or_create_direct(&state.db, user_id, other_user_id).await?;
    Ok(Json(ConversationIdResponse { id }))
}

/// GET /api/v1/conversations/:id: existence and membership check, plus the
/// other member's identity.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<ConversationPeer>, crate::error::AppError> {
    let conversation =
        ConversationService::get_with_peer(&state.db, conversation_id, user_id).await?;
    Ok(Json(conversation))
}

/// GET /api/v1/conversations/:id/messages: full history, oldest first.
/// Members only; this is the read path disconnected clients use to catch up.
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, crate::error::AppError> {
    if !ConversationService::is_member(&state.db, conversation_id, user_id).await? {
        return Err(crate::error::AppError::Forbidden);
    }
    let messages = MessageService::list_messages(&state.db, conversation_id).await?;
    Ok(Json(messages))
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub updated: u64,
}

/// POST /api/v1/conversations/:id/read: mark the counterparty's messages
/// as read.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(user_id): Extension<Uuid>,
    Path(conversation_id): Path<Uuid>,
) -> Result<Json<MarkReadResponse>, crate::error::AppError> {
    if !ConversationService::is_member(&state.db, conversation_id, user_id).await? {
        return Err(crate::error::AppError::Forbidden);
    }
    let updated =
        MessageService::mark_conversation_read(&state.db, conversation_id, user_id).await?;
    Ok(Json(MarkReadResponse { updated }))
}
