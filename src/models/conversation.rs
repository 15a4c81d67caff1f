use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The counterparty of a direct conversation, as exposed to list/lookup
/// endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// One row of the conversation list: the other member plus the most recent
/// message, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPreview {
    pub conversation_id: Uuid,
    pub peer: Option<PeerUser>,
    pub last_message: Option<super::Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationPeer {
    pub conversation_id: Uuid,
    pub peer: PeerUser,
}
