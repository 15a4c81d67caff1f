pub mod conversation;
pub mod message;

pub use conversation::{ConversationPeer, ConversationPreview, PeerUser};
pub use message::Message;
