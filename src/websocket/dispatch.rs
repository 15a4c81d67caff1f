use uuid::Uuid;

use super::codec;
use super::RoomRegistry;

/// Bridge between the message write path and the relay. Invoked right after
/// a message is durably persisted; delivery is best-effort and never affects
/// the already-committed write.
#[derive(Clone)]
pub struct MessageDispatcher {
    registry: RoomRegistry,
}

impl MessageDispatcher {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    /// Fan the serialized message out to every session subscribed to the
    /// conversation's room.
    pub async fn dispatch(&self, conversation_id: Uuid, serialized_message: &str) {
        let envelope = codec::new_message_envelope(serialized_message);
        self.registry
            .broadcast(&conversation_id.to_string(), &envelope)
            .await;
        tracing::debug!(%conversation_id, "dispatched message to room");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::session::{SessionCommand, SessionHandle};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn dispatch_delivers_envelope_to_subscribers_only() {
        let registry = RoomRegistry::new();
        let conversation_id = Uuid::new_v4();

        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let a = SessionHandle::new(Uuid::new_v4(), Uuid::new_v4(), tx_a);
        registry.register(a.clone()).await;
        registry.join(a.id, &conversation_id.to_string()).await;

        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let b = SessionHandle::new(Uuid::new_v4(), Uuid::new_v4(), tx_b);
        registry.register(b.clone()).await;
        registry.join(b.id, "some-other-room").await;

        let dispatcher = MessageDispatcher::new(registry);
        dispatcher
            .dispatch(conversation_id, r#"{"content":"hi"}"#)
            .await;

        let SessionCommand::Event(frame) = rx_a.try_recv().unwrap() else {
            panic!("expected an event frame");
        };
        let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed["event"], "newMessage");
        assert_eq!(parsed["message"]["content"], "hi");

        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dispatch_to_unjoined_conversation_is_a_noop() {
        let dispatcher = MessageDispatcher::new(RoomRegistry::new());
        dispatcher.dispatch(Uuid::new_v4(), r#"{"content":"hi"}"#).await;
    }
}
