use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

pub mod codec;
pub mod dispatch;
pub mod handlers;
pub mod heartbeat;
pub mod session;

use session::{SessionCommand, SessionHandle};

#[derive(Default)]
struct RegistryInner {
    /// Every open, authenticated session.
    sessions: HashMap<Uuid, SessionHandle>,
    /// room key -> member session ids. Absent room == empty room.
    rooms: HashMap<String, HashSet<Uuid>>,
    /// session id -> the one room it currently occupies.
    joined: HashMap<Uuid, String>,
}

/// Shared room table: conversation id (an opaque string key) to the set of
/// sessions subscribed to it. Constructed once at server start and handed by
/// reference to the accept handler, the dispatcher, and the liveness monitor.
///
/// One lock guards the whole table; every membership mutation is a single
/// critical section, so concurrent join/leave/broadcast cannot corrupt a
/// member set or double-remove a session.
#[derive(Default, Clone)]
pub struct RoomRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly authenticated session.
    pub async fn register(&self, handle: SessionHandle) {
        let mut guard = self.inner.write().await;
        guard.sessions.insert(handle.id, handle);
    }

    /// Subscribe a session to a room, creating the room on first join.
    /// A session occupies at most one room: joining a different room first
    /// removes it from the previous one, atomically under the table lock.
    /// Re-joining the current room is a no-op. The key is trusted as-is;
    /// there is no existence check against the conversation store.
    pub async fn join(&self, session_id: Uuid, room_key: &str) {
        let mut guard = self.inner.write().await;
        if !guard.sessions.contains_key(&session_id) {
            return;
        }

        if let Some(previous) = guard.joined.get(&session_id).cloned() {
            if previous == room_key {
                return;
            }
            Self::remove_from_room(&mut guard, &previous, session_id);
        }

        guard
            .rooms
            .entry(room_key.to_string())
            .or_default()
            .insert(session_id);
        guard.joined.insert(session_id, room_key.to_string());

        let room_size = guard.rooms.get(room_key).map(|m| m.len()).unwrap_or(0);
        tracing::debug!(%session_id, room = %room_key, room_size, "session joined room");
    }

    /// Remove a session from whatever room it occupies, if any.
    pub async fn leave(&self, session_id: Uuid) {
        let mut guard = self.inner.write().await;
        if let Some(room) = guard.joined.remove(&session_id) {
            Self::remove_from_room(&mut guard, &room, session_id);
            tracing::debug!(%session_id, room = %room, "session left room");
        }
    }

    /// Destroy a session: leave its room and drop the handle. Safe to call
    /// from concurrent close paths; only the first call finds anything to
    /// remove.
    pub async fn remove_session(&self, session_id: Uuid) {
        let mut guard = self.inner.write().await;
        if guard.sessions.remove(&session_id).is_none() {
            return;
        }
        if let Some(room) = guard.joined.remove(&session_id) {
            Self::remove_from_room(&mut guard, &room, session_id);
        }
        tracing::debug!(%session_id, "session removed");
    }

    /// Best-effort fan-out of one payload to every session in the room, in
    /// arbitrary order. A failed send to one session never blocks the rest;
    /// an empty or absent room is a silent no-op.
    pub async fn broadcast(&self, room_key: &str, payload: &str) {
        let guard = self.inner.read().await;
        let Some(members) = guard.rooms.get(room_key) else {
            return;
        };

        for session_id in members {
            if let Some(handle) = guard.sessions.get(session_id) {
                if !handle.send(SessionCommand::Event(payload.to_string())) {
                    tracing::warn!(%session_id, room = %room_key, "failed to push event to session (likely closed)");
                }
            }
        }
    }

    /// Snapshot of all open sessions, for the liveness monitor's probe
    /// cycle.
    pub async fn sessions(&self) -> Vec<SessionHandle> {
        let guard = self.inner.read().await;
        guard.sessions.values().cloned().collect()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn room_size(&self, room_key: &str) -> usize {
        let guard = self.inner.read().await;
        guard.rooms.get(room_key).map(|m| m.len()).unwrap_or(0)
    }

    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }

    fn remove_from_room(inner: &mut RegistryInner, room: &str, session_id: Uuid) {
        if let Some(members) = inner.rooms.get_mut(room) {
            members.remove(&session_id);
            if members.is_empty() {
                inner.rooms.remove(room);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn handle() -> (SessionHandle, mpsc::UnboundedReceiver<SessionCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionHandle::new(Uuid::new_v4(), Uuid::new_v4(), tx), rx)
    }

    async fn registered(
        registry: &RoomRegistry,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionCommand>) {
        let (h, rx) = handle();
        registry.register(h.clone()).await;
        (h, rx)
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let (h, _rx) = registered(&registry).await;

        registry.join(h.id, "conv-1").await;
        registry.join(h.id, "conv-1").await;

        assert_eq!(registry.room_size("conv-1").await, 1);
    }

    #[tokio::test]
    async fn session_occupies_at_most_one_room() {
        let registry = RoomRegistry::new();
        let (h, _rx) = registered(&registry).await;

        registry.join(h.id, "conv-1").await;
        registry.join(h.id, "conv-2").await;

        assert_eq!(registry.room_size("conv-1").await, 0);
        assert_eq!(registry.room_size("conv-2").await, 1);
        // the emptied room is dropped from the table
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn join_is_not_membership_checked() {
        // The registry trusts the join frame's key: any authenticated
        // session may subscribe to any room id, including ones that do not
        // exist in the conversation store.
        let registry = RoomRegistry::new();
        let (h, _rx) = registered(&registry).await;

        registry.join(h.id, "no-such-conversation").await;
        assert_eq!(registry.room_size("no-such-conversation").await, 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_target_room() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a) = registered(&registry).await;
        let (b, mut rx_b) = registered(&registry).await;
        let (c, mut rx_c) = registered(&registry).await;

        registry.join(a.id, "conv-1").await;
        registry.join(b.id, "conv-1").await;
        registry.join(c.id, "conv-2").await;

        registry.broadcast("conv-1", "payload").await;

        assert_eq!(
            rx_a.try_recv().unwrap(),
            SessionCommand::Event("payload".into())
        );
        assert_eq!(
            rx_b.try_recv().unwrap(),
            SessionCommand::Event("payload".into())
        );
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_is_a_noop() {
        let registry = RoomRegistry::new();
        registry.broadcast("conv-nobody", "payload").await;
    }

    #[tokio::test]
    async fn broadcast_survives_a_dead_subscriber() {
        let registry = RoomRegistry::new();
        let (dead, rx_dead) = registered(&registry).await;
        let (live, mut rx_live) = registered(&registry).await;

        registry.join(dead.id, "conv-1").await;
        registry.join(live.id, "conv-1").await;

        drop(rx_dead);
        registry.broadcast("conv-1", "payload").await;

        assert_eq!(
            rx_live.try_recv().unwrap(),
            SessionCommand::Event("payload".into())
        );
    }

    #[tokio::test]
    async fn remove_session_is_exactly_once() {
        let registry = RoomRegistry::new();
        let (h, _rx) = registered(&registry).await;
        registry.join(h.id, "conv-1").await;

        // concurrent close paths (transport error + liveness timeout) both
        // call remove; the second finds nothing
        registry.remove_session(h.id).await;
        registry.remove_session(h.id).await;

        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.room_size("conv-1").await, 0);
    }

    #[tokio::test]
    async fn leave_without_room_is_a_noop() {
        let registry = RoomRegistry::new();
        let (h, _rx) = registered(&registry).await;
        registry.leave(h.id).await;
        assert_eq!(registry.session_count().await, 1);
    }

    #[tokio::test]
    async fn join_unknown_session_is_ignored() {
        let registry = RoomRegistry::new();
        registry.join(Uuid::new_v4(), "conv-1").await;
        assert_eq!(registry.room_size("conv-1").await, 0);
    }
}
