use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Command delivered to a session's socket task over its channel. Everything
/// that reaches the transport goes through here, so ordering within one
/// connection is the channel's ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Push a serialized event frame to the client.
    Event(String),
    /// Liveness probe; the socket task turns this into a transport ping.
    Ping,
    /// Terminate the connection.
    Close,
}

/// Lifecycle of one connection. A session object is never reused; `Closed`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Authenticating,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is {0:?}, expected {1:?}")]
    InvalidState(SessionState, SessionState),
    #[error("session already authenticated")]
    AlreadyAuthenticated,
}

/// Per-connection state machine, driven by the socket task. Kept free of any
/// transport handle so tests can walk the transitions directly.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    user_id: Option<Uuid>,
    joined_room: Option<String>,
}

impl Session {
    /// A freshly accepted connection, before any application frame.
    pub fn accept() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Connecting,
            user_id: None,
            joined_room: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user_id
    }

    pub fn joined_room(&self) -> Option<&str> {
        self.joined_room.as_deref()
    }

    /// Transport accepted; the connection-level credential is now examined.
    pub fn begin_authentication(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Connecting {
            return Err(SessionError::InvalidState(
                self.state,
                SessionState::Connecting,
            ));
        }
        self.state = SessionState::Authenticating;
        Ok(())
    }

    /// Credential verified. Sets the user id exactly once; a second call is
    /// an error and leaves the session untouched.
    pub fn authenticate(&mut self, user_id: Uuid) -> Result<(), SessionError> {
        if self.user_id.is_some() {
            return Err(SessionError::AlreadyAuthenticated);
        }
        if self.state != SessionState::Authenticating {
            return Err(SessionError::InvalidState(
                self.state,
                SessionState::Authenticating,
            ));
        }
        self.user_id = Some(user_id);
        self.state = SessionState::Open;
        Ok(())
    }

    /// Record the room this session subscribed to. A later join replaces the
    /// previous room; the registry does the actual membership move.
    pub fn record_join(&mut self, room: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Open {
            return Err(SessionError::InvalidState(self.state, SessionState::Open));
        }
        self.joined_room = Some(room.to_string());
        Ok(())
    }

    /// Close requested (transport close, error, or liveness timeout).
    /// Idempotent once closing has started.
    pub fn begin_close(&mut self) {
        if matches!(self.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Closing;
    }

    /// Rooms have been left and the transport is gone.
    pub fn finish_close(&mut self) {
        self.state = SessionState::Closed;
        self.joined_room = None;
    }
}

/// Shared handle to a live session, held by the registry. The socket task
/// owns the receiving end of `sender`; `alive` is flipped by the liveness
/// monitor and the task's pong handling.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub user_id: Uuid,
    pub sender: UnboundedSender<SessionCommand>,
    pub alive: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn new(id: Uuid, user_id: Uuid, sender: UnboundedSender<SessionCommand>) -> Self {
        Self {
            id,
            user_id,
            sender,
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Best-effort send; a closed channel means the socket task already
    /// exited and the registry will reap the handle.
    pub fn send(&self, cmd: SessionCommand) -> bool {
        self.sender.send(cmd).is_ok()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_session() -> Session {
        let mut session = Session::accept();
        session.begin_authentication().unwrap();
        session.authenticate(Uuid::new_v4()).unwrap();
        session
    }

    #[test]
    fn walks_the_happy_path() {
        let mut session = Session::accept();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.user_id(), None);

        session.begin_authentication().unwrap();
        assert_eq!(session.state(), SessionState::Authenticating);

        let user = Uuid::new_v4();
        session.authenticate(user).unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(session.user_id(), Some(user));

        session.begin_close();
        assert_eq!(session.state(), SessionState::Closing);
        session.finish_close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn authentication_succeeds_exactly_once() {
        let mut session = open_session();
        let original = session.user_id().unwrap();

        let err = session.authenticate(Uuid::new_v4()).unwrap_err();
        assert_eq!(err, SessionError::AlreadyAuthenticated);
        // user id is immutable for the session's lifetime
        assert_eq!(session.user_id(), Some(original));
    }

    #[test]
    fn frames_are_rejected_before_open() {
        let mut session = Session::accept();
        assert!(session.record_join("conv-1").is_err());

        session.begin_authentication().unwrap();
        assert!(session.record_join("conv-1").is_err());
    }

    #[test]
    fn rejoin_replaces_previous_room() {
        let mut session = open_session();
        session.record_join("conv-1").unwrap();
        session.record_join("conv-2").unwrap();
        assert_eq!(session.joined_room(), Some("conv-2"));
    }

    #[test]
    fn close_is_terminal_and_idempotent() {
        let mut session = open_session();
        session.record_join("conv-1").unwrap();

        session.begin_close();
        session.begin_close();
        session.finish_close();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.joined_room(), None);
        assert!(session.record_join("conv-1").is_err());
    }
}
