use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderMap,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::auth;
use crate::state::AppState;
use crate::websocket::codec::{self, ControlFrame};
use crate::websocket::session::{Session, SessionCommand, SessionHandle};

/// The bearer credential rides on the connection itself, not in a frame:
/// primarily the `Sec-WebSocket-Protocol` header, with a standard
/// Authorization bearer as fallback.
fn extract_credential(headers: &HeaderMap) -> Option<String> {
    headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.strip_prefix("Bearer "))
                .map(|s| s.to_string())
        })
}

/// Upgrade-time entry point. The credential is verified before the upgrade
/// completes; on failure the connection is refused with no response frame
/// and no session state is retained.
pub async fn ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(credential) = extract_credential(&headers) else {
        warn!("websocket connection rejected: no credential presented");
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    };

    let user_id = match auth::authenticate(&credential, &state.config.jwt_secret) {
        Ok(user_id) => user_id,
        Err(_) => {
            warn!("websocket connection rejected: invalid credential");
            return axum::http::StatusCode::UNAUTHORIZED.into_response();
        }
    };

    // echo the subprotocol back when the credential was carried there, so
    // browser clients complete the handshake
    let used_protocol = headers.contains_key("sec-websocket-protocol");
    let ws = if used_protocol {
        ws.protocols([credential])
    } else {
        ws
    };

    ws.on_upgrade(move |socket| run_session(state, user_id, socket))
}

/// Drive one connection for its whole life: a single task multiplexing the
/// inbound frame stream and the session's command channel, so frames from
/// this client are processed strictly in arrival order.
async fn run_session(state: AppState, user_id: Uuid, socket: WebSocket) {
    let mut session = Session::accept();
    if session.begin_authentication().is_err() || session.authenticate(user_id).is_err() {
        return;
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<SessionCommand>();
    let handle = SessionHandle::new(session.id(), user_id, tx);
    state.registry.register(handle.clone()).await;
    debug!(session_id = %session.id(), %user_id, "websocket session open");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            maybe_cmd = rx.recv() => {
                match maybe_cmd {
                    Some(SessionCommand::Event(payload)) => {
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(SessionCommand::Ping) => {
                        if sink.send(Message::Ping(Vec::new())).await.is_err() {
                            break;
                        }
                    }
                    Some(SessionCommand::Close) | None => break,
                }
            }

            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_control_frame(&state, &mut session, &text).await;
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Ok(text) = String::from_utf8(bytes) {
                            handle_control_frame(&state, &mut session, &text).await;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        handle.set_alive(true);
                    }
                    // client pings are answered by the framework
                    Some(Ok(Message::Ping(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(session_id = %session.id(), error = %e, "websocket transport error");
                        break;
                    }
                }
            }
        }
    }

    session.begin_close();
    let _ = sink.send(Message::Close(None)).await;
    state.registry.remove_session(session.id()).await;
    session.finish_close();
    debug!(session_id = %session.id(), "websocket session closed");
}

/// Decode and apply one inbound control frame. Malformed or unrecognized
/// frames are dropped; the connection stays open.
async fn handle_control_frame(state: &AppState, session: &mut Session, text: &str) {
    match codec::decode_control(text) {
        Some(ControlFrame::Join { id }) => {
            if session.record_join(&id).is_ok() {
                state.registry.join(session.id(), &id).await;
            }
        }
        None => {
            debug!(session_id = %session.id(), "dropping undecodable frame");
        }
    }
}
