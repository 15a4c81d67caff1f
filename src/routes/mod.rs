use crate::state::AppState;
use axum::middleware;
use axum::{
    routing::{get, post},
    Router,
};

pub mod conversations;
use conversations::{
    find_or_create_with_user, get_conversation, list_conversations, list_messages, mark_read,
};
pub mod messages;
use messages::send_message;

use crate::websocket::handlers::ws_handler;

pub fn build_router(state: AppState) -> Router {
    // Service introspection (public, no auth)
    let introspection = Router::new().route("/health", get(|| async { "OK" }));

    // REST surface: bearer JWT required on every route
    let api_v1 = Router::new()
        .route("/conversations", get(list_conversations))
        .route("/conversations/with/:user_id", get(find_or_create_with_user))
        .route("/conversations/:id", get(get_conversation))
        .route("/conversations/:id/messages", get(list_messages))
        .route("/conversations/:id/messages", post(send_message))
        .route("/conversations/:id/read", post(mark_read))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // The relay authenticates at upgrade time (credential rides on the
    // connection, not in an Authorization header), so it sits outside the
    // bearer layer.
    let relay = Router::new().route("/ws", get(ws_handler));

    let router = introspection.merge(Router::new().nest("/api/v1", api_v1.merge(relay)));

    crate::middleware::with_defaults(router).with_state(state)
}
