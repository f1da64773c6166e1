// HTTP/WebSocket transport binding. Deliberately thin: the Hub and Game
// trait never name an `axum` type, only this module does. Grounded in the
// teacher's `interface_adapters/net.rs::ws_handler` and
// `frameworks/server.rs::run` route wiring.

use std::sync::Arc;

use axum::{
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::interface_adapters::connection::handle_socket;
use crate::interface_adapters::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub.clone()))
}

async fn healthz() -> &'static str {
    "ok"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}
