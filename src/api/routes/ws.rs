//! WebSocket upgrade entrypoint.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;

use crate::api::server::AppState;
use crate::session::Session;

/// `GET /ws` — upgrade to the pub/sub session protocol.
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        Session::new(state.broker, state.heartbeat_interval, state.shutdown_rx)
            .run(socket)
            .await;
    })
}
