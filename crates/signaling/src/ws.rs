//! WebSocket-Endpunkt des Signaling-Service
//!
//! `GET /ws` nimmt das Upgrade an und startet pro Verbindung eine
//! `ClientConnection`. Der Verbindungs-Slot wird schon im HTTP-Handler
//! reserviert und lebt bis zum Ende des Verbindungs-Tasks. Ist kein Slot
//! frei, wird das Upgrade mit HTTP 503 abgelehnt.

use axum::{
    extract::{ConnectInfo, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

#[derive(Clone)]
struct WsState {
    signaling: Arc<SignalingState>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Router fuer den WebSocket-Endpunkt
///
/// Der Server muss mit `into_make_service_with_connect_info::<SocketAddr>()`
/// gestartet werden.
pub fn signaling_router(state: Arc<SignalingState>, shutdown_rx: watch::Receiver<bool>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade_handler))
        .with_state(WsState {
            signaling: state,
            shutdown_rx,
        })
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(ws_state): State<WsState>,
) -> Response {
    let WsState {
        signaling,
        shutdown_rx,
    } = ws_state;

    let Some(slot) = signaling.slot_reservieren() else {
        tracing::warn!(
            peer = %addr,
            max_clients = signaling.config.max_clients,
            "Verbindungslimit erreicht, Upgrade abgelehnt"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Server full").into_response();
    };

    // Harte Grenze im Transport; zu grosse Ereignisse lehnt der FrameCodec
    // ab ohne die Verbindung zu schliessen
    let harte_grenze = signaling.config.max_frame_bytes.saturating_mul(4);
    ws.max_message_size(harte_grenze)
        .max_frame_size(harte_grenze)
        .on_upgrade(move |socket| async move {
            ClientConnection::neu(signaling, addr, slot)
                .verarbeiten(socket, shutdown_rx)
                .await
        })
}
