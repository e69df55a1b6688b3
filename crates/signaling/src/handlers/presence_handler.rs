//! Presence-Handler – register, update-status, heartbeat

use callbridge_core::types::ConnectionId;
use callbridge_protocol::control::{RegisterRequest, ServerEvent, UpdateStatusRequest};

use super::fehler_antwort;
use crate::server_state::SignalingState;

/// Verarbeitet `register`
///
/// Keine direkte Antwort; der Absender erhaelt die Online-Liste als
/// Roster-Abonnent.
pub fn handle_register(
    req: RegisterRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    let user_id = req.user_id.clone();
    match state.mit_hub(|hub| hub.registrieren(conn, req)) {
        Ok(()) => {
            tracing::debug!(conn = %conn, user_id = %user_id, "Registrierung verarbeitet");
            None
        }
        Err(e) => {
            tracing::warn!(conn = %conn, fehler = %e, "Registrierung abgewiesen");
            fehler_antwort(e)
        }
    }
}

/// Verarbeitet `update-status`
pub fn handle_update_status(
    req: UpdateStatusRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    let uebernommen = state.mit_hub(|hub| hub.status_aktualisieren(conn, req.status));
    tracing::trace!(conn = %conn, status = ?req.status, uebernommen, "Status-Anfrage");
    None
}

/// Verarbeitet `heartbeat`
pub fn handle_heartbeat(conn: ConnectionId, state: &SignalingState) -> Option<ServerEvent> {
    if !state.mit_hub(|hub| hub.lebenszeichen(conn)) {
        tracing::trace!(conn = %conn, "Heartbeat von nicht registrierter Verbindung");
    }
    None
}
