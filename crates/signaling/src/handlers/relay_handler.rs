//! Relay-Handler – ice-candidate

use callbridge_core::types::ConnectionId;
use callbridge_protocol::control::{IceCandidateRequest, ServerEvent};

use super::fehler_antwort;
use crate::server_state::SignalingState;

pub fn handle_ice_candidate(
    req: IceCandidateRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    let call_id = req.call_id;
    match state.mit_hub(|hub| hub.kandidat_weiterleiten(conn, req)) {
        Ok(anzahl) => {
            tracing::trace!(conn = %conn, call_id = %call_id, empfaenger = anzahl, "Kandidat weitergeleitet");
            None
        }
        Err(e) => fehler_antwort(e),
    }
}
