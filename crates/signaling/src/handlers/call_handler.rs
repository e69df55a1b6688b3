//! Call-Handler – initiate-call, accept-call, reject-call, end-call
//!
//! Nur `initiate-call` hat eine direkte Antwort (`call-initiated`). Alle
//! anderen Ereignisse erreichen die Gegenseite ueber den Broadcaster.
//! Fehler werden als `call-error` an den Absender gemeldet, unbekannte
//! Anrufe sind stille No-ops.

use callbridge_core::types::ConnectionId;
use callbridge_protocol::control::{
    AcceptCallRequest, CallInitiated, EndCallRequest, InitiateCallRequest, RejectCallRequest,
    ServerEvent,
};

use super::fehler_antwort;
use crate::server_state::SignalingState;

pub fn handle_initiate_call(
    req: InitiateCallRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    match state.mit_hub(|hub| hub.anruf_starten(conn, req)) {
        Ok(call_id) => Some(ServerEvent::CallInitiated(CallInitiated { call_id })),
        Err(e) => fehler_antwort(e),
    }
}

pub fn handle_accept_call(
    req: AcceptCallRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    match state.mit_hub(|hub| hub.anruf_annehmen(conn, req)) {
        Ok(_) => None,
        Err(e) => fehler_antwort(e),
    }
}

pub fn handle_reject_call(
    req: RejectCallRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    match state.mit_hub(|hub| hub.anruf_ablehnen(conn, req)) {
        Ok(_) => None,
        Err(e) => fehler_antwort(e),
    }
}

pub fn handle_end_call(
    req: EndCallRequest,
    conn: ConnectionId,
    state: &SignalingState,
) -> Option<ServerEvent> {
    match state.mit_hub(|hub| hub.anruf_beenden(conn, req)) {
        Ok(_) => None,
        Err(e) => fehler_antwort(e),
    }
}
