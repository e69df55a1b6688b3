//! Message-Dispatcher – Routet Client-Ereignisse an die richtigen Handler
//!
//! Der Dispatcher dekodiert eingehende Text-Frames, bestimmt den Handler
//! und gibt die direkte Antwort an den Absender zurueck. Ungueltige Frames
//! werden an der Grenze verworfen: Log auf `warn`, keine Zustandsaenderung,
//! die Verbindung bleibt offen.

use callbridge_core::types::ConnectionId;
use callbridge_protocol::control::{ClientEvent, ServerEvent};
use std::sync::Arc;

use crate::handlers::{call_handler, presence_handler, relay_handler};
use crate::server_state::SignalingState;

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Dekodiert einen Text-Frame und verarbeitet ihn
    ///
    /// Gibt `None` zurueck wenn keine direkte Antwort gesendet werden soll,
    /// auch bei ungueltigen Frames.
    pub fn text_verarbeiten(&self, text: &str, conn: ConnectionId) -> Option<ServerEvent> {
        match self.state.codec.decode(text) {
            Ok(ereignis) => self.dispatch(ereignis, conn),
            Err(e) => {
                tracing::warn!(conn = %conn, fehler = %e, "Ungueltiger Frame verworfen");
                None
            }
        }
    }

    /// Verarbeitet ein dekodiertes Client-Ereignis
    pub fn dispatch(&self, ereignis: ClientEvent, conn: ConnectionId) -> Option<ServerEvent> {
        tracing::debug!(conn = %conn, event = ereignis.name(), "Ereignis empfangen");
        let state = self.state.as_ref();

        match ereignis {
            // -------------------------------------------------------------------
            // Presence
            // -------------------------------------------------------------------
            ClientEvent::Register(req) => presence_handler::handle_register(req, conn, state),
            ClientEvent::UpdateStatus(req) => {
                presence_handler::handle_update_status(req, conn, state)
            }
            ClientEvent::Heartbeat => presence_handler::handle_heartbeat(conn, state),

            // -------------------------------------------------------------------
            // Anrufe
            // -------------------------------------------------------------------
            ClientEvent::InitiateCall(req) => call_handler::handle_initiate_call(req, conn, state),
            ClientEvent::AcceptCall(req) => call_handler::handle_accept_call(req, conn, state),
            ClientEvent::RejectCall(req) => call_handler::handle_reject_call(req, conn, state),
            ClientEvent::EndCall(req) => call_handler::handle_end_call(req, conn, state),

            // -------------------------------------------------------------------
            // Relay
            // -------------------------------------------------------------------
            ClientEvent::IceCandidate(req) => relay_handler::handle_ice_candidate(req, conn, state),
        }
    }

    /// Bereinigt alle Ressourcen einer Verbindung beim Trennen
    ///
    /// Mehrfache Aufrufe fuer dieselbe Verbindung sind harmlos.
    pub fn client_cleanup(&self, conn: ConnectionId) {
        let abgebaut = self.state.mit_hub(|hub| hub.verbindung_getrennt(conn));
        self.state.broadcaster.client_entfernen(&conn);

        tracing::debug!(conn = %conn, abgebaut, "Verbindungs-Ressourcen bereinigt");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::SignalingConfig;
    use callbridge_observability::CallbridgeMetrics;

    fn dispatcher() -> (MessageDispatcher, Arc<SignalingState>) {
        let state = SignalingState::neu(
            SignalingConfig::default(),
            CallbridgeMetrics::neu().unwrap(),
        );
        (MessageDispatcher::neu(Arc::clone(&state)), state)
    }

    #[test]
    fn ungueltiger_frame_ohne_antwort_und_ohne_aenderung() {
        let (dispatcher, state) = dispatcher();
        let conn = ConnectionId::new();
        assert!(dispatcher.text_verarbeiten("kein json", conn).is_none());
        assert!(dispatcher
            .text_verarbeiten(r#"{"event":"register","data":{"name":"ohne id"}}"#, conn)
            .is_none());
        assert_eq!(state.mit_hub(|hub| hub.online_anzahl()), 0);
    }

    #[test]
    fn initiate_vor_register_liefert_fehler() {
        let (dispatcher, _state) = dispatcher();
        let antwort = dispatcher.text_verarbeiten(
            r#"{"event":"initiate-call","data":{"targetUserId":"bob","offer":{}}}"#,
            ConnectionId::new(),
        );
        match antwort {
            Some(ServerEvent::CallError(e)) => assert_eq!(e.message, "Not registered"),
            anderes => panic!("Erwartet call-error, erhalten {anderes:?}"),
        }
    }

    #[test]
    fn register_hat_keine_direkte_antwort() {
        let (dispatcher, state) = dispatcher();
        let conn = ConnectionId::new();
        let _rx = state.broadcaster.client_registrieren(conn);

        let antwort = dispatcher.text_verarbeiten(
            r#"{"event":"register","data":{"userId":"alice","name":"Alice","languages":["en"]}}"#,
            conn,
        );
        assert!(antwort.is_none());
        assert_eq!(state.mit_hub(|hub| hub.online_anzahl()), 1);
    }

    #[test]
    fn cleanup_entfernt_verbindung() {
        let (dispatcher, state) = dispatcher();
        let conn = ConnectionId::new();
        let _rx = state.broadcaster.client_registrieren(conn);
        dispatcher.text_verarbeiten(
            r#"{"event":"register","data":{"userId":"alice","name":"Alice"}}"#,
            conn,
        );

        dispatcher.client_cleanup(conn);
        dispatcher.client_cleanup(conn);

        assert!(!state.broadcaster.ist_registriert(&conn));
        assert_eq!(state.mit_hub(|hub| hub.online_anzahl()), 0);
    }
}
