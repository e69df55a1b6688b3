//! Handler fuer alle Client-Ereignisse
//!
//! Jeder Handler ist fuer eine Gruppe von Ereignissen zustaendig und
//! arbeitet ueber `SignalingState::mit_hub` auf dem gemeinsamen Zustand.
//! Rueckgabe ist die direkte Antwort an den Absender, falls es eine gibt.

pub mod call_handler;
pub mod presence_handler;
pub mod relay_handler;

use callbridge_protocol::control::ServerEvent;

use crate::error::SignalingError;

/// Wandelt einen Fehler in die `call-error`-Antwort an den Absender
pub(crate) fn fehler_antwort(fehler: SignalingError) -> Option<ServerEvent> {
    Some(ServerEvent::error(fehler.client_nachricht()))
}
