//! Candidate-Relay – Weiterleitung von Verbindungskandidaten
//!
//! Pro aktivem Anruf existiert eine Relay-Gruppe mit den Verbindungen
//! beider Teilnehmer. Ein Kandidat geht an alle Mitglieder ausser dem
//! Absender. Nicht-Mitglieder koennen nichts in eine Gruppe einspeisen.

use callbridge_core::types::{CallId, ConnectionId, UserId};
use callbridge_protocol::control::{RelayedCandidate, ServerEvent};
use std::collections::HashMap;

use crate::broadcast::EventBroadcaster;

/// Relay-Gruppen aller aktiven Anrufe
pub struct RelayGroups {
    gruppen: HashMap<CallId, Vec<ConnectionId>>,
    broadcaster: EventBroadcaster,
}

impl RelayGroups {
    pub fn neu(broadcaster: EventBroadcaster) -> Self {
        Self {
            gruppen: HashMap::new(),
            broadcaster,
        }
    }

    /// Legt die Gruppe eines Anrufs an (ersetzt eine bestehende)
    pub fn gruppe_anlegen(&mut self, call_id: CallId, mitglieder: Vec<ConnectionId>) {
        tracing::debug!(call_id = %call_id, mitglieder = mitglieder.len(), "Relay-Gruppe angelegt");
        self.gruppen.insert(call_id, mitglieder);
    }

    /// Loest die Gruppe eines Anrufs auf
    pub fn gruppe_entfernen(&mut self, call_id: &CallId) -> bool {
        self.gruppen.remove(call_id).is_some()
    }

    pub fn mitglieder(&self, call_id: &CallId) -> Option<&[ConnectionId]> {
        self.gruppen.get(call_id).map(Vec::as_slice)
    }

    pub fn gruppen_anzahl(&self) -> usize {
        self.gruppen.len()
    }

    /// Leitet einen Kandidaten an alle anderen Mitglieder der Gruppe weiter
    ///
    /// Gibt die Anzahl der Empfaenger zurueck. Ohne Gruppe oder wenn der
    /// Absender kein Mitglied ist, wird nichts gesendet.
    pub fn weiterleiten(
        &self,
        call_id: &CallId,
        absender_verbindung: &ConnectionId,
        absender: &UserId,
        candidate: serde_json::Value,
    ) -> usize {
        let Some(mitglieder) = self.gruppen.get(call_id) else {
            tracing::trace!(call_id = %call_id, "Kandidat ohne Relay-Gruppe verworfen");
            return 0;
        };
        if !mitglieder.contains(absender_verbindung) {
            tracing::debug!(call_id = %call_id, absender = %absender, "Kandidat von Nicht-Mitglied verworfen");
            return 0;
        }

        let ereignis = ServerEvent::IceCandidate(RelayedCandidate {
            candidate,
            sender_id: absender.clone(),
        });

        mitglieder
            .iter()
            .filter(|conn| *conn != absender_verbindung)
            .filter(|conn| self.broadcaster.an_verbindung_senden(conn, ereignis.clone()))
            .count()
    }
}
