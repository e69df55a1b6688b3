//! Connection-Gateway – Zuordnung Verbindung -> Benutzer
//!
//! Jede WebSocket-Verbindung ist hoechstens einem Benutzer zugeordnet.
//! `loesen` liefert die Zuordnung nur beim ersten Aufruf; damit laeuft der
//! Trennungs-Pfad pro Verbindung genau einmal.

use callbridge_core::types::{ConnectionId, UserId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ConnectionGateway {
    verbindungen: HashMap<ConnectionId, UserId>,
}

impl ConnectionGateway {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Ordnet eine Verbindung einem Benutzer zu
    ///
    /// Gibt die vorherige Zuordnung dieser Verbindung zurueck.
    pub fn zuordnen(&mut self, conn_id: ConnectionId, user_id: UserId) -> Option<UserId> {
        self.verbindungen.insert(conn_id, user_id)
    }

    pub fn user_von(&self, conn_id: &ConnectionId) -> Option<&UserId> {
        self.verbindungen.get(conn_id)
    }

    /// Entfernt die Zuordnung einer Verbindung
    pub fn loesen(&mut self, conn_id: &ConnectionId) -> Option<UserId> {
        self.verbindungen.remove(conn_id)
    }

    pub fn anzahl(&self) -> usize {
        self.verbindungen.len()
    }
}
