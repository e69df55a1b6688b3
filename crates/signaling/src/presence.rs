//! Presence-Registry – Wer ist online und mit welchem Status
//!
//! Die Registry haelt alle registrierten Benutzer, indiziert nach UserId.
//! Jede Aenderung an der Menge oder an einem Status fuehrt zu genau einem
//! `user-list-updated` an alle Roster-Abonnenten. Der Snapshot ist nach
//! UserId sortiert und enthaelt nie das Verbindungs-Handle.
//!
//! Die Registry ist nicht selbst synchronisiert; sie lebt im `SignalingHub`
//! hinter dem Zustands-Lock.

use callbridge_core::types::{zeitstempel_ms, ConnectionId, UserId, UserStatus};
use callbridge_protocol::control::{RosterEntry, ServerEvent};
use std::collections::BTreeMap;

use crate::broadcast::EventBroadcaster;

// ---------------------------------------------------------------------------
// OnlineUser
// ---------------------------------------------------------------------------

/// Eintrag eines registrierten Benutzers
#[derive(Debug, Clone)]
pub struct OnlineUser {
    pub user_id: UserId,
    pub name: String,
    pub languages: Vec<String>,
    pub status: UserStatus,
    /// Zeitpunkt der letzten Aktivitaet (ms seit Unix-Epoche)
    pub last_seen: i64,
    /// Verbindung ueber die der Benutzer erreichbar ist
    pub connection: ConnectionId,
}

impl OnlineUser {
    /// Oeffentliche Sicht fuer die Online-Liste
    pub fn roster_eintrag(&self) -> RosterEntry {
        RosterEntry {
            id: self.user_id.clone(),
            name: self.name.clone(),
            languages: self.languages.clone(),
            status: self.status,
            last_seen: self.last_seen,
        }
    }
}

// ---------------------------------------------------------------------------
// PresenceRegistry
// ---------------------------------------------------------------------------

/// Verwaltet alle Online-Benutzer
pub struct PresenceRegistry {
    users: BTreeMap<UserId, OnlineUser>,
    broadcaster: EventBroadcaster,
}

impl PresenceRegistry {
    /// Erstellt eine leere Registry
    pub fn neu(broadcaster: EventBroadcaster) -> Self {
        Self {
            users: BTreeMap::new(),
            broadcaster,
        }
    }

    /// Registriert oder ersetzt einen Benutzer mit Status `available`
    ///
    /// Gibt den ersetzten Eintrag zurueck, falls die ID schon belegt war.
    pub fn registrieren(
        &mut self,
        user_id: UserId,
        name: String,
        languages: Vec<String>,
        connection: ConnectionId,
    ) -> Option<OnlineUser> {
        let eintrag = OnlineUser {
            user_id: user_id.clone(),
            name,
            languages,
            status: UserStatus::Available,
            last_seen: zeitstempel_ms(),
            connection,
        };

        tracing::info!(user_id = %user_id, name = %eintrag.name, conn = %connection, "Benutzer online");
        let vorher = self.users.insert(user_id, eintrag);
        self.roster_senden();
        vorher
    }

    /// Setzt den Status eines Benutzers und sendet die Online-Liste
    ///
    /// Unbekannte Benutzer sind ein No-op ohne Broadcast.
    pub fn status_aktualisieren(&mut self, user_id: &UserId, status: UserStatus) -> bool {
        if !self.status_setzen(user_id, status) {
            return false;
        }
        self.roster_senden();
        true
    }

    /// Entfernt einen Benutzer und sendet die Online-Liste
    ///
    /// Idempotent: ein zweiter Aufruf findet nichts und sendet nichts.
    pub fn entfernen(&mut self, user_id: &UserId) -> Option<OnlineUser> {
        let entfernt = self.users.remove(user_id)?;
        tracing::info!(user_id = %user_id, "Benutzer offline");
        self.roster_senden();
        Some(entfernt)
    }

    /// Aktualisiert nur `lastSeen` (kein Broadcast)
    pub fn lebenszeichen(&mut self, user_id: &UserId) -> bool {
        match self.users.get_mut(user_id) {
            Some(user) => {
                user.last_seen = zeitstempel_ms();
                true
            }
            None => false,
        }
    }

    /// Online-Liste, sortiert nach UserId
    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.users.values().map(OnlineUser::roster_eintrag).collect()
    }

    pub fn get(&self, user_id: &UserId) -> Option<&OnlineUser> {
        self.users.get(user_id)
    }

    /// Verbindung eines Benutzers
    pub fn verbindung_von(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.users.get(user_id).map(|u| u.connection)
    }

    pub fn online_anzahl(&self) -> usize {
        self.users.len()
    }

    /// Setzt den Status ohne Broadcast
    ///
    /// Fuer Aenderungen die mehrere Benutzer betreffen und mit einem
    /// einzigen `roster_senden` abgeschlossen werden.
    pub(crate) fn status_setzen(&mut self, user_id: &UserId, status: UserStatus) -> bool {
        match self.users.get_mut(user_id) {
            Some(user) => {
                user.status = status;
                user.last_seen = zeitstempel_ms();
                tracing::debug!(user_id = %user_id, status = ?status, "Status gesetzt");
                true
            }
            None => false,
        }
    }

    /// Sendet die aktuelle Online-Liste an alle Abonnenten
    pub(crate) fn roster_senden(&self) {
        let anzahl = self
            .broadcaster
            .an_roster_senden(ServerEvent::UserListUpdated(self.snapshot()));
        tracing::trace!(empfaenger = anzahl, "Online-Liste gesendet");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
