//! Call-Manager – Lebenszyklus von Eins-zu-Eins-Anrufen
//!
//! ## Zustaende
//! ```text
//! (keiner) --starten--> Proposed --annehmen--> Active
//!                          |                      |
//!                  ablehnen/beenden            beenden
//!                          |                      |
//!                          +-----> Ended <--------+
//! ```
//!
//! `Ended` ist terminal; die Session wird beim Aufraeumen sofort entfernt.
//!
//! ## Indizes
//! - `sessions`: CallId -> Session (enthaelt beide Teilnehmer)
//! - `user_calls`: UserId -> CallId, hoechstens ein Anruf pro Benutzer
//!
//! Beide werden nur gemeinsam veraendert. Ein Benutzer hat genau dann
//! Status `in-call`, wenn er im `user_calls`-Index steht.

use callbridge_core::types::{zeitstempel_ms, CallId, ConnectionId, UserId, UserStatus};
use callbridge_protocol::control::{
    CallAccepted, CallEnded, CallRejected, IncomingCall, ServerEvent,
};
use std::collections::HashMap;

use crate::broadcast::EventBroadcaster;
use crate::error::{SignalingError, SignalingResult};
use crate::presence::PresenceRegistry;
use crate::relay::RelayGroups;

/// Kennung fuer vom Server beendete Anrufe im Feld `endedBy`
pub const ENDED_BY_SYSTEM: &str = "system";

// ---------------------------------------------------------------------------
// CallSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Angebot gesendet, Antwort des Angerufenen steht aus
    Proposed,
    /// Angenommen, Kandidaten werden weitergeleitet
    Active,
    /// Abgelehnt oder beendet
    Ended,
}

/// Ein laufender oder angefragter Anruf
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: CallId,
    pub caller: UserId,
    pub callee: UserId,
    pub state: CallState,
    pub language: Option<String>,
    /// Erstellungszeitpunkt (ms seit Unix-Epoche)
    pub created_at: i64,
}

impl CallSession {
    pub fn ist_teilnehmer(&self, user_id: &UserId) -> bool {
        &self.caller == user_id || &self.callee == user_id
    }

    /// Der jeweils andere Teilnehmer
    pub fn gegenueber(&self, user_id: &UserId) -> Option<&UserId> {
        if &self.caller == user_id {
            Some(&self.callee)
        } else if &self.callee == user_id {
            Some(&self.caller)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// CallManager
// ---------------------------------------------------------------------------

/// Verwaltet alle Anrufe, den Anruf-Index und die Relay-Gruppen
pub struct CallManager {
    sessions: HashMap<CallId, CallSession>,
    user_calls: HashMap<UserId, CallId>,
    relay: RelayGroups,
    broadcaster: EventBroadcaster,
}

impl CallManager {
    pub fn neu(broadcaster: EventBroadcaster) -> Self {
        Self {
            sessions: HashMap::new(),
            user_calls: HashMap::new(),
            relay: RelayGroups::neu(broadcaster.clone()),
            broadcaster,
        }
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn session(&self, call_id: &CallId) -> Option<&CallSession> {
        self.sessions.get(call_id)
    }

    /// Teilnehmer eines Anrufs als (Anrufer, Angerufener)
    pub fn teilnehmer_finden(&self, call_id: &CallId) -> Option<(&UserId, &UserId)> {
        self.sessions.get(call_id).map(|s| (&s.caller, &s.callee))
    }

    /// Aktueller Anruf eines Benutzers
    pub fn anruf_von(&self, user_id: &UserId) -> Option<CallId> {
        self.user_calls.get(user_id).copied()
    }

    /// Anzahl der angefragten und aktiven Anrufe
    pub fn anruf_anzahl(&self) -> usize {
        self.sessions.len()
    }

    pub fn relay(&self) -> &RelayGroups {
        &self.relay
    }

    // -----------------------------------------------------------------------
    // Uebergaenge
    // -----------------------------------------------------------------------

    /// Startet einen Anruf und stellt dem Angerufenen das Angebot zu
    ///
    /// Prueft in dieser Reihenfolge: Anrufer registriert, kein Selbstanruf,
    /// Ziel online, Anrufer frei, Ziel frei. Danach wird ein Platz in der
    /// Send-Queue des Angerufenen reserviert; erst dann aendert sich der
    /// Zustand, sodass `incoming-call` immer zugestellt wird.
    pub fn starten(
        &mut self,
        presence: &mut PresenceRegistry,
        caller: &UserId,
        callee: &UserId,
        offer: serde_json::Value,
        language: Option<String>,
    ) -> SignalingResult<CallId> {
        let caller_name = presence
            .get(caller)
            .map(|u| u.name.clone())
            .ok_or(SignalingError::NichtRegistriert)?;
        if caller == callee {
            return Err(SignalingError::SelbstAnruf);
        }
        let callee_conn = presence
            .verbindung_von(callee)
            .ok_or_else(|| SignalingError::ZielNichtVerfuegbar(callee.to_string()))?;
        if self.user_calls.contains_key(caller) {
            return Err(SignalingError::AnruferBesetzt);
        }
        if self.user_calls.contains_key(callee) {
            return Err(SignalingError::ZielBesetzt(callee.to_string()));
        }
        let zustellung = self
            .broadcaster
            .platz_reservieren(&callee_conn)
            .ok_or_else(|| SignalingError::ZielNichtErreichbar(callee.to_string()))?;

        let call_id = self.freie_call_id();
        let jetzt = zeitstempel_ms();
        self.sessions.insert(
            call_id,
            CallSession {
                call_id,
                caller: caller.clone(),
                callee: callee.clone(),
                state: CallState::Proposed,
                language: language.clone(),
                created_at: jetzt,
            },
        );
        self.user_calls.insert(caller.clone(), call_id);
        self.user_calls.insert(callee.clone(), call_id);

        presence.status_setzen(caller, UserStatus::InCall);
        presence.status_setzen(callee, UserStatus::InCall);
        presence.roster_senden();

        zustellung.send(ServerEvent::IncomingCall(IncomingCall {
            call_id,
            caller_id: caller.clone(),
            caller_name,
            offer,
            language,
            timestamp: jetzt,
        }));

        tracing::info!(call_id = %call_id, caller = %caller, callee = %callee, "Anruf gestartet");
        Ok(call_id)
    }

    /// Nimmt einen angefragten Anruf an
    ///
    /// Nur der Angerufene im Zustand `Proposed`; alles andere ist ein No-op.
    pub fn annehmen(
        &mut self,
        presence: &PresenceRegistry,
        call_id: &CallId,
        annehmender: &UserId,
        answer: serde_json::Value,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(call_id) else {
            tracing::debug!(call_id = %call_id, "Annahme fuer unbekannten Anruf ignoriert");
            return false;
        };
        if session.state != CallState::Proposed || &session.callee != annehmender {
            tracing::debug!(
                call_id = %call_id,
                user_id = %annehmender,
                zustand = ?session.state,
                "Annahme nicht zulaessig"
            );
            return false;
        }

        session.state = CallState::Active;
        let caller = session.caller.clone();

        let mitglieder: Vec<ConnectionId> = [&caller, annehmender]
            .into_iter()
            .filter_map(|u| presence.verbindung_von(u))
            .collect();
        self.relay.gruppe_anlegen(*call_id, mitglieder);

        if let Some(conn) = presence.verbindung_von(&caller) {
            self.broadcaster.an_verbindung_senden(
                &conn,
                ServerEvent::CallAccepted(CallAccepted {
                    call_id: *call_id,
                    answer,
                    target_user_id: annehmender.clone(),
                }),
            );
        }

        tracing::info!(call_id = %call_id, "Anruf angenommen");
        true
    }

    /// Lehnt einen angefragten Anruf ab und raeumt ihn auf
    pub fn ablehnen(
        &mut self,
        presence: &mut PresenceRegistry,
        call_id: &CallId,
        ablehnender: &UserId,
        reason: Option<String>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(call_id) else {
            tracing::debug!(call_id = %call_id, "Ablehnung fuer unbekannten Anruf ignoriert");
            return false;
        };
        if session.state != CallState::Proposed || &session.callee != ablehnender {
            tracing::debug!(call_id = %call_id, user_id = %ablehnender, "Ablehnung nicht zulaessig");
            return false;
        }

        session.state = CallState::Ended;
        let caller = session.caller.clone();

        if let Some(conn) = presence.verbindung_von(&caller) {
            self.broadcaster.an_verbindung_senden(
                &conn,
                ServerEvent::CallRejected(CallRejected {
                    call_id: *call_id,
                    reason,
                    timestamp: zeitstempel_ms(),
                }),
            );
        }

        tracing::info!(call_id = %call_id, "Anruf abgelehnt");
        self.aufraeumen(presence, call_id)
    }

    /// Beendet einen Anruf auf Wunsch eines Teilnehmers
    pub fn beenden(
        &mut self,
        presence: &mut PresenceRegistry,
        call_id: &CallId,
        beendender: &UserId,
    ) -> bool {
        let ist_teilnehmer = self
            .sessions
            .get(call_id)
            .is_some_and(|s| s.ist_teilnehmer(beendender));
        if !ist_teilnehmer {
            tracing::debug!(call_id = %call_id, user_id = %beendender, "Beenden ignoriert");
            return false;
        }
        self.beenden_intern(presence, call_id, beendender, beendender.as_str(), None)
    }

    /// Beendet den Anruf eines Benutzers der den Dienst verlaesst
    ///
    /// Der verbleibende Teilnehmer erhaelt `call-ended` mit `endedBy`
    /// `"system"`. Gibt die CallId zurueck falls ein Anruf bestand.
    pub fn trennen(
        &mut self,
        presence: &mut PresenceRegistry,
        user_id: &UserId,
        grund: &str,
    ) -> Option<CallId> {
        let call_id = self.user_calls.get(user_id).copied()?;
        self.beenden_intern(presence, &call_id, user_id, ENDED_BY_SYSTEM, Some(grund.to_string()));
        Some(call_id)
    }

    /// Entfernt einen Anruf aus allen Indizes und setzt beide Teilnehmer
    /// auf `available`
    ///
    /// Idempotent: gibt `false` zurueck und sendet nichts, wenn der Anruf
    /// bereits entfernt wurde.
    pub fn aufraeumen(&mut self, presence: &mut PresenceRegistry, call_id: &CallId) -> bool {
        let Some(session) = self.sessions.remove(call_id) else {
            return false;
        };

        for user in [&session.caller, &session.callee] {
            if self.user_calls.get(user) == Some(call_id) {
                self.user_calls.remove(user);
            }
            presence.status_setzen(user, UserStatus::Available);
        }
        self.relay.gruppe_entfernen(call_id);
        presence.roster_senden();

        tracing::debug!(call_id = %call_id, "Anruf aufgeraeumt");
        true
    }

    fn beenden_intern(
        &mut self,
        presence: &mut PresenceRegistry,
        call_id: &CallId,
        ausloeser: &UserId,
        ended_by: &str,
        reason: Option<String>,
    ) -> bool {
        let Some(session) = self.sessions.get_mut(call_id) else {
            return false;
        };
        session.state = CallState::Ended;
        let gegenueber = session.gegenueber(ausloeser).cloned();

        if let Some(conn) = gegenueber.and_then(|u| presence.verbindung_von(&u)) {
            self.broadcaster.an_verbindung_senden(
                &conn,
                ServerEvent::CallEnded(CallEnded {
                    call_id: *call_id,
                    ended_by: ended_by.to_string(),
                    reason,
                    timestamp: zeitstempel_ms(),
                }),
            );
        }

        tracing::info!(call_id = %call_id, ended_by = %ended_by, "Anruf beendet");
        self.aufraeumen(presence, call_id)
    }

    fn freie_call_id(&self) -> CallId {
        loop {
            let id = CallId::new();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
