//! Signaling-Hub – Der gesamte Signaling-Zustand als ein Objekt
//!
//! Der Hub besitzt Presence-Registry, Call-Manager (inkl. Relay-Gruppen)
//! und Connection-Gateway. Er wird ausschliesslich hinter dem Mutex in
//! `SignalingState` benutzt; jede Operation laeuft vollstaendig unter dem
//! Lock, ohne `.await`. Ausgehende Ereignisse gehen per `try_send` in die
//! Queues der Verbindungen und erscheinen daher in Mutationsreihenfolge.
//!
//! Alle Operationen nehmen die `ConnectionId` der ausloesenden Verbindung
//! entgegen; die UserId wird ueber das Gateway aufgeloest.

use callbridge_core::types::{CallId, ConnectionId, UserId, UserStatus};
use callbridge_observability::CallbridgeMetrics;
use callbridge_protocol::control::{
    AcceptCallRequest, EndCallRequest, IceCandidateRequest, InitiateCallRequest, RegisterRequest,
    RejectCallRequest, RosterEntry,
};

use crate::broadcast::EventBroadcaster;
use crate::calls::CallManager;
use crate::error::{SignalingError, SignalingResult};
use crate::gateway::ConnectionGateway;
use crate::presence::PresenceRegistry;

/// Grund im `call-ended` wenn die Verbindung eines Teilnehmers wegfaellt
pub const GRUND_GETRENNT: &str = "disconnected";
/// Grund im `call-ended` wenn die Identitaet neu registriert wird
pub const GRUND_ERSETZT: &str = "replaced";

pub struct SignalingHub {
    presence: PresenceRegistry,
    calls: CallManager,
    gateway: ConnectionGateway,
    broadcaster: EventBroadcaster,
    metriken: CallbridgeMetrics,
}

impl SignalingHub {
    pub fn neu(broadcaster: EventBroadcaster, metriken: CallbridgeMetrics) -> Self {
        Self {
            presence: PresenceRegistry::neu(broadcaster.clone()),
            calls: CallManager::neu(broadcaster.clone()),
            gateway: ConnectionGateway::neu(),
            broadcaster,
            metriken,
        }
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// Registriert die Verbindung unter der angegebenen UserId
    ///
    /// - Hatte die Verbindung bereits eine andere Identitaet, wird diese
    ///   vorher vollstaendig abgebaut.
    /// - Haelt eine andere Verbindung die UserId, wird sie verdraengt: ihr
    ///   Anruf endet (`replaced`), sie erhaelt `session-replaced` und ihre
    ///   spaetere Trennung ist ein No-op.
    /// - Ein laufender Anruf der UserId endet in jedem Fall (`replaced`).
    pub fn registrieren(&mut self, conn: ConnectionId, req: RegisterRequest) -> SignalingResult<()> {
        let RegisterRequest {
            user_id,
            name,
            languages,
        } = req;
        if !user_id.ist_gueltig() {
            return Err(SignalingError::UngueltigeUserId(user_id.to_string()));
        }

        if let Some(bisher) = self.gateway.user_von(&conn).cloned() {
            if bisher != user_id {
                tracing::info!(conn = %conn, alt = %bisher, neu = %user_id, "Verbindung wechselt Identitaet");
                self.gateway.loesen(&conn);
                self.identitaet_abbauen(&bisher, GRUND_GETRENNT);
            }
        }

        if let Some(alte_verbindung) = self
            .presence
            .verbindung_von(&user_id)
            .filter(|alt| *alt != conn)
        {
            tracing::info!(
                user_id = %user_id,
                alt = %alte_verbindung,
                neu = %conn,
                "Sitzung uebernommen"
            );
            self.gateway.loesen(&alte_verbindung);
            self.broadcaster.roster_abbestellen(&alte_verbindung);
            self.broadcaster.verdraengen(&alte_verbindung);
        }

        self.calls
            .trennen(&mut self.presence, &user_id, GRUND_ERSETZT);

        self.gateway.zuordnen(conn, user_id.clone());
        self.broadcaster.roster_abonnieren(conn);
        self.presence.registrieren(user_id, name, languages, conn);

        self.metriken_aktualisieren();
        Ok(())
    }

    /// Status-Aenderung durch den Client
    ///
    /// Wird nur uebernommen wenn sie zum Anruf-Index passt (`in-call` genau
    /// dann, wenn ein Anruf besteht). Alles andere ist ein No-op.
    pub fn status_aktualisieren(&mut self, conn: ConnectionId, status: UserStatus) -> bool {
        let Some(user_id) = self.gateway.user_von(&conn).cloned() else {
            return false;
        };
        let im_anruf = self.calls.anruf_von(&user_id).is_some();
        if (status == UserStatus::InCall) != im_anruf {
            tracing::debug!(user_id = %user_id, status = ?status, "Status widerspricht Anruf-Index, ignoriert");
            return false;
        }
        self.presence.status_aktualisieren(&user_id, status)
    }

    /// Aktualisiert `lastSeen` der Verbindung
    pub fn lebenszeichen(&mut self, conn: ConnectionId) -> bool {
        match self.gateway.user_von(&conn) {
            Some(user_id) => self.presence.lebenszeichen(user_id),
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Anrufe
    // -----------------------------------------------------------------------

    pub fn anruf_starten(
        &mut self,
        conn: ConnectionId,
        req: InitiateCallRequest,
    ) -> SignalingResult<CallId> {
        let ergebnis = self.registrierter_user(conn).and_then(|caller| {
            self.calls.starten(
                &mut self.presence,
                &caller,
                &req.target_user_id,
                req.offer,
                req.language,
            )
        });

        match &ergebnis {
            Ok(_) => self.metriken.calls_initiated_total.inc(),
            Err(e) => {
                tracing::debug!(conn = %conn, ziel = %req.target_user_id, fehler = %e, "Anruf abgewiesen");
                self.metriken
                    .calls_failed_total
                    .with_label_values(&[e.metrik_label()])
                    .inc();
            }
        }
        self.metriken_aktualisieren();
        ergebnis
    }

    pub fn anruf_annehmen(
        &mut self,
        conn: ConnectionId,
        req: AcceptCallRequest,
    ) -> SignalingResult<bool> {
        let user_id = self.registrierter_user(conn)?;
        Ok(self
            .calls
            .annehmen(&self.presence, &req.call_id, &user_id, req.answer))
    }

    pub fn anruf_ablehnen(
        &mut self,
        conn: ConnectionId,
        req: RejectCallRequest,
    ) -> SignalingResult<bool> {
        let user_id = self.registrierter_user(conn)?;
        let abgelehnt = self
            .calls
            .ablehnen(&mut self.presence, &req.call_id, &user_id, req.reason);
        self.metriken_aktualisieren();
        Ok(abgelehnt)
    }

    pub fn anruf_beenden(&mut self, conn: ConnectionId, req: EndCallRequest) -> SignalingResult<bool> {
        let user_id = self.registrierter_user(conn)?;
        let beendet = self.calls.beenden(&mut self.presence, &req.call_id, &user_id);
        self.metriken_aktualisieren();
        Ok(beendet)
    }

    /// Leitet einen Kandidaten an die Gegenseite weiter
    pub fn kandidat_weiterleiten(
        &mut self,
        conn: ConnectionId,
        req: IceCandidateRequest,
    ) -> SignalingResult<usize> {
        let user_id = self.registrierter_user(conn)?;
        let anzahl = self
            .calls
            .relay()
            .weiterleiten(&req.call_id, &conn, &user_id, req.candidate);
        self.metriken.candidates_relayed_total.inc_by(anzahl as u64);
        Ok(anzahl)
    }

    // -----------------------------------------------------------------------
    // Verbindungen
    // -----------------------------------------------------------------------

    /// Trennungs-Pfad einer Verbindung
    ///
    /// Laeuft pro Verbindung hoechstens einmal: nur der erste Aufruf findet
    /// die Gateway-Zuordnung. Gibt `true` zurueck wenn eine Identitaet
    /// abgebaut wurde.
    pub fn verbindung_getrennt(&mut self, conn: ConnectionId) -> bool {
        let Some(user_id) = self.gateway.loesen(&conn) else {
            return false;
        };
        tracing::info!(conn = %conn, user_id = %user_id, "Verbindung getrennt, Identitaet wird abgebaut");
        self.identitaet_abbauen(&user_id, GRUND_GETRENNT);
        true
    }

    // -----------------------------------------------------------------------
    // Abfragen
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> Vec<RosterEntry> {
        self.presence.snapshot()
    }

    pub fn online_anzahl(&self) -> usize {
        self.presence.online_anzahl()
    }

    pub fn anruf_anzahl(&self) -> usize {
        self.calls.anruf_anzahl()
    }

    pub fn user_von(&self, conn: &ConnectionId) -> Option<&UserId> {
        self.gateway.user_von(conn)
    }

    /// Teilnehmer eines Anrufs als (Anrufer, Angerufener)
    pub fn teilnehmer_finden(&self, call_id: &CallId) -> Option<(UserId, UserId)> {
        self.calls
            .teilnehmer_finden(call_id)
            .map(|(a, b)| (a.clone(), b.clone()))
    }

    pub fn anruf_von(&self, user_id: &UserId) -> Option<CallId> {
        self.calls.anruf_von(user_id)
    }

    pub fn status_von(&self, user_id: &UserId) -> Option<UserStatus> {
        self.presence.get(user_id).map(|u| u.status)
    }

    // -----------------------------------------------------------------------
    // Intern
    // -----------------------------------------------------------------------

    fn registrierter_user(&self, conn: ConnectionId) -> SignalingResult<UserId> {
        self.gateway
            .user_von(&conn)
            .cloned()
            .ok_or(SignalingError::NichtRegistriert)
    }

    /// Beendet den Anruf eines Benutzers und entfernt ihn aus der Presence
    fn identitaet_abbauen(&mut self, user_id: &UserId, grund: &str) {
        self.calls.trennen(&mut self.presence, user_id, grund);
        self.presence.entfernen(user_id);
        self.metriken_aktualisieren();
    }

    fn metriken_aktualisieren(&self) {
        self.metriken
            .online_users
            .set(self.presence.online_anzahl() as i64);
        self.metriken
            .active_calls
            .set(self.calls.anruf_anzahl() as i64);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use callbridge_protocol::control::ServerEvent;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Client {
        conn: ConnectionId,
        rx: mpsc::Receiver<ServerEvent>,
    }

    fn hub() -> (SignalingHub, EventBroadcaster) {
        let broadcaster = EventBroadcaster::neu();
        let metriken = CallbridgeMetrics::neu().unwrap();
        (SignalingHub::neu(broadcaster.clone(), metriken), broadcaster)
    }

    fn verbinden(broadcaster: &EventBroadcaster) -> Client {
        let conn = ConnectionId::new();
        let rx = broadcaster.client_registrieren(conn);
        Client { conn, rx }
    }

    fn register(id: &str) -> RegisterRequest {
        RegisterRequest {
            user_id: id.into(),
            name: id.to_uppercase(),
            languages: vec!["en".into()],
        }
    }

    fn leeren(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut ereignisse = Vec::new();
        while let Ok(e) = rx.try_recv() {
            ereignisse.push(e);
        }
        ereignisse
    }

    fn anruf(hub: &mut SignalingHub, von: &Client, an: &str) -> CallId {
        hub.anruf_starten(
            von.conn,
            InitiateCallRequest {
                target_user_id: an.into(),
                offer: json!({"type": "offer"}),
                language: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn registrierung_abonniert_roster() {
        let (mut hub, broadcaster) = hub();
        let mut alice = verbinden(&broadcaster);

        hub.registrieren(alice.conn, register("alice")).unwrap();

        let ereignisse = leeren(&mut alice.rx);
        assert!(matches!(
            ereignisse.as_slice(),
            [ServerEvent::UserListUpdated(liste)] if liste.len() == 1
        ));
        assert!(broadcaster.ist_roster_abonnent(&alice.conn));
    }

    #[test]
    fn leere_user_id_wird_abgelehnt() {
        let (mut hub, broadcaster) = hub();
        let alice = verbinden(&broadcaster);
        let ergebnis = hub.registrieren(alice.conn, register("  "));
        assert!(matches!(ergebnis, Err(SignalingError::UngueltigeUserId(_))));
        assert_eq!(hub.online_anzahl(), 0);
    }

    #[test]
    fn anruf_vor_registrierung() {
        let (mut hub, broadcaster) = hub();
        let alice = verbinden(&broadcaster);
        let ergebnis = hub.anruf_starten(
            alice.conn,
            InitiateCallRequest {
                target_user_id: "bob".into(),
                offer: json!({}),
                language: None,
            },
        );
        assert!(matches!(ergebnis, Err(SignalingError::NichtRegistriert)));
        assert!(matches!(
            hub.anruf_beenden(alice.conn, EndCallRequest { call_id: CallId::new() }),
            Err(SignalingError::NichtRegistriert)
        ));
    }

    #[test]
    fn status_muss_zum_anruf_index_passen() {
        let (mut hub, broadcaster) = hub();
        let alice = verbinden(&broadcaster);
        let bob = verbinden(&broadcaster);
        hub.registrieren(alice.conn, register("alice")).unwrap();
        hub.registrieren(bob.conn, register("bob")).unwrap();

        assert!(!hub.status_aktualisieren(alice.conn, UserStatus::InCall));
        assert_eq!(hub.status_von(&"alice".into()), Some(UserStatus::Available));

        anruf(&mut hub, &alice, "bob");
        assert!(!hub.status_aktualisieren(alice.conn, UserStatus::Available));
        assert_eq!(hub.status_von(&"alice".into()), Some(UserStatus::InCall));
        assert!(hub.status_aktualisieren(alice.conn, UserStatus::InCall));
    }

    #[test]
    fn trennung_laeuft_genau_einmal() {
        let (mut hub, broadcaster) = hub();
        let alice = verbinden(&broadcaster);
        let mut bob = verbinden(&broadcaster);
        hub.registrieren(alice.conn, register("alice")).unwrap();
        hub.registrieren(bob.conn, register("bob")).unwrap();
        let _ = leeren(&mut bob.rx);

        assert!(hub.verbindung_getrennt(alice.conn));
        assert!(!hub.verbindung_getrennt(alice.conn));

        let roster_updates = leeren(&mut bob.rx)
            .into_iter()
            .filter(|e| matches!(e, ServerEvent::UserListUpdated(_)))
            .count();
        assert_eq!(roster_updates, 1);
        assert_eq!(hub.online_anzahl(), 1);
    }

    #[test]
    fn uebernahme_verdraengt_alte_verbindung() {
        let (mut hub, broadcaster) = hub();
        let mut alt = verbinden(&broadcaster);
        let neu = verbinden(&broadcaster);
        let mut bob = verbinden(&broadcaster);
        hub.registrieren(alt.conn, register("alice")).unwrap();
        hub.registrieren(bob.conn, register("bob")).unwrap();
        let call_id = anruf(&mut hub, &alt, "bob");
        let _ = leeren(&mut alt.rx);
        let _ = leeren(&mut bob.rx);

        // Volle Queue der alten Verbindung verhindert die Verdraengung nicht
        while broadcaster.an_verbindung_senden(&alt.conn, ServerEvent::error("fuellen")) {}

        hub.registrieren(neu.conn, register("alice")).unwrap();

        assert!(broadcaster.ist_verdraengt(&alt.conn));
        assert!(!broadcaster.ist_verdraengt(&neu.conn));
        assert!(!broadcaster.ist_roster_abonnent(&alt.conn));

        let beendet = leeren(&mut bob.rx).into_iter().find_map(|e| match e {
            ServerEvent::CallEnded(c) => Some(c),
            _ => None,
        });
        let beendet = beendet.expect("Bob muss call-ended erhalten");
        assert_eq!(beendet.call_id, call_id);
        assert_eq!(beendet.ended_by, "system");
        assert_eq!(beendet.reason.as_deref(), Some(GRUND_ERSETZT));

        // Spaetere Trennung der alten Verbindung aendert nichts mehr
        assert!(!hub.verbindung_getrennt(alt.conn));
        assert_eq!(hub.online_anzahl(), 2);
        assert_eq!(hub.user_von(&neu.conn).map(UserId::as_str), Some("alice"));
        assert_eq!(hub.status_von(&"bob".into()), Some(UserStatus::Available));
    }

    #[test]
    fn neue_identitaet_auf_gleicher_verbindung() {
        let (mut hub, broadcaster) = hub();
        let alice = verbinden(&broadcaster);
        hub.registrieren(alice.conn, register("alice")).unwrap();
        hub.registrieren(alice.conn, register("alicia")).unwrap();

        let ids: Vec<String> = hub.snapshot().into_iter().map(|e| e.id.to_string()).collect();
        assert_eq!(ids, vec!["alicia"]);
    }

    #[test]
    fn kandidat_vor_annahme_wird_verworfen() {
        let (mut hub, broadcaster) = hub();
        let alice = verbinden(&broadcaster);
        let mut bob = verbinden(&broadcaster);
        hub.registrieren(alice.conn, register("alice")).unwrap();
        hub.registrieren(bob.conn, register("bob")).unwrap();
        let call_id = anruf(&mut hub, &alice, "bob");
        let _ = leeren(&mut bob.rx);

        let anzahl = hub
            .kandidat_weiterleiten(
                alice.conn,
                IceCandidateRequest {
                    call_id,
                    candidate: json!({"candidate": "c1"}),
                },
            )
            .unwrap();
        assert_eq!(anzahl, 0);
        assert!(leeren(&mut bob.rx).is_empty());
    }

    #[test]
    fn metriken_folgen_dem_zustand() {
        let broadcaster = EventBroadcaster::neu();
        let metriken = CallbridgeMetrics::neu().unwrap();
        let mut hub = SignalingHub::neu(broadcaster.clone(), metriken.clone());
        let alice = verbinden(&broadcaster);
        let bob = verbinden(&broadcaster);
        hub.registrieren(alice.conn, register("alice")).unwrap();
        hub.registrieren(bob.conn, register("bob")).unwrap();
        assert_eq!(metriken.online_users.get(), 2);

        anruf(&mut hub, &alice, "bob");
        assert_eq!(metriken.active_calls.get(), 1);
        assert_eq!(metriken.calls_initiated_total.get(), 1);

        let _ = hub.anruf_starten(
            alice.conn,
            InitiateCallRequest {
                target_user_id: "bob".into(),
                offer: json!({}),
                language: None,
            },
        );
        assert_eq!(
            metriken
                .calls_failed_total
                .with_label_values(&["caller_busy"])
                .get(),
            1
        );

        hub.verbindung_getrennt(bob.conn);
        assert_eq!(metriken.active_calls.get(), 0);
        assert_eq!(metriken.online_users.get(), 1);
    }
}
