//! Event-Broadcaster – Sendet Ereignisse an verbundene Clients
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller verbundenen
//! WebSocket-Verbindungen und die Abonnenten der Online-Liste.
//!
//! ## Selektives Senden
//! - An eine Verbindung: `an_verbindung_senden`
//! - An alle Roster-Abonnenten: `an_roster_senden`
//!
//! Gesendet wird immer nicht-blockierend (`try_send`). Volle oder
//! geschlossene Queues verwerfen die Nachricht, es gibt weder Bestaetigung
//! noch Wiederholung.
//!
//! Die Verdraengung einer Verbindung laeuft nicht ueber die Queue, sondern
//! ueber ein eigenes watch-Flag pro Verbindung und geht daher nie verloren.

use callbridge_core::types::ConnectionId;
use callbridge_protocol::control::ServerEvent;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub conn_id: ConnectionId,
    pub tx: mpsc::Sender<ServerEvent>,
    /// `true` sobald eine andere Verbindung die Identitaet uebernommen hat
    verdraengt: Arc<watch::Sender<bool>>,
}

impl ClientSender {
    /// Sendet ein Ereignis nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, ereignis: ServerEvent) -> bool {
        match self.tx.try_send(ereignis) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn = %self.conn_id, "Send-Queue voll – Ereignis verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(conn = %self.conn_id, "Send-Queue geschlossen (Verbindung getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle verbundenen Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Send-Queues, indiziert nach Verbindung
    clients: DashMap<ConnectionId, ClientSender>,
    /// Verbindungen die `user-list-updated` erhalten
    roster_abonnenten: DashSet<ConnectionId>,
    queue_groesse: usize,
}

impl EventBroadcaster {
    /// Erstellt einen neuen EventBroadcaster mit Standard-Queue-Groesse
    pub fn neu() -> Self {
        Self::mit_queue_groesse(SEND_QUEUE_GROESSE)
    }

    /// Erstellt einen EventBroadcaster mit eigener Queue-Groesse pro Verbindung
    pub fn mit_queue_groesse(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
                roster_abonnenten: DashSet::new(),
                queue_groesse: queue_groesse.max(1),
            }),
        }
    }

    /// Registriert eine neue Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und schreibt in den Socket.
    pub fn client_registrieren(&self, conn_id: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        let (verdraengt, _) = watch::channel(false);
        let sender = ClientSender {
            conn_id,
            tx,
            verdraengt: Arc::new(verdraengt),
        };
        self.inner.clients.insert(conn_id, sender);
        tracing::debug!(conn = %conn_id, "Verbindung im Broadcaster registriert");
        rx
    }

    /// Entfernt eine Verbindung samt Roster-Abonnement
    pub fn client_entfernen(&self, conn_id: &ConnectionId) {
        self.inner.clients.remove(conn_id);
        self.inner.roster_abonnenten.remove(conn_id);
        tracing::debug!(conn = %conn_id, "Verbindung aus Broadcaster entfernt");
    }

    /// Abonniert die Online-Liste fuer eine Verbindung
    pub fn roster_abonnieren(&self, conn_id: ConnectionId) {
        self.inner.roster_abonnenten.insert(conn_id);
    }

    /// Beendet das Roster-Abonnement einer Verbindung
    pub fn roster_abbestellen(&self, conn_id: &ConnectionId) {
        self.inner.roster_abonnenten.remove(conn_id);
    }

    /// Sendet ein Ereignis an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Verbindung gefunden und das Ereignis eingereiht wurde.
    pub fn an_verbindung_senden(&self, conn_id: &ConnectionId, ereignis: ServerEvent) -> bool {
        match self.inner.clients.get(conn_id) {
            Some(sender) => sender.senden(ereignis),
            None => {
                tracing::debug!(conn = %conn_id, "Senden an unbekannte Verbindung");
                false
            }
        }
    }

    /// Markiert eine Verbindung als verdraengt
    ///
    /// Unabhaengig vom Fuellstand der Send-Queue. Gibt `false` zurueck wenn
    /// die Verbindung unbekannt ist.
    pub fn verdraengen(&self, conn_id: &ConnectionId) -> bool {
        match self.inner.clients.get(conn_id) {
            Some(sender) => {
                sender.verdraengt.send_replace(true);
                true
            }
            None => false,
        }
    }

    /// Empfaenger fuer das Verdraengungs-Flag einer Verbindung
    pub fn verdraengung_beobachten(&self, conn_id: &ConnectionId) -> Option<watch::Receiver<bool>> {
        self.inner
            .clients
            .get(conn_id)
            .map(|sender| sender.verdraengt.subscribe())
    }

    /// Prueft ob eine Verbindung verdraengt wurde
    pub fn ist_verdraengt(&self, conn_id: &ConnectionId) -> bool {
        self.inner
            .clients
            .get(conn_id)
            .map(|sender| *sender.verdraengt.borrow())
            .unwrap_or(false)
    }

    /// Reserviert einen Platz in der Send-Queue einer Verbindung
    ///
    /// Mit der Reservierung kann das Ereignis spaeter ohne Verlust eingereiht
    /// werden. `None` wenn die Verbindung unbekannt, die Queue voll oder
    /// geschlossen ist.
    pub fn platz_reservieren(&self, conn_id: &ConnectionId) -> Option<mpsc::OwnedPermit<ServerEvent>> {
        let tx = self.inner.clients.get(conn_id).map(|s| s.tx.clone())?;
        match tx.try_reserve_owned() {
            Ok(permit) => Some(permit),
            Err(e) => {
                tracing::warn!(conn = %conn_id, fehler = %e, "Kein Platz in der Send-Queue");
                None
            }
        }
    }

    /// Sendet ein Ereignis an alle Roster-Abonnenten
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_roster_senden(&self, ereignis: ServerEvent) -> usize {
        let mut gesendet = 0;
        for conn_id in self.inner.roster_abonnenten.iter() {
            if let Some(sender) = self.inner.clients.get(conn_id.key()) {
                if sender.senden(ereignis.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Prueft ob eine Verbindung registriert ist
    pub fn ist_registriert(&self, conn_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(conn_id)
    }

    /// Prueft ob eine Verbindung die Online-Liste abonniert hat
    pub fn ist_roster_abonnent(&self, conn_id: &ConnectionId) -> bool {
        self.inner.roster_abonnenten.contains(conn_id)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ereignis(text: &str) -> ServerEvent {
        ServerEvent::error(text)
    }

    #[tokio::test]
    async fn verbindung_registrieren_und_senden() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();

        let mut rx = broadcaster.client_registrieren(conn);
        assert!(broadcaster.ist_registriert(&conn));

        assert!(broadcaster.an_verbindung_senden(&conn, test_ereignis("eins")));

        let empfangen = rx.try_recv().expect("Ereignis muss vorhanden sein");
        assert!(matches!(empfangen, ServerEvent::CallError(e) if e.message == "eins"));
    }

    #[tokio::test]
    async fn an_roster_senden_nur_an_abonnenten() {
        let broadcaster = EventBroadcaster::neu();
        let conn1 = ConnectionId::new();
        let conn2 = ConnectionId::new();
        let conn3 = ConnectionId::new(); // kein Abonnent

        let mut rx1 = broadcaster.client_registrieren(conn1);
        let mut rx2 = broadcaster.client_registrieren(conn2);
        let mut rx3 = broadcaster.client_registrieren(conn3);

        broadcaster.roster_abonnieren(conn1);
        broadcaster.roster_abonnieren(conn2);

        let gesendet = broadcaster.an_roster_senden(test_ereignis("roster"));
        assert_eq!(gesendet, 2);

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err(), "conn3 darf nichts empfangen");
    }

    #[tokio::test]
    async fn volle_queue_verwirft_ereignis() {
        let broadcaster = EventBroadcaster::mit_queue_groesse(1);
        let conn = ConnectionId::new();
        let _rx = broadcaster.client_registrieren(conn);

        assert!(broadcaster.an_verbindung_senden(&conn, test_ereignis("1")));
        assert!(!broadcaster.an_verbindung_senden(&conn, test_ereignis("2")));
    }

    #[tokio::test]
    async fn reservierter_platz_geht_nicht_verloren() {
        let broadcaster = EventBroadcaster::mit_queue_groesse(2);
        let conn = ConnectionId::new();
        let mut rx = broadcaster.client_registrieren(conn);

        let permit = broadcaster.platz_reservieren(&conn).expect("Queue ist leer");
        assert!(broadcaster.an_verbindung_senden(&conn, test_ereignis("1")));
        assert!(!broadcaster.an_verbindung_senden(&conn, test_ereignis("2")));
        assert!(broadcaster.platz_reservieren(&conn).is_none());

        permit.send(test_ereignis("reserviert"));
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::CallError(e)) if e.message == "1"));
        assert!(matches!(rx.try_recv(), Ok(ServerEvent::CallError(e)) if e.message == "reserviert"));
    }

    #[tokio::test]
    async fn verdraengung_trotz_voller_queue() {
        let broadcaster = EventBroadcaster::mit_queue_groesse(1);
        let conn = ConnectionId::new();
        let _rx = broadcaster.client_registrieren(conn);
        let mut flag = broadcaster.verdraengung_beobachten(&conn).unwrap();

        assert!(broadcaster.an_verbindung_senden(&conn, test_ereignis("voll")));
        assert!(!broadcaster.ist_verdraengt(&conn));

        assert!(broadcaster.verdraengen(&conn));
        assert!(broadcaster.ist_verdraengt(&conn));
        flag.changed().await.unwrap();
        assert!(*flag.borrow());

        assert!(!broadcaster.verdraengen(&ConnectionId::new()));
    }

    #[test]
    fn reservieren_fuer_unbekannte_verbindung() {
        let broadcaster = EventBroadcaster::neu();
        assert!(broadcaster.platz_reservieren(&ConnectionId::new()).is_none());
    }

    #[test]
    fn senden_an_unbekannte_verbindung() {
        let broadcaster = EventBroadcaster::neu();
        assert!(!broadcaster.an_verbindung_senden(&ConnectionId::new(), test_ereignis("x")));
    }

    #[test]
    fn client_entfernen_beendet_abonnement() {
        let broadcaster = EventBroadcaster::neu();
        let conn = ConnectionId::new();

        let _rx = broadcaster.client_registrieren(conn);
        broadcaster.roster_abonnieren(conn);
        assert!(broadcaster.ist_roster_abonnent(&conn));

        broadcaster.client_entfernen(&conn);
        assert!(!broadcaster.ist_registriert(&conn));
        assert!(!broadcaster.ist_roster_abonnent(&conn));
        assert_eq!(broadcaster.an_roster_senden(test_ereignis("x")), 0);
    }
}
