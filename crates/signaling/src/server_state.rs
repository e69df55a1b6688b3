//! Gemeinsamer Server-Zustand fuer den Signaling-Service
//!
//! Haelt den `SignalingHub` hinter einem einzigen Mutex sowie die
//! lock-freien Teile (Broadcaster, Metriken, Codec), die zwischen
//! tokio-Tasks geteilt werden.

use callbridge_observability::{CallbridgeMetrics, StatusQuelle};
use callbridge_protocol::wire::{FrameCodec, DEFAULT_MAX_FRAME_SIZE};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::broadcast::{EventBroadcaster, SEND_QUEUE_GROESSE};
use crate::hub::SignalingHub;

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige WebSocket-Verbindungen
    pub max_clients: usize,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Maximale Groesse eines Text-Frames in Bytes
    pub max_frame_bytes: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Callbridge".to_string(),
            max_clients: 1024,
            send_queue_groesse: SEND_QUEUE_GROESSE,
            max_frame_bytes: DEFAULT_MAX_FRAME_SIZE,
            keepalive_sek: 25,
            verbindungs_timeout_sek: 60,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Event-Broadcaster (Send-Queues der Verbindungen)
    pub broadcaster: EventBroadcaster,
    /// Prometheus-Metriken
    pub metriken: CallbridgeMetrics,
    /// Frame-Codec fuer alle Verbindungen
    pub codec: FrameCodec,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
    /// Ein Permit pro offener WebSocket-Verbindung, hoechstens `max_clients`
    verbindungs_slots: Arc<Semaphore>,
    hub: Mutex<SignalingHub>,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, metriken: CallbridgeMetrics) -> Arc<Self> {
        let broadcaster = EventBroadcaster::mit_queue_groesse(config.send_queue_groesse);
        let hub = SignalingHub::neu(broadcaster.clone(), metriken.clone());
        let slots = Semaphore::new(config.max_clients.min(Semaphore::MAX_PERMITS));
        Arc::new(Self {
            codec: FrameCodec::with_max_size(config.max_frame_bytes),
            config: Arc::new(config),
            broadcaster,
            metriken,
            start_time: Instant::now(),
            verbindungs_slots: Arc::new(slots),
            hub: Mutex::new(hub),
        })
    }

    /// Fuehrt eine Operation unter dem Zustands-Lock aus
    ///
    /// Die Closure darf nicht blockieren; innerhalb des Locks gibt es kein
    /// `.await`.
    pub fn mit_hub<R>(&self, f: impl FnOnce(&mut SignalingHub) -> R) -> R {
        let mut hub = self.hub.lock();
        f(&mut hub)
    }

    /// Reserviert einen Verbindungs-Slot
    ///
    /// `None` wenn bereits `max_clients` Verbindungen offen sind. Der Slot
    /// wird frei, sobald das Permit gedroppt wird.
    pub fn slot_reservieren(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.verbindungs_slots).try_acquire_owned().ok()
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl StatusQuelle for SignalingState {
    fn online_anzahl(&self) -> usize {
        self.mit_hub(|hub| hub.online_anzahl())
    }

    fn anruf_anzahl(&self) -> usize {
        self.mit_hub(|hub| hub.anruf_anzahl())
    }

    fn uptime_sek(&self) -> u64 {
        SignalingState::uptime_sek(self)
    }

    fn server_name(&self) -> String {
        self.config.server_name.clone()
    }
}
