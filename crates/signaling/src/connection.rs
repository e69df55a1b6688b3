//! Client-Connection – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede WebSocket-Verbindung bekommt eine `ClientConnection` in einem
//! eigenen tokio-Task. Eingehende Frames werden in Empfangsreihenfolge
//! verarbeitet; ausgehende Ereignisse kommen aus der Send-Queue des
//! Broadcasters.
//!
//! ## Keepalive
//! - Server sendet alle `keepalive_sek` einen WebSocket-Ping
//! - Ohne eingehenden Verkehr fuer `verbindungs_timeout_sek` wird getrennt
//! - Jede Trennung laeuft ueber `MessageDispatcher::client_cleanup`
//!
//! ## Verdraengung
//! Uebernimmt eine andere Verbindung die Identitaet, setzt der Broadcaster
//! das Verdraengungs-Flag. Die Verbindung sendet dann `session-replaced`
//! direkt in den Socket und schliesst mit Code 4001.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use callbridge_core::types::ConnectionId;
use callbridge_protocol::control::ServerEvent;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, OwnedSemaphorePermit};
use tokio::time::MissedTickBehavior;

use crate::dispatcher::MessageDispatcher;
use crate::server_state::SignalingState;

/// WebSocket-Close-Code "going away"
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// WebSocket-Close-Code fuer verdraengte Sitzungen (anwendungsspezifisch)
pub const CLOSE_SESSION_REPLACED: u16 = 4001;

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientConnection {
    state: Arc<SignalingState>,
    conn_id: ConnectionId,
    peer_addr: SocketAddr,
    /// Verbindungs-Slot; wird mit der Connection freigegeben
    _slot: OwnedSemaphorePermit,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr, slot: OwnedSemaphorePermit) -> Self {
        Self {
            state,
            conn_id: ConnectionId::new(),
            peer_addr,
            _slot: slot,
        }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung getrennt wird, die Sitzung verdraengt wird
    /// oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, socket: WebSocket, mut shutdown_rx: watch::Receiver<bool>) {
        let conn_id = self.conn_id;
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek.max(1));
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        let mut sende_rx = self.state.broadcaster.client_registrieren(conn_id);
        let Some(mut verdraengt_rx) = self.state.broadcaster.verdraengung_beobachten(&conn_id)
        else {
            tracing::error!(conn = %conn_id, "Verbindung nach Registrierung nicht im Broadcaster");
            self.state.broadcaster.client_entfernen(&conn_id);
            return;
        };

        tracing::info!(conn = %conn_id, peer = %peer_addr, "Neue Verbindung");
        self.state.metriken.connections_total.inc();
        self.state.metriken.open_connections.inc();

        let (mut ws_tx, mut ws_rx) = socket.split();
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let mut letzter_empfang = Instant::now();
        let mut ping_takt = tokio::time::interval_at(
            tokio::time::Instant::now() + keepalive_intervall,
            keepalive_intervall,
        );
        ping_takt.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Eingehender Frame vom Client
                eingehend = ws_rx.next() => {
                    match eingehend {
                        Some(Ok(Message::Text(text))) => {
                            letzter_empfang = Instant::now();
                            if let Some(antwort) = dispatcher.text_verarbeiten(&text, conn_id) {
                                if !self.ereignis_senden(&mut ws_tx, &antwort).await {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            letzter_empfang = Instant::now();
                            tracing::warn!(conn = %conn_id, "Binaer-Frame ignoriert");
                        }
                        Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                            letzter_empfang = Instant::now();
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::info!(conn = %conn_id, "Verbindung vom Client getrennt");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(conn = %conn_id, fehler = %e, "Frame-Lesefehler");
                            break;
                        }
                    }
                }

                // Ausgehendes Ereignis aus dem Broadcaster
                ausgehend = sende_rx.recv() => {
                    let Some(ereignis) = ausgehend else {
                        break;
                    };
                    if !self.ereignis_senden(&mut ws_tx, &ereignis).await {
                        break;
                    }
                }

                // Identitaet von einer anderen Verbindung uebernommen
                Ok(()) = verdraengt_rx.changed() => {
                    if *verdraengt_rx.borrow() {
                        tracing::info!(conn = %conn_id, "Sitzung verdraengt, Verbindung wird geschlossen");
                        if self.ereignis_senden(&mut ws_tx, &ServerEvent::SessionReplaced).await {
                            schliessen(&mut ws_tx, CLOSE_SESSION_REPLACED, "session replaced").await;
                        }
                        break;
                    }
                }

                // Keepalive-Ping und Timeout
                _ = ping_takt.tick() => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        tracing::warn!(conn = %conn_id, "Verbindungs-Timeout");
                        break;
                    }
                    if let Err(e) = ws_tx.send(Message::Ping(Vec::new())).await {
                        tracing::warn!(conn = %conn_id, fehler = %e, "Ping-Senden fehlgeschlagen");
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(conn = %conn_id, "Shutdown-Signal – Verbindung wird getrennt");
                        schliessen(&mut ws_tx, CLOSE_GOING_AWAY, "server shutting down").await;
                        break;
                    }
                }
            }
        }

        dispatcher.client_cleanup(conn_id);
        self.state.metriken.open_connections.dec();
        tracing::info!(conn = %conn_id, peer = %peer_addr, "Verbindungs-Task beendet");
    }

    /// Kodiert und sendet ein Ereignis; `false` wenn der Socket nicht mehr schreibbar ist
    async fn ereignis_senden(
        &self,
        ws_tx: &mut SplitSink<WebSocket, Message>,
        ereignis: &ServerEvent,
    ) -> bool {
        let text = match self.state.codec.encode(ereignis) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(conn = %self.conn_id, fehler = %e, "Ereignis nicht kodierbar, verworfen");
                return true;
            }
        };
        if let Err(e) = ws_tx.send(Message::Text(text)).await {
            tracing::warn!(conn = %self.conn_id, fehler = %e, "Senden fehlgeschlagen");
            return false;
        }
        true
    }
}

async fn schliessen(ws_tx: &mut SplitSink<WebSocket, Message>, code: u16, grund: &'static str) {
    let _ = ws_tx
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: grund.into(),
        })))
        .await;
}
