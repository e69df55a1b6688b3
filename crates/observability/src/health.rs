//! Health-Check und Status-Seite fuer Callbridge
//!
//! Endpoints:
//! - `GET /health` – JSON mit Status, Version, Uptime und Zaehlern
//! - `GET /`       – Status-Seite als Klartext
//!
//! Beide lesen nur ueber `StatusQuelle` und veraendern keinen Zustand.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Quelle der Laufzeit-Zaehler fuer Health-Check und Status-Seite
pub trait StatusQuelle: Send + Sync + 'static {
    /// Anzahl registrierter Benutzer
    fn online_anzahl(&self) -> usize;
    /// Anzahl angefragter und aktiver Anrufe
    fn anruf_anzahl(&self) -> usize;
    /// Laufzeit seit dem Start in Sekunden
    fn uptime_sek(&self) -> u64;
    /// Anzeigename des Servers
    fn server_name(&self) -> String;
}

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub online_users: usize,
    pub active_calls: usize,
}

impl HealthResponse {
    /// Erstellt eine Antwort aus einer Status-Quelle
    pub fn aus_quelle(quelle: &dyn StatusQuelle) -> Self {
        Self {
            status: HealthStatus::Healthy,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: quelle.uptime_sek(),
            online_users: quelle.online_anzahl(),
            active_calls: quelle.anruf_anzahl(),
        }
    }
}

/// Rendert die Klartext-Status-Seite
pub fn status_seite(quelle: &dyn StatusQuelle) -> String {
    format!(
        "{name} signaling server\n\
         version: {version}\n\
         uptime: {uptime}s\n\
         online users: {online}\n\
         active calls: {calls}\n",
        name = quelle.server_name(),
        version = env!("CARGO_PKG_VERSION"),
        uptime = quelle.uptime_sek(),
        online = quelle.online_anzahl(),
        calls = quelle.anruf_anzahl(),
    )
}

/// Axum-Router fuer `/health` und `/`
pub fn health_router(quelle: Arc<dyn StatusQuelle>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(status_handler))
        .with_state(quelle)
}

/// `GET /health` – gibt den Serverstatus zurueck
async fn health_handler(State(quelle): State<Arc<dyn StatusQuelle>>) -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::aus_quelle(quelle.as_ref())))
}

/// `GET /` – Status-Seite
async fn status_handler(State(quelle): State<Arc<dyn StatusQuelle>>) -> impl IntoResponse {
    status_seite(quelle.as_ref())
}
