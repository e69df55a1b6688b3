//! callbridge-server – Bibliotheks-Root
//!
//! Baut den HTTP/WebSocket-Router aus Signaling und Observability
//! zusammen und stellt den oeffentlichen Einstiegspunkt fuer
//! Integrationstests bereit.

pub mod config;

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use axum::{middleware, Router};
use callbridge_observability::{
    observability_router, request_timing_layer, timing_middleware, CallbridgeMetrics,
    StatusQuelle,
};
use callbridge_signaling::{signaling_router, SignalingState};
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut den vollstaendigen Router
    ///
    /// `GET /ws` fuer das Signaling, dazu `/metrics`, `/health` und `/`
    /// wenn Observability aktiviert ist.
    pub fn router(
        &self,
        state: Arc<SignalingState>,
        metriken: CallbridgeMetrics,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Router {
        let mut app = signaling_router(Arc::clone(&state), shutdown_rx);

        if self.config.observability.aktiviert {
            let quelle: Arc<dyn StatusQuelle> = state;
            app = app.merge(observability_router(quelle, metriken.clone()));
        }

        app.layer(middleware::from_fn_with_state(metriken, timing_middleware))
            .layer(request_timing_layer())
            .layer(self.cors_layer())
    }

    /// CORS konfigurieren: entweder spezifische Origins oder Any
    fn cors_layer(&self) -> CorsLayer {
        if self.config.netzwerk.cors_origins.is_empty() {
            return CorsLayer::permissive();
        }
        let origins: Vec<HeaderValue> = self
            .config
            .netzwerk
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    }

    /// Startet den Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken und Signaling-Zustand anlegen
    /// 2. Router bauen und Listener binden
    /// 3. Auf Ctrl-C warten, dann alle Verbindungen schliessen
    pub async fn starten(self) -> Result<()> {
        let metriken = CallbridgeMetrics::neu()?;
        let state = SignalingState::neu(self.config.signaling_config(), metriken.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = self.router(state, metriken, shutdown_rx);
        let adresse = self.config.bind_adresse();
        let listener = tokio::net::TcpListener::bind(&adresse)
            .await
            .with_context(|| format!("Bind auf '{adresse}' fehlgeschlagen"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            observability = self.config.observability.aktiviert,
            "Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)..."
        );

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            }
            tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            let _ = shutdown_tx.send(true);
        })
        .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}
