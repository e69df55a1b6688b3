//! Prometheus-kompatible Metriken fuer Callbridge
//!
//! Registrierte Metriken:
//! - `callbridge_online_users` – Gauge: Registrierte Benutzer
//! - `callbridge_active_calls` – Gauge: Angefragte und aktive Anrufe
//! - `callbridge_open_connections` – Gauge: Offene WebSocket-Verbindungen
//! - `callbridge_connections_total` – Counter: Angenommene WebSocket-Verbindungen
//! - `callbridge_calls_initiated_total` – Counter: Erfolgreich gestartete Anrufe
//! - `callbridge_calls_failed_total` – Counter: Abgewiesene Anrufe (reason)
//! - `callbridge_candidates_relayed_total` – Counter: Weitergeleitete Kandidaten
//! - `callbridge_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `callbridge_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Alle Callbridge-Prometheus-Metriken
#[derive(Clone)]
pub struct CallbridgeMetrics {
    pub registry: Arc<Registry>,

    // Signaling-Metriken
    pub online_users: IntGauge,
    pub active_calls: IntGauge,
    pub open_connections: IntGauge,
    pub connections_total: IntCounter,
    pub calls_initiated_total: IntCounter,
    pub calls_failed_total: IntCounterVec,
    pub candidates_relayed_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl CallbridgeMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Signaling-Metriken ---
        let online_users = IntGauge::with_opts(Opts::new(
            "callbridge_online_users",
            "Anzahl registrierter Benutzer",
        ))?;
        registry.register(Box::new(online_users.clone()))?;

        let active_calls = IntGauge::with_opts(Opts::new(
            "callbridge_active_calls",
            "Anzahl angefragter und aktiver Anrufe",
        ))?;
        registry.register(Box::new(active_calls.clone()))?;

        let open_connections = IntGauge::with_opts(Opts::new(
            "callbridge_open_connections",
            "Anzahl offener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(open_connections.clone()))?;

        let connections_total = IntCounter::with_opts(Opts::new(
            "callbridge_connections_total",
            "Gesamtanzahl angenommener WebSocket-Verbindungen",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let calls_initiated_total = IntCounter::with_opts(Opts::new(
            "callbridge_calls_initiated_total",
            "Gesamtanzahl gestarteter Anrufe",
        ))?;
        registry.register(Box::new(calls_initiated_total.clone()))?;

        let calls_failed_total = IntCounterVec::new(
            Opts::new(
                "callbridge_calls_failed_total",
                "Gesamtanzahl abgewiesener Anrufversuche",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(calls_failed_total.clone()))?;

        let candidates_relayed_total = IntCounter::with_opts(Opts::new(
            "callbridge_candidates_relayed_total",
            "Gesamtanzahl weitergeleiteter Verbindungskandidaten",
        ))?;
        registry.register(Box::new(candidates_relayed_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "callbridge_http_requests_total",
                "Gesamtanzahl HTTP-Anfragen",
            ),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "callbridge_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
            ]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            online_users,
            active_calls,
            open_connections,
            connections_total,
            calls_initiated_total,
            calls_failed_total,
            candidates_relayed_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: CallbridgeMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<CallbridgeMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = CallbridgeMetrics::neu().unwrap();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauges_setzen() {
        let metriken = CallbridgeMetrics::neu().unwrap();
        metriken.online_users.set(3);
        metriken.active_calls.set(1);
        assert_eq!(metriken.online_users.get(), 3);
        assert_eq!(metriken.active_calls.get(), 1);
    }

    #[test]
    fn fehlgeschlagene_anrufe_nach_grund() {
        let metriken = CallbridgeMetrics::neu().unwrap();
        metriken
            .calls_failed_total
            .with_label_values(&["busy"])
            .inc();
        metriken
            .calls_failed_total
            .with_label_values(&["busy"])
            .inc();
        assert_eq!(
            metriken.calls_failed_total.with_label_values(&["busy"]).get(),
            2
        );
        assert_eq!(
            metriken
                .calls_failed_total
                .with_label_values(&["unavailable"])
                .get(),
            0
        );
    }

    #[test]
    fn metriken_export_prometheus_format() {
        let metriken = CallbridgeMetrics::neu().unwrap();
        metriken.online_users.set(5);
        metriken.candidates_relayed_total.inc();

        let output = metriken.exportieren().unwrap();
        assert!(output.contains("callbridge_online_users 5"));
        assert!(output.contains("callbridge_candidates_relayed_total 1"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn alle_metriken_in_registry_registriert() {
        let metriken = CallbridgeMetrics::neu().unwrap();

        // Vec-Metriken erscheinen in gather() erst nach dem ersten Label-Zugriff
        metriken
            .calls_failed_total
            .with_label_values(&["self"])
            .inc();
        metriken
            .http_requests_total
            .with_label_values(&["GET", "/health", "200"])
            .inc();
        metriken
            .http_request_duration_seconds
            .with_label_values(&["GET", "/health"])
            .observe(0.01);

        let families = metriken.registry.gather();
        let namen: Vec<&str> = families.iter().map(|f| f.get_name()).collect();

        for name in [
            "callbridge_online_users",
            "callbridge_active_calls",
            "callbridge_open_connections",
            "callbridge_connections_total",
            "callbridge_calls_initiated_total",
            "callbridge_calls_failed_total",
            "callbridge_candidates_relayed_total",
            "callbridge_http_requests_total",
            "callbridge_http_request_duration_seconds",
        ] {
            assert!(namen.contains(&name), "{name} fehlt");
        }
    }
}
