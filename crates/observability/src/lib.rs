//! # callbridge-observability
//!
//! Observability-Crate fuer Callbridge:
//! - Prometheus-kompatible Metriken (`/metrics`)
//! - Health-Check (`/health`) und Status-Seite (`/`)
//! - Structured Logging via tracing-subscriber
//! - Request-Timing Middleware

pub mod health;
pub mod logging;
pub mod metrics;
pub mod middleware;

pub use health::{health_router, HealthResponse, HealthStatus, StatusQuelle};
pub use logging::logging_initialisieren;
pub use metrics::{metrics_router, CallbridgeMetrics};
pub use middleware::{request_timing_layer, timing_middleware};

use axum::Router;
use std::sync::Arc;

/// Router mit allen Observability-Endpunkten
///
/// - `GET /metrics` – Prometheus scrape format
/// - `GET /health`  – Health-Check JSON
/// - `GET /`        – Status-Seite
pub fn observability_router(quelle: Arc<dyn StatusQuelle>, metriken: CallbridgeMetrics) -> Router {
    Router::new()
        .merge(metrics_router(metriken))
        .merge(health_router(quelle))
}
