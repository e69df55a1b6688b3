//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `CB_LOG_LEVEL`: Log-Level oder Filter-Direktive, Standard: info
//! - `CB_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// `CB_LOG_LEVEL` und `CB_LOG_FORMAT` haben Vorrang vor den uebergebenen
/// Werten aus der Konfiguration.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("CB_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = log_format_aus_env().unwrap_or_else(|| format.to_string());

    match format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Log-Format aus der Umgebung, falls gesetzt und gueltig
pub fn log_format_aus_env() -> Option<String> {
    std::env::var("CB_LOG_FORMAT")
        .ok()
        .filter(|f| log_format_gueltig(f))
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    #[test]
    fn log_format_aus_env_ungueltig_wird_ignoriert() {
        std::env::set_var("CB_LOG_FORMAT", "xml");
        assert_eq!(log_format_aus_env(), None);
        std::env::set_var("CB_LOG_FORMAT", "json");
        assert_eq!(log_format_aus_env().as_deref(), Some("json"));
        std::env::remove_var("CB_LOG_FORMAT");
        assert_eq!(log_format_aus_env(), None);
    }
}
