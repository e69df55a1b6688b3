//! Fehlertypen fuer Callbridge
//!
//! Zentraler Fehler-Enum fuer crate-uebergreifende Fehlerzustaende.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Callbridge
pub type Result<T> = std::result::Result<T, CallbridgeError>;

/// Crate-uebergreifende Fehler im Callbridge-System
#[derive(Debug, Error)]
pub enum CallbridgeError {
    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Nachricht zu gross: {groesse} Bytes (Maximum: {maximum} Bytes)")]
    NachrichtZuGross { groesse: usize, maximum: usize },

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl CallbridgeError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = CallbridgeError::UngueltigeNachricht("fehlendes Feld".into());
        assert_eq!(e.to_string(), "Ungueltige Nachricht: fehlendes Feld");
    }

    #[test]
    fn zu_gross_fehler() {
        let e = CallbridgeError::NachrichtZuGross {
            groesse: 200,
            maximum: 100,
        };
        assert!(e.to_string().contains("200 Bytes"));
        assert!(e.to_string().contains("100 Bytes"));
    }

    #[test]
    fn interner_fehler() {
        let e = CallbridgeError::intern("Serialisierung");
        assert_eq!(e.to_string(), "Interner Fehler: Serialisierung");
    }
}
