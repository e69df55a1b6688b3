//! Fehlertypen fuer den Signaling-Service
//!
//! Nur Fehler die dem Client als `call-error` gemeldet werden sind hier
//! modelliert. Unbekannte Anrufe oder Benutzer sind keine Fehler sondern
//! stille No-ops.

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Angerufener ist nicht online
    #[error("Ziel nicht verfuegbar: {0}")]
    ZielNichtVerfuegbar(String),

    /// Angerufener ist online, seine Send-Queue nimmt aber nichts mehr an
    #[error("Ziel nicht erreichbar: {0}")]
    ZielNichtErreichbar(String),

    /// Angerufener ist bereits in einem Anruf
    #[error("Ziel besetzt: {0}")]
    ZielBesetzt(String),

    /// Anrufer ist selbst bereits in einem Anruf
    #[error("Anrufer bereits in einem Anruf")]
    AnruferBesetzt,

    /// Anrufer und Angerufener sind identisch
    #[error("Anruf an sich selbst")]
    SelbstAnruf,

    /// Verbindung hat sich noch nicht registriert
    #[error("Verbindung nicht registriert")]
    NichtRegistriert,

    /// Leere oder ungueltige User-ID bei der Registrierung
    #[error("Ungueltige User-ID: {0:?}")]
    UngueltigeUserId(String),
}

impl SignalingError {
    /// Text der dem Client im `call-error`-Ereignis gemeldet wird
    pub fn client_nachricht(&self) -> &'static str {
        match self {
            Self::ZielNichtVerfuegbar(_) | Self::ZielNichtErreichbar(_) => "User not available",
            Self::ZielBesetzt(_) => "User is busy",
            Self::AnruferBesetzt => "Already in a call",
            Self::SelbstAnruf => "Cannot call yourself",
            Self::NichtRegistriert => "Not registered",
            Self::UngueltigeUserId(_) => "Invalid user id",
        }
    }

    /// Label fuer `callbridge_calls_failed_total`
    pub fn metrik_label(&self) -> &'static str {
        match self {
            Self::ZielNichtVerfuegbar(_) => "unavailable",
            Self::ZielNichtErreichbar(_) => "unreachable",
            Self::ZielBesetzt(_) => "busy",
            Self::AnruferBesetzt => "caller_busy",
            Self::SelbstAnruf => "self_call",
            Self::NichtRegistriert => "not_registered",
            Self::UngueltigeUserId(_) => "invalid_user",
        }
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_nachrichten() {
        assert_eq!(
            SignalingError::ZielNichtVerfuegbar("ghost".into()).client_nachricht(),
            "User not available"
        );
        assert_eq!(
            SignalingError::ZielBesetzt("bob".into()).client_nachricht(),
            "User is busy"
        );
    }
}
