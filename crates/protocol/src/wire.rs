//! Wire-Format fuer WebSocket-Verbindungen
//!
//! Ein Ereignis pro Text-Frame, kodiert als JSON-Umschlag. Die Frame-Grenzen
//! liefert bereits WebSocket, daher gibt es kein eigenes Laengen-Feld.
//! Eingehende Frames werden vor dem Parsen gegen die maximale Groesse
//! geprueft, damit grosse Payloads nie in den Zustand gelangen. Ausgehende
//! Ereignisse sind nicht begrenzt: eine Online-Liste mit vielen Benutzern
//! darf groesser sein als jeder einzelne Client-Frame.

use callbridge_core::error::{CallbridgeError, Result};

use crate::control::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (64 KB; SDP-Offers liegen weit darunter)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// Kodiert und dekodiert Signaling-Ereignisse als JSON-Text-Frames
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Dekodiert einen eingehenden Text-Frame
    ///
    /// # Fehler
    /// - `NachrichtZuGross` wenn der Frame das Limit ueberschreitet
    /// - `UngueltigeNachricht` bei ungueltigem JSON, unbekanntem Ereignis
    ///   oder fehlenden Feldern
    pub fn decode(&self, text: &str) -> Result<ClientEvent> {
        if text.len() > self.max_frame_size {
            return Err(CallbridgeError::NachrichtZuGross {
                groesse: text.len(),
                maximum: self.max_frame_size,
            });
        }

        serde_json::from_str(text).map_err(|e| {
            CallbridgeError::UngueltigeNachricht(format!(
                "JSON-Deserialisierung fehlgeschlagen: {e}"
            ))
        })
    }

    /// Kodiert ein ausgehendes Ereignis als Text-Frame
    ///
    /// Das Frame-Limit gilt nur fuer eingehende Frames.
    pub fn encode(&self, event: &ServerEvent) -> Result<String> {
        serde_json::to_string(event).map_err(|e| {
            CallbridgeError::intern(format!("JSON-Serialisierung fehlgeschlagen: {e}"))
        })
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{CallInitiated, RelayedCandidate, RosterEntry};
    use callbridge_core::types::{CallId, UserId, UserStatus};

    #[test]
    fn frame_codec_dekodiert_end_call() {
        let codec = FrameCodec::new();
        let call_id = CallId::new();
        let text = format!(r#"{{"event":"end-call","data":{{"callId":"{}"}}}}"#, call_id.0);

        let event = codec.decode(&text).unwrap();
        match event {
            ClientEvent::EndCall(req) => assert_eq!(req.call_id, call_id),
            anderes => panic!("Erwartet EndCall, erhalten {}", anderes.name()),
        }
    }

    #[test]
    fn frame_codec_ablehnung_zu_grosser_frame() {
        let codec = FrameCodec::with_max_size(100);
        let text = format!(
            r#"{{"event":"register","data":{{"userId":"a","name":"{}"}}}}"#,
            "x".repeat(200)
        );

        let result = codec.decode(&text);
        assert!(matches!(
            result,
            Err(CallbridgeError::NachrichtZuGross { maximum: 100, .. })
        ));
    }

    #[test]
    fn frame_codec_ungueltiges_json() {
        let codec = FrameCodec::new();
        let result = codec.decode("{nicht json");
        assert!(matches!(result, Err(CallbridgeError::UngueltigeNachricht(_))));
    }

    #[test]
    fn frame_codec_fehlende_pflichtfelder() {
        let codec = FrameCodec::new();
        // targetUserId fehlt
        let result = codec.decode(r#"{"event":"initiate-call","data":{"offer":{}}}"#);
        assert!(matches!(result, Err(CallbridgeError::UngueltigeNachricht(_))));
    }

    #[test]
    fn frame_codec_encode_erzeugt_umschlag() {
        let codec = FrameCodec::new();
        let call_id = CallId::new();
        let text = codec
            .encode(&ServerEvent::CallInitiated(CallInitiated { call_id }))
            .unwrap();

        let wert: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(wert["event"], "call-initiated");
        assert_eq!(wert["data"]["callId"], call_id.0.to_string());
    }

    #[test]
    fn frame_codec_encode_ohne_frame_limit() {
        let codec = FrameCodec::with_max_size(10);
        let event = ServerEvent::IceCandidate(RelayedCandidate {
            candidate: serde_json::json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.1 5000 typ host"}),
            sender_id: UserId::from("alice"),
        });

        let text = codec.encode(&event).unwrap();
        assert!(text.len() > codec.max_frame_size());
    }

    #[test]
    fn frame_codec_encode_grosse_online_liste() {
        let codec = FrameCodec::new();
        let roster: Vec<RosterEntry> = (0..1024)
            .map(|i| RosterEntry {
                id: UserId::from(format!("benutzer-{i:04}").as_str()),
                name: format!("Benutzer Nummer {i}"),
                languages: vec!["de".into(), "en".into(), "fr".into()],
                status: UserStatus::Available,
                last_seen: 1_700_000_000_000,
            })
            .collect();

        let text = codec.encode(&ServerEvent::UserListUpdated(roster)).unwrap();
        assert!(text.len() > DEFAULT_MAX_FRAME_SIZE);
        assert!(text.starts_with(r#"{"event":"user-list-updated""#));
    }

    #[test]
    fn frame_codec_default_max_size() {
        let codec = FrameCodec::new();
        assert_eq!(codec.max_frame_size(), DEFAULT_MAX_FRAME_SIZE);
    }
}
