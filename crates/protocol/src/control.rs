//! Signaling-Ereignisse (WebSocket, JSON)
//!
//! Definiert alle Ereignisse die zwischen Client und Server ausgetauscht
//! werden.
//!
//! ## Design
//! - Umschlag: `{"event": "<name>", "data": {...}}`
//! - Ereignisnamen in kebab-case, Feldnamen in camelCase
//! - Offer, Answer und Candidates sind opake JSON-Werte und werden
//!   unveraendert weitergereicht

use callbridge_core::types::{CallId, UserId, UserStatus};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Registrierung unter einer selbst gewaehlten User-ID
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Status-Aenderung des eigenen Benutzers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

/// Anruf an einen anderen Online-Benutzer starten
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateCallRequest {
    pub target_user_id: UserId,
    pub offer: serde_json::Value,
    #[serde(default)]
    pub language: Option<String>,
}

/// Eingehenden Anruf annehmen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptCallRequest {
    pub call_id: CallId,
    pub answer: serde_json::Value,
}

/// Eingehenden Anruf ablehnen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectCallRequest {
    pub call_id: CallId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Verbindungskandidat fuer die Gegenseite
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateRequest {
    pub call_id: CallId,
    pub candidate: serde_json::Value,
}

/// Laufenden oder angefragten Anruf beenden
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndCallRequest {
    pub call_id: CallId,
}

/// Alle Ereignisse die ein Client senden darf
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Register(RegisterRequest),
    UpdateStatus(UpdateStatusRequest),
    InitiateCall(InitiateCallRequest),
    AcceptCall(AcceptCallRequest),
    RejectCall(RejectCallRequest),
    IceCandidate(IceCandidateRequest),
    EndCall(EndCallRequest),
    /// Lebenszeichen, aktualisiert nur `lastSeen`
    Heartbeat,
}

impl ClientEvent {
    /// Ereignisname fuer Logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::Register(_) => "register",
            Self::UpdateStatus(_) => "update-status",
            Self::InitiateCall(_) => "initiate-call",
            Self::AcceptCall(_) => "accept-call",
            Self::RejectCall(_) => "reject-call",
            Self::IceCandidate(_) => "ice-candidate",
            Self::EndCall(_) => "end-call",
            Self::Heartbeat => "heartbeat",
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Ein Eintrag der Online-Liste (ohne Verbindungs-Handle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: UserId,
    pub name: String,
    pub languages: Vec<String>,
    pub status: UserStatus,
    pub last_seen: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingCall {
    pub call_id: CallId,
    pub caller_id: UserId,
    pub caller_name: String,
    pub offer: serde_json::Value,
    pub language: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInitiated {
    pub call_id: CallId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAccepted {
    pub call_id: CallId,
    pub answer: serde_json::Value,
    /// Der annehmende Benutzer
    pub target_user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRejected {
    pub call_id: CallId,
    pub reason: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnded {
    pub call_id: CallId,
    /// User-ID des Beendenden oder `"system"`
    pub ended_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallError {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayedCandidate {
    pub candidate: serde_json::Value,
    pub sender_id: UserId,
}

/// Alle Ereignisse die der Server sendet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserListUpdated(Vec<RosterEntry>),
    IncomingCall(IncomingCall),
    CallInitiated(CallInitiated),
    CallAccepted(CallAccepted),
    CallRejected(CallRejected),
    CallEnded(CallEnded),
    CallError(CallError),
    IceCandidate(RelayedCandidate),
    /// Die Identitaet wurde von einer neueren Verbindung uebernommen
    SessionReplaced,
}

impl ServerEvent {
    /// Erstellt eine Fehlermeldung fuer den Client
    pub fn error(message: impl Into<String>) -> Self {
        Self::CallError(CallError {
            message: message.into(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
