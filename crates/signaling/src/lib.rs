//! callbridge-signaling – WebSocket-Signaling fuer Eins-zu-Eins-Anrufe
//!
//! Dieser Crate verwaltet die Online-Liste, den Lebenszyklus von Anrufen
//! und leitet Verbindungskandidaten zwischen den Teilnehmern weiter. Medien
//! fliessen nie ueber den Server.
//!
//! ## Architektur
//!
//! ```text
//! GET /ws (signaling_router)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- presence_handler (register, update-status, heartbeat)
//!     +-- call_handler     (initiate, accept, reject, end)
//!     +-- relay_handler    (ice-candidate)
//!     |
//!     v
//! SignalingState::mit_hub  – ein Mutex um den gesamten Zustand
//!     |
//!     v
//! SignalingHub
//!     +-- PresenceRegistry   – Wer ist online, mit welchem Status
//!     +-- CallManager        – Anrufe, Anruf-Index, RelayGroups
//!     +-- ConnectionGateway  – Verbindung -> Benutzer
//!
//! EventBroadcaster – Send-Queues aller Verbindungen
//! ```

pub mod broadcast;
pub mod calls;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod hub;
pub mod presence;
pub mod relay;
pub mod server_state;
pub mod ws;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use calls::{CallManager, CallSession, CallState};
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use hub::SignalingHub;
pub use presence::PresenceRegistry;
pub use server_state::{SignalingConfig, SignalingState};
pub use ws::signaling_router;
