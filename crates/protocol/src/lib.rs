//! callbridge-protocol – Signaling-Protokoll-Definitionen
//!
//! Dieses Crate definiert alle Ereignisse, die zwischen Client und Server
//! ueber die WebSocket-Verbindung ausgetauscht werden, sowie deren
//! Text-Frame-Kodierung.

pub mod control;
pub mod wire;

pub use control::{ClientEvent, RosterEntry, ServerEvent};
pub use wire::FrameCodec;
