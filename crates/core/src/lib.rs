//! callbridge-core – Gemeinsame Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Callbridge-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{CallbridgeError, Result};
pub use types::{zeitstempel_ms, CallId, ConnectionId, UserId, UserStatus};
