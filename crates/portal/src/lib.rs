//! Resilient device transport and Annex-B stream framing.
//!
//! portal connects to a single remote device over TCP, keeps a background
//! receive loop running, and cuts the incoming elementary stream into
//! start-code-delimited units.
//!
//! # Crate Structure
//!
//! - [`transport`]: Threaded TCP transport with a 4-state connection machine
//! - [`frame`]: Incremental Annex-B framer and blocking unit reader
//! - [`connection`]: Deadline-bounded connect retries and framed device
//!   sessions (behind `connection` feature)

/// Re-export transport types.
pub mod transport {
    pub use portal_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use portal_frame::*;
}

/// Re-export connection types (requires `connection` feature).
#[cfg(feature = "connection")]
pub mod connection {
    pub use portal_connection::*;
}
