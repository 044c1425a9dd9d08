//! Threaded TCP transport for a single remote device.
//!
//! A [`SocketTransport`] owns one connected stream socket and one background
//! worker thread. The worker waits for readability with a bounded timeout,
//! reads whatever arrived, and reports bytes and state changes to a weakly
//! held [`TransportObserver`].
//!
//! This is the lowest layer of portal. Connection retrying lives in
//! `portal-connection`; unit framing lives in `portal-frame`.

pub mod error;
pub mod state;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod socket;
#[cfg(unix)]
mod sys;

pub use error::{Result, TransportError};
pub use state::TransportState;
pub use tcp::{connect, parse_target, MAX_PORT, MIN_PORT};
pub use traits::TransportObserver;

#[cfg(unix)]
pub use socket::{SocketTransport, TransportConfig, DEFAULT_POLL_TIMEOUT, DEFAULT_READ_CHUNK_SIZE};
