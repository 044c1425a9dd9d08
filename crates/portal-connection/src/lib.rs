//! Device connection management.
//!
//! [`ConnectionManager`] turns a host/port target into a running
//! [`SocketTransport`](portal_transport::SocketTransport), retrying refused
//! or failed connects until a short deadline, and re-exposes a simplified
//! state machine to its observer. [`DeviceSession`] adds an Annex-B framer
//! on top and hands complete units to a [`PacketHandler`].
//!
//! Nothing here reconnects on its own. After `FailedToConnect` or `Errored`
//! the caller decides whether to call `connect()` again.

pub mod error;
pub mod state;
pub mod traits;

#[cfg(unix)]
pub mod manager;
#[cfg(unix)]
pub mod session;

pub use error::{ConnectionError, Result};
pub use state::ConnectionState;
pub use traits::{ConnectionObserver, PacketHandler};

#[cfg(unix)]
pub use manager::{
    ConnectionConfig, ConnectionManager, DEFAULT_CONNECT_DEADLINE, DEFAULT_RETRY_INTERVAL,
};
#[cfg(unix)]
pub use session::DeviceSession;
