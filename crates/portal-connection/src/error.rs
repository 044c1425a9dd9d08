use std::time::Duration;

use portal_transport::TransportError;

use crate::state::ConnectionState;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The target host or port is malformed. Retrying cannot help.
    #[error("invalid device address: {0}")]
    Address(#[source] TransportError),

    /// No connect attempt succeeded before the deadline.
    #[error("no connection within {deadline:?} after {attempts} attempt(s){}", last_suffix(.last))]
    ConnectTimeout {
        deadline: Duration,
        attempts: u32,
        last: Option<TransportError>,
    },

    /// `connect()` was called while a connection attempt is in progress.
    #[error("connection attempt already in progress")]
    AlreadyConnecting,

    /// The operation requires a connected device.
    #[error("device is not connected (state: {0})")]
    NotConnected(ConnectionState),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

fn last_suffix(last: &Option<TransportError>) -> String {
    match last {
        Some(err) => format!(": {err}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
