use std::net::SocketAddr;

use crate::state::TransportState;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The host is not a dotted-decimal IPv4 literal.
    #[error("invalid IPv4 address literal: {host:?}")]
    InvalidHost { host: String },

    /// The port is outside 1-65535.
    #[error("port {port} out of range (expected 1-65535)")]
    InvalidPort { port: u32 },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote end closed the connection (zero-byte read).
    #[error("peer closed the connection")]
    PeerClosed,

    /// The kernel accepted only part of the payload.
    #[error("short write ({written} of {expected} bytes)")]
    ShortWrite { written: usize, expected: usize },

    /// The operation requires a connected transport.
    #[error("transport is not connected (state: {0})")]
    NotConnected(TransportState),

    /// `start()` was called on a transport that is already connected.
    #[error("transport is already connected")]
    AlreadyConnected,

    /// The socket has been closed; the transport cannot be restarted.
    #[error("transport closed")]
    Closed,

    /// The receive worker thread could not be spawned.
    #[error("failed to spawn receive worker: {0}")]
    Spawn(std::io::Error),
}

impl TransportError {
    /// True for malformed host or port: retrying the same target cannot succeed.
    pub fn is_address_error(&self) -> bool {
        matches!(self, Self::InvalidHost { .. } | Self::InvalidPort { .. })
    }

    /// True for failures worth another connect attempt before the deadline.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
