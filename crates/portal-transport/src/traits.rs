use bytes::Bytes;

use crate::state::TransportState;

/// Receives notifications from a [`SocketTransport`](crate::SocketTransport).
///
/// Both callbacks run on the transport's receive worker (or on the thread
/// calling `start()`/`close()` for transitions made there), one at a time and
/// in order. Implementations must not block for long: the next receive cycle
/// waits for the callback to return.
///
/// The transport holds its observer through a `Weak` reference. Once the
/// observer is dropped, notifications are silently discarded.
pub trait TransportObserver: Send + Sync {
    /// The transport moved to `state`. Never called for a no-op transition.
    fn on_state_changed(&self, state: TransportState);

    /// Bytes arrived from the peer, exactly as read from the socket.
    fn on_data_received(&self, data: Bytes);
}
