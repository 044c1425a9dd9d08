use bytes::Bytes;
use portal_frame::DataPacket;

use crate::state::ConnectionState;

/// Receives notifications from a [`ConnectionManager`](crate::ConnectionManager).
///
/// Called on the transport's receive worker, or on the thread running
/// `connect()`/`disconnect()` for transitions made there. Deliveries are
/// serialized. Held through a `Weak` reference.
pub trait ConnectionObserver: Send + Sync {
    fn on_state_changed(&self, state: ConnectionState);

    /// Raw bytes from the device, unframed.
    fn on_data_received(&self, data: Bytes);
}

/// Consumes units produced by a [`DeviceSession`](crate::DeviceSession).
pub trait PacketHandler: Send + Sync {
    /// One complete unit, in stream order.
    fn on_packet(&self, packet: DataPacket);

    fn on_state_changed(&self, _state: ConnectionState) {}
}
