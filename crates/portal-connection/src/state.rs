use std::fmt;

use portal_transport::TransportState;

/// Application-visible state of a [`ConnectionManager`](crate::ConnectionManager).
///
/// Derived from the transport's state plus the outcome of connect retries.
/// `FailedToConnect` means the deadline ran out; `ImpossibleToConnect` means
/// the target itself is malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    FailedToConnect,
    ImpossibleToConnect,
    Errored,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::FailedToConnect => "failed-to-connect",
            Self::ImpossibleToConnect => "impossible-to-connect",
            Self::Errored => "errored",
        }
    }

    /// Map a transport notification onto the manager's current state.
    ///
    /// Returns `None` when the notification does not change anything: a
    /// transport `Connected` only counts while the manager is `Connecting`,
    /// and transport `Connecting` is internal to the manager's own attempt.
    pub fn on_transport(self, transport: TransportState) -> Option<Self> {
        match transport {
            TransportState::Disconnected => Some(Self::Disconnected),
            TransportState::Errored => Some(Self::Errored),
            TransportState::Connected if self == Self::Connecting => Some(Self::Connected),
            TransportState::Connected | TransportState::Connecting => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_connected_only_promotes_connecting() {
        assert_eq!(
            ConnectionState::Connecting.on_transport(TransportState::Connected),
            Some(ConnectionState::Connected)
        );
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connected,
            ConnectionState::FailedToConnect,
            ConnectionState::ImpossibleToConnect,
            ConnectionState::Errored,
        ] {
            assert_eq!(state.on_transport(TransportState::Connected), None);
        }
    }

    #[test]
    fn transport_errors_and_closes_always_propagate() {
        assert_eq!(
            ConnectionState::Connected.on_transport(TransportState::Errored),
            Some(ConnectionState::Errored)
        );
        assert_eq!(
            ConnectionState::Connecting.on_transport(TransportState::Disconnected),
            Some(ConnectionState::Disconnected)
        );
        assert_eq!(
            ConnectionState::Connecting.on_transport(TransportState::Connecting),
            None
        );
    }

    #[test]
    fn display_is_kebab_case() {
        assert_eq!(ConnectionState::FailedToConnect.to_string(), "failed-to-connect");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
