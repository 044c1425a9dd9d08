use std::fmt;

/// Connection state of a [`SocketTransport`](crate::SocketTransport).
///
/// ```text
/// Disconnected --start--> Connecting --first receive--> Connected
///      ^                      |                             |
///      +------ close ---------+------- fatal error ---------+--> Errored
/// ```
///
/// `Errored` is terminal: a transport never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl TransportState {
    /// Returns true for states no transition may leave.
    pub fn is_terminal(self) -> bool {
        self == Self::Errored
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
