//! Packet kinds and fixed packet metadata.
//!
//! Kinds below 100 are unassigned. The framer only produces [`VIDEO`];
//! [`AUDIO`] is reserved for a parallel audio path that feeds the same
//! downstream dispatcher.

/// Format version stamped on every packet.
pub const PACKET_VERSION: u32 = 1;

/// Video elementary-stream unit.
pub const VIDEO: u32 = 101;

/// Audio unit (reserved; not produced by the framer).
pub const AUDIO: u32 = 102;

/// Correlation tag stamped on framer output.
pub const DEFAULT_TAG: u32 = 0;

/// Returns a human-readable name for a packet kind.
pub fn kind_name(kind: u32) -> &'static str {
    match kind {
        VIDEO => "VIDEO",
        AUDIO => "AUDIO",
        _ => "UNKNOWN",
    }
}
