use bytes::{BufMut, Bytes, BytesMut};

use crate::kind::{DEFAULT_TAG, PACKET_VERSION, VIDEO};

/// Canonical start code written in front of every emitted unit.
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// Three-byte start code variant accepted on input.
pub const SHORT_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Bytes needed before the framer attempts an extraction.
pub const MIN_BUFFERED: usize = 4;

/// Default initial capacity of the framer's buffer: 64 KiB.
pub const DEFAULT_INITIAL_CAPACITY: usize = 64 * 1024;

/// How close to the end of the buffer a start code may be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanBound {
    /// Recognize a start code as soon as all of its bytes are buffered.
    #[default]
    Inclusive,
    /// Only check positions with at least four bytes remaining, so a
    /// three-byte start code ending on the last buffered byte waits for one
    /// more byte. Matches the emission timing of older receivers.
    Conservative,
}

/// Configuration for [`StreamFramer`](crate::StreamFramer).
#[derive(Debug, Clone)]
pub struct FramerConfig {
    /// Start-code recognition at the tail of the buffer.
    pub scan_bound: ScanBound,
    /// Initial buffer capacity in bytes. Default: 64 KiB.
    pub initial_capacity: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            scan_bound: ScanBound::default(),
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

/// One delimited unit, ready for a downstream dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    /// Packet format version. Always [`PACKET_VERSION`].
    pub version: u32,
    /// Packet kind, e.g. [`VIDEO`].
    pub kind: u32,
    /// Correlation tag.
    pub tag: u32,
    /// The unit, prefixed with [`START_CODE`].
    pub payload: Bytes,
}

impl DataPacket {
    /// Build a video packet from unit bytes (without any start code).
    pub fn video(unit: &[u8]) -> Self {
        let mut payload = BytesMut::with_capacity(START_CODE.len() + unit.len());
        payload.put_slice(&START_CODE);
        payload.put_slice(unit);

        Self {
            version: PACKET_VERSION,
            kind: VIDEO,
            tag: DEFAULT_TAG,
            payload: payload.freeze(),
        }
    }

    /// The unit bytes without the canonical start code.
    pub fn unit(&self) -> &[u8] {
        self.payload.get(START_CODE.len()..).unwrap_or_default()
    }
}

/// Width of the start code at the head of `buf`: 3 if `buf[2] == 1`, else 4.
///
/// `buf` must hold at least three bytes and begin at a start code. Any other
/// head yields a width of 4 and undefined unit boundaries.
pub fn start_code_len(buf: &[u8]) -> usize {
    if buf[2] == 0x01 {
        SHORT_START_CODE.len()
    } else {
        START_CODE.len()
    }
}

/// Find the first start code at or after `from`.
///
/// Returns the offset of its first byte. A four-byte code is reported at its
/// leading zero, so the byte before a three-byte code is never mistaken for
/// unit data when it is also zero.
pub fn find_start_code(buf: &[u8], from: usize, bound: ScanBound) -> Option<usize> {
    let len = buf.len();
    let mut i = from;

    match bound {
        ScanBound::Inclusive => {
            while i + 2 < len {
                if buf[i] == 0 && buf[i + 1] == 0 {
                    if buf[i + 2] == 1 {
                        return Some(i);
                    }
                    if buf[i + 2] == 0 && i + 3 < len && buf[i + 3] == 1 {
                        return Some(i);
                    }
                }
                i += 1;
            }
        }
        ScanBound::Conservative => {
            while i + 3 < len {
                if buf[i] == 0
                    && buf[i + 1] == 0
                    && (buf[i + 2] == 1 || (buf[i + 2] == 0 && buf[i + 3] == 1))
                {
                    return Some(i);
                }
                i += 1;
            }
        }
    }

    None
}
