//! Incremental Annex-B framing for elementary streams.
//!
//! Units in an Annex-B stream carry no length prefix. Each one starts with a
//! start code, either `00 00 01` or `00 00 00 01`, and runs until the next
//! start code. [`StreamFramer`] accepts the stream in arbitrary chunks and
//! returns every unit whose end is known, each re-prefixed with the canonical
//! 4-byte start code. Output does not depend on how the input was chunked.
//!
//! The last unit of a stream stays buffered until another start code
//! arrives: there is no flush.

pub mod codec;
pub mod error;
pub mod framer;
pub mod kind;
pub mod reader;

pub use codec::{
    find_start_code, start_code_len, DataPacket, FramerConfig, ScanBound,
    DEFAULT_INITIAL_CAPACITY, MIN_BUFFERED, SHORT_START_CODE, START_CODE,
};
pub use error::{FrameError, Result};
pub use framer::StreamFramer;
pub use kind::{kind_name, AUDIO, DEFAULT_TAG, PACKET_VERSION, VIDEO};
pub use reader::{UnitReader, DEFAULT_READ_CHUNK_SIZE};
