use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::codec::{DataPacket, FramerConfig};
use crate::error::{FrameError, Result};
use crate::framer::StreamFramer;

/// Default read size for [`UnitReader`]: 64 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Reads complete units from any `Read` source.
///
/// Handles partial reads internally. The final unit of a finite source is never
/// terminated by a start code, so it is reported through
/// [`FrameError::EndOfStream`] rather than returned.
pub struct UnitReader<R> {
    inner: R,
    framer: StreamFramer,
    ready: VecDeque<DataPacket>,
    chunk: Vec<u8>,
}

impl<R: Read> UnitReader<R> {
    /// Create a new unit reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FramerConfig::default(), DEFAULT_READ_CHUNK_SIZE)
    }

    /// Create a new unit reader with explicit framer configuration and read size.
    pub fn with_config(inner: R, config: FramerConfig, read_chunk_size: usize) -> Self {
        Self {
            inner,
            framer: StreamFramer::with_config(config),
            ready: VecDeque::new(),
            chunk: vec![0; read_chunk_size.max(1)],
        }
    }

    /// Read the next complete unit (blocking).
    ///
    /// Returns `Err(FrameError::EndOfStream)` once the source is exhausted and
    /// every terminated unit has been returned.
    pub fn read_unit(&mut self) -> Result<DataPacket> {
        loop {
            if let Some(packet) = self.ready.pop_front() {
                return Ok(packet);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::EndOfStream {
                    trailing: self.framer.buffered_len(),
                });
            }

            let packets = self.framer.process_data(&self.chunk[..read]);
            self.ready.extend(packets);
        }
    }

    /// Bytes of the pending, unterminated unit.
    pub fn trailing(&self) -> &[u8] {
        self.framer.buffered()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current framer configuration.
    pub fn config(&self) -> &FramerConfig {
        self.framer.config()
    }
}
