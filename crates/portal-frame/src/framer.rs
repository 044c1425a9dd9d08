use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::codec::{
    find_start_code, start_code_len, DataPacket, FramerConfig, MIN_BUFFERED, SHORT_START_CODE,
};

/// Incremental Annex-B framer.
///
/// Feed arbitrary chunks with [`process_data`](Self::process_data). Each call
/// returns the units completed by that chunk, in stream order. The first bytes
/// ever fed (and the first bytes after [`reset`](Self::reset)) must begin with
/// a start code.
///
/// Empty units, i.e. two start codes back to back, are dropped and the
/// redundant start code is consumed.
#[derive(Debug)]
pub struct StreamFramer {
    buf: BytesMut,
    config: FramerConfig,
    /// Scan origin for the current head unit. Positions before it were
    /// already checked against the buffered bytes.
    resume_at: usize,
}

impl StreamFramer {
    /// Create a framer with default configuration.
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    /// Create a framer with custom configuration.
    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(config.initial_capacity),
            config,
            resume_at: 0,
        }
    }

    /// Append `chunk` and return every unit whose terminating start code is
    /// now buffered.
    pub fn process_data(&mut self, chunk: &[u8]) -> Vec<DataPacket> {
        if !chunk.is_empty() {
            self.buf.extend_from_slice(chunk);
        }

        let mut packets = Vec::new();
        while let Some(packet) = self.next_packet() {
            packets.push(packet);
        }

        if !packets.is_empty() {
            trace!(
                units = packets.len(),
                buffered = self.buf.len(),
                "framer emitted units"
            );
        }
        packets
    }

    /// Extract the head unit if its end is known.
    ///
    /// Returns `None` when fewer than four bytes are buffered or no start code
    /// follows the head start code yet.
    pub fn next_packet(&mut self) -> Option<DataPacket> {
        loop {
            if self.buf.len() < MIN_BUFFERED {
                return None;
            }

            let head = start_code_len(&self.buf);
            let from = self.resume_at.max(head);

            let Some(next) = find_start_code(&self.buf, from, self.config.scan_bound) else {
                // Only the last three positions can still complete a code.
                self.resume_at = self
                    .buf
                    .len()
                    .saturating_sub(SHORT_START_CODE.len())
                    .max(head);
                return None;
            };

            self.resume_at = 0;

            if next == head {
                trace!(start_code = head, "dropping empty unit");
                self.buf.advance(head);
                continue;
            }

            let packet = DataPacket::video(&self.buf[head..next]);
            self.buf.advance(next);
            return Some(packet);
        }
    }

    /// Discard all buffered bytes. The next chunk must begin with a start code.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.resume_at = 0;
    }

    /// Bytes currently held, starting with the pending unit's start code.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes currently held.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// The framer's configuration.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;
    use proptest::sample::Index;

    use super::*;
    use crate::codec::ScanBound;

    fn framer(bound: ScanBound) -> StreamFramer {
        StreamFramer::with_config(FramerConfig {
            scan_bound: bound,
            initial_capacity: 0,
        })
    }

    fn bound() -> impl Strategy<Value = ScanBound> {
        prop_oneof![Just(ScanBound::Inclusive), Just(ScanBound::Conservative)]
    }

    /// Streams of start codes followed by arbitrary bytes.
    fn stream() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            (any::<bool>(), prop::collection::vec(any::<u8>(), 0..48)),
            1..10,
        )
        .prop_map(|units| {
            let mut out = Vec::new();
            for (long, body) in units {
                if long {
                    out.extend_from_slice(&[0, 0, 0, 1]);
                } else {
                    out.extend_from_slice(&[0, 0, 1]);
                }
                out.extend_from_slice(&body);
            }
            out
        })
    }

    fn feed(framer: &mut StreamFramer, data: &[u8], cuts: &[Index]) -> Vec<DataPacket> {
        let mut cuts: Vec<usize> = cuts.iter().map(|c| c.index(data.len() + 1)).collect();
        cuts.sort_unstable();

        let mut packets = Vec::new();
        let mut start = 0;
        for cut in cuts {
            packets.extend(framer.process_data(&data[start..cut]));
            start = cut;
        }
        packets.extend(framer.process_data(&data[start..]));
        packets
    }

    proptest! {
        #[test]
        fn chunking_does_not_change_output(
            data in stream(),
            cuts in prop::collection::vec(any::<Index>(), 0..8),
            bound in bound(),
        ) {
            let mut whole = framer(bound);
            let expected = whole.process_data(&data);

            let mut chunked = framer(bound);
            let got = feed(&mut chunked, &data, &cuts);

            prop_assert_eq!(got, expected);
            prop_assert_eq!(chunked.buffered(), whole.buffered());
        }

        #[test]
        fn pending_bytes_are_an_unconsumed_suffix(
            data in stream(),
            cuts in prop::collection::vec(any::<Index>(), 0..8),
        ) {
            let mut framer = framer(ScanBound::Inclusive);
            let packets = feed(&mut framer, &data, &cuts);

            prop_assert!(data.ends_with(framer.buffered()));
            let unit_bytes: usize = packets.iter().map(|p| p.unit().len()).sum();
            prop_assert!(unit_bytes + framer.buffered_len() <= data.len());
        }

        #[test]
        fn zero_free_units_are_recovered_exactly(
            bodies in prop::collection::vec(prop::collection::vec(1u8..=255, 1..48), 2..10),
            cuts in prop::collection::vec(any::<Index>(), 0..8),
        ) {
            let mut data = Vec::new();
            for (i, body) in bodies.iter().enumerate() {
                if i % 2 == 0 {
                    data.extend_from_slice(&[0, 0, 0, 1]);
                } else {
                    data.extend_from_slice(&[0, 0, 1]);
                }
                data.extend_from_slice(body);
            }

            let mut framer = framer(ScanBound::Inclusive);
            let got: Vec<Vec<u8>> = feed(&mut framer, &data, &cuts)
                .iter()
                .map(|p| p.unit().to_vec())
                .collect();

            prop_assert_eq!(&got[..], &bodies[..bodies.len() - 1]);
            prop_assert!(framer.buffered().ends_with(&bodies[bodies.len() - 1]));
        }
    }
}
