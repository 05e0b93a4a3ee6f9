//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. Unlike a clean
//! stream protocol, the transports this engine targets (serial links,
//! shared buses) can drop or corrupt bytes, so the buffer never treats a
//! malformed frame as fatal: it logs, discards up to the next sync byte
//! and resynchronizes. A candidate frame is only consumed once its CRC
//! checks out.

use bytes::BytesMut;
use tracing::{debug, warn};

use super::frame::InboundMessage;
use super::wire_format::{crc8, Header, FRAME_OVERHEAD, FRAME_SYNC, HEADER_SIZE};

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Maximum allowed payload length, from the engine's `buffer_size`.
    max_payload: usize,
}

impl FrameBuffer {
    /// Create a frame buffer with the given payload bound.
    pub fn new(max_payload: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            max_payload,
        }
    }

    /// Push raw transport bytes and extract all complete, CRC-valid frames.
    ///
    /// Partial data is retained for the next push. Corrupt data is skipped
    /// with a log line; no error is surfaced (receive-side anomalies are
    /// diagnostics, not failures).
    pub fn push(&mut self, data: &[u8]) -> Vec<InboundMessage> {
        self.buffer.extend_from_slice(data);

        let mut messages = Vec::new();
        loop {
            // Scan to the next sync byte, dropping any leading junk.
            let skipped = self
                .buffer
                .iter()
                .position(|&b| b == FRAME_SYNC)
                .unwrap_or(self.buffer.len());
            if skipped > 0 {
                debug!(skipped, "discarding bytes before sync");
                let _ = self.buffer.split_to(skipped);
            }

            if self.buffer.len() < 1 + HEADER_SIZE {
                return messages;
            }

            let header = Header::decode(&self.buffer[1..1 + HEADER_SIZE])
                .expect("buffer holds a full header");

            if header.len as usize > self.max_payload {
                warn!(
                    len = header.len,
                    max = self.max_payload,
                    "frame length exceeds payload bound, resyncing"
                );
                let _ = self.buffer.split_to(1);
                continue;
            }

            let total = FRAME_OVERHEAD + header.len as usize;
            if self.buffer.len() < total {
                return messages;
            }

            let expected = crc8(&self.buffer[1..total - 1]);
            if expected != self.buffer[total - 1] {
                warn!(
                    seq = header.seq,
                    cmd = header.cmd,
                    "frame CRC mismatch, resyncing"
                );
                let _ = self.buffer.split_to(1);
                continue;
            }

            let _ = self.buffer.split_to(1 + HEADER_SIZE);
            let payload = self.buffer.split_to(header.len as usize).freeze();
            let _ = self.buffer.split_to(1); // CRC trailer
            messages.push(InboundMessage::new(header, payload));
        }
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::build_frame;
    use crate::protocol::wire_format::ControlTag;

    fn frame(seq: u32, cmd: u32, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(ControlTag::Req, 0, seq, cmd, payload.len() as u16);
        build_frame(&header, payload)
    }

    #[test]
    fn extract_single_frame() {
        let mut buf = FrameBuffer::new(256);
        let msgs = buf.push(&frame(1, 5, b"hello"));
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].seq(), 1);
        assert_eq!(msgs[0].cmd(), 5);
        assert_eq!(&msgs[0].payload[..], b"hello");
        assert_eq!(buf.buffered(), 0);
    }

    #[test]
    fn extract_multiple_frames_one_push() {
        let mut buf = FrameBuffer::new(256);
        let mut bytes = Vec::new();
        for i in 1u32..=4 {
            bytes.extend(frame(i, 10 + i, b"x"));
        }
        let msgs = buf.push(&bytes);
        assert_eq!(msgs.len(), 4);
        for (i, msg) in msgs.iter().enumerate() {
            assert_eq!(msg.seq(), (i + 1) as u32);
        }
    }

    #[test]
    fn fragmented_frame_across_pushes() {
        let mut buf = FrameBuffer::new(256);
        let bytes = frame(7, 2, b"fragmented payload");

        assert!(buf.push(&bytes[..4]).is_empty());
        assert!(buf.push(&bytes[4..HEADER_SIZE + 3]).is_empty());
        let msgs = buf.push(&bytes[HEADER_SIZE + 3..]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(&msgs[0].payload[..], b"fragmented payload");
    }

    #[test]
    fn leading_junk_is_skipped() {
        let mut buf = FrameBuffer::new(256);
        let mut bytes = vec![0x00, 0x12, 0x34];
        bytes.extend(frame(3, 8, b"ok"));
        let msgs = buf.push(&bytes);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].seq(), 3);
    }

    #[test]
    fn crc_mismatch_resyncs_to_next_frame() {
        let mut buf = FrameBuffer::new(256);
        let mut bad = frame(1, 5, b"corrupt");
        let n = bad.len();
        // Break the CRC with a value that cannot alias the sync byte.
        bad[n - 1] = if bad[n - 1] == 0x00 { 0x01 } else { 0x00 };
        bad.extend(frame(2, 6, b"good"));

        let msgs = buf.push(&bad);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].seq(), 2);
        assert_eq!(&msgs[0].payload[..], b"good");
    }

    #[test]
    fn oversized_length_resyncs() {
        let mut buf = FrameBuffer::new(8);
        let mut bytes = frame(1, 5, b"way too long for the bound");
        let n = bytes.len();
        bytes[n - 1] = 0x00; // keep the trailer from aliasing the sync byte
        bytes.extend(frame(2, 6, b"fits"));
        let msgs = buf.push(&bytes);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].seq(), 2);
    }

    #[test]
    fn empty_payload_frame() {
        let mut buf = FrameBuffer::new(256);
        let header = Header::new(ControlTag::ReqAck, 0, 9, 6, 0);
        let msgs = buf.push(&build_frame(&header, b""));
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].payload.is_empty());
    }
}
