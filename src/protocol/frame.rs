//! Frame building and the decoded inbound message type.
//!
//! A frame on the wire is `SYNC | header | payload | crc8`. Payloads are
//! opaque to the engine and carried as `bytes::Bytes` for zero-copy,
//! single-owner handoff.

use bytes::Bytes;

use super::wire_format::{crc8, Header, FRAME_OVERHEAD, FRAME_SYNC};

/// A decoded inbound message.
///
/// Created by the receive path once a complete, CRC-valid frame has been
/// accumulated; consumed exactly once by the dispatcher: delivered into a
/// waiting caller's rendezvous slot, handed to an application handler, or
/// dropped.
#[derive(Debug)]
pub struct InboundMessage {
    /// Parsed header.
    pub header: Header,
    /// Opaque application payload.
    pub payload: Bytes,
}

impl InboundMessage {
    /// Create a message from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Correlation sequence number.
    #[inline]
    pub fn seq(&self) -> u32 {
        self.header.seq
    }

    /// Command code.
    #[inline]
    pub fn cmd(&self) -> u32 {
        self.header.cmd
    }

    /// Error code carried by the header.
    #[inline]
    pub fn err(&self) -> u8 {
        self.header.err
    }
}

/// Build a complete wire frame: sync byte, header, payload, CRC trailer.
///
/// The header's `len` field must match `payload.len()`; the engine's
/// transmit path guarantees this.
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    debug_assert_eq!(header.len as usize, payload.len());
    let mut buf = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    buf.push(FRAME_SYNC);
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf.push(crc8(&buf[1..]));
    buf
}
