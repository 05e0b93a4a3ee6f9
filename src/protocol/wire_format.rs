//! Wire format encoding and decoding.
//!
//! Implements the fixed header carried by every frame:
//!
//! ```text
//! ┌───────┬───────┬──────────┬──────────┬──────────┐
//! │ Ctrl  │ Err   │ Seq      │ Cmd      │ Length   │
//! │ 1 byte│ 1 byte│ 4 bytes  │ 4 bytes  │ 2 bytes  │
//! │       │       │ u32 BE   │ u32 BE   │ u16 BE   │
//! └───────┴───────┴──────────┴──────────┴──────────┘
//! ```
//!
//! With the `addressing` feature, two routing bytes (`src`, `dst`) are
//! prepended to the header.
//!
//! A full frame on the wire is `SYNC | header | payload | crc8`, where the
//! CRC covers header and payload. All multi-byte integers are Big Endian.

/// Sync byte marking the start of every frame.
pub const FRAME_SYNC: u8 = 0xA5;

/// Header size in bytes.
#[cfg(not(feature = "addressing"))]
pub const HEADER_SIZE: usize = 12;
/// Header size in bytes (with routing bytes).
#[cfg(feature = "addressing")]
pub const HEADER_SIZE: usize = 14;

/// Frame overhead beyond the payload: sync byte, header, CRC trailer.
pub const FRAME_OVERHEAD: usize = 1 + HEADER_SIZE + 1;

/// Mask selecting the control tag from the attribute byte (5 low bits).
pub const CTRL_TAG_MASK: u8 = 0x1F;

/// Control tag identifying the role of a message.
///
/// The wire value occupies the 5 low bits of the header's attribute byte;
/// the upper 3 bits are reserved and ignored on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlTag {
    /// Request expecting a `ReqAck` reply.
    Req = 0,
    /// Response expecting an `RspAck` reply.
    Rsp = 1,
    /// Fire-and-forget notification.
    Notify = 2,
    /// Acknowledgment of a `Req`.
    ReqAck = 3,
    /// Acknowledgment of an `Rsp`.
    RspAck = 4,
    /// Acknowledgment of a `Notify`.
    NotiAck = 5,
    /// Response that is itself a request to the peer.
    RspReq = 6,
}

impl ControlTag {
    /// Decode a control tag from the attribute byte.
    ///
    /// Returns `None` for the reserved tag values 7..=31; receiving one is
    /// a protocol violation handled by the dispatcher.
    pub fn from_wire(attr: u8) -> Option<Self> {
        match attr & CTRL_TAG_MASK {
            0 => Some(Self::Req),
            1 => Some(Self::Rsp),
            2 => Some(Self::Notify),
            3 => Some(Self::ReqAck),
            4 => Some(Self::RspAck),
            5 => Some(Self::NotiAck),
            6 => Some(Self::RspReq),
            _ => None,
        }
    }

    /// Wire value of this tag.
    #[inline]
    pub fn wire(self) -> u8 {
        self as u8
    }

    /// True for acknowledgment-class tags (`ReqAck`, `RspAck`, `NotiAck`).
    #[inline]
    pub fn is_ack(self) -> bool {
        matches!(self, Self::ReqAck | Self::RspAck | Self::NotiAck)
    }

    /// True for the fire-and-forget notification tag.
    #[inline]
    pub fn is_notify(self) -> bool {
        matches!(self, Self::Notify)
    }

    /// True for request-class tags that may want a reply from the
    /// application handler (`Req`, `Rsp`, `RspReq`).
    #[inline]
    pub fn is_request_class(self) -> bool {
        matches!(self, Self::Req | Self::Rsp | Self::RspReq)
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Source address.
    #[cfg(feature = "addressing")]
    pub src: u8,
    /// Destination address.
    #[cfg(feature = "addressing")]
    pub dst: u8,
    /// Attribute byte; low 5 bits are the control tag.
    pub ctrl: u8,
    /// Error code carried alongside acknowledgments.
    pub err: u8,
    /// Correlation sequence number.
    pub seq: u32,
    /// Command code.
    pub cmd: u32,
    /// Payload length in bytes.
    pub len: u16,
}

impl Header {
    /// Create a new header. Routing bytes default to zero.
    pub fn new(ctrl: ControlTag, err: u8, seq: u32, cmd: u32, len: u16) -> Self {
        Self {
            #[cfg(feature = "addressing")]
            src: 0,
            #[cfg(feature = "addressing")]
            dst: 0,
            ctrl: ctrl.wire(),
            err,
            seq,
            cmd,
            len,
        }
    }

    /// Control tag parsed from the attribute byte, if recognized.
    #[inline]
    pub fn tag(&self) -> Option<ControlTag> {
        ControlTag::from_wire(self.ctrl)
    }

    /// Encode header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is smaller than [`HEADER_SIZE`].
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        let mut at = 0;
        #[cfg(feature = "addressing")]
        {
            buf[0] = self.src;
            buf[1] = self.dst;
            at = 2;
        }
        buf[at] = self.ctrl;
        buf[at + 1] = self.err;
        buf[at + 2..at + 6].copy_from_slice(&self.seq.to_be_bytes());
        buf[at + 6..at + 10].copy_from_slice(&self.cmd.to_be_bytes());
        buf[at + 10..at + 12].copy_from_slice(&self.len.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Returns `None` if the buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        #[cfg(feature = "addressing")]
        let (src, dst, at) = (buf[0], buf[1], 2usize);
        #[cfg(not(feature = "addressing"))]
        let at = 0usize;
        Some(Self {
            #[cfg(feature = "addressing")]
            src,
            #[cfg(feature = "addressing")]
            dst,
            ctrl: buf[at],
            err: buf[at + 1],
            seq: u32::from_be_bytes([buf[at + 2], buf[at + 3], buf[at + 4], buf[at + 5]]),
            cmd: u32::from_be_bytes([buf[at + 6], buf[at + 7], buf[at + 8], buf[at + 9]]),
            len: u16::from_be_bytes([buf[at + 10], buf[at + 11]]),
        })
    }
}

/// CRC-8 with polynomial 0x07, zero init, no final xor.
///
/// Covers the header and payload of every frame; a mismatch on receive
/// causes the frame buffer to discard and resynchronize.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_encode_decode_roundtrip() {
        let original = Header::new(ControlTag::Req, 0, 42, 100, 5);
        let encoded = original.encode();
        let decoded = Header::decode(&encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[cfg(not(feature = "addressing"))]
    #[test]
    fn header_big_endian_byte_order() {
        let header = Header {
            ctrl: 0x01,
            err: 0x02,
            seq: 0x04050607,
            cmd: 0x08090A0B,
            len: 0x0C0D,
        };
        let bytes = header.encode();

        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x02);
        assert_eq!(&bytes[2..6], &[0x04, 0x05, 0x06, 0x07]);
        assert_eq!(&bytes[6..10], &[0x08, 0x09, 0x0A, 0x0B]);
        assert_eq!(&bytes[10..12], &[0x0C, 0x0D]);
    }

    #[test]
    fn decode_too_short_buffer() {
        let buf = [0u8; HEADER_SIZE - 1];
        assert!(Header::decode(&buf).is_none());
    }

    #[test]
    fn control_tag_wire_values() {
        assert_eq!(ControlTag::Req.wire(), 0);
        assert_eq!(ControlTag::Rsp.wire(), 1);
        assert_eq!(ControlTag::Notify.wire(), 2);
        assert_eq!(ControlTag::ReqAck.wire(), 3);
        assert_eq!(ControlTag::RspAck.wire(), 4);
        assert_eq!(ControlTag::NotiAck.wire(), 5);
        assert_eq!(ControlTag::RspReq.wire(), 6);
    }

    #[test]
    fn control_tag_ack_class() {
        assert!(ControlTag::ReqAck.is_ack());
        assert!(ControlTag::RspAck.is_ack());
        assert!(ControlTag::NotiAck.is_ack());
        assert!(!ControlTag::Req.is_ack());
        assert!(!ControlTag::Rsp.is_ack());
        assert!(!ControlTag::Notify.is_ack());
        assert!(!ControlTag::RspReq.is_ack());
    }

    #[test]
    fn every_tag_has_exactly_one_class() {
        for tag in [
            ControlTag::Req,
            ControlTag::Rsp,
            ControlTag::Notify,
            ControlTag::ReqAck,
            ControlTag::RspAck,
            ControlTag::NotiAck,
            ControlTag::RspReq,
        ] {
            let classes =
                [tag.is_ack(), tag.is_notify(), tag.is_request_class()];
            assert_eq!(
                classes.iter().filter(|&&c| c).count(),
                1,
                "{tag:?} must fall into exactly one dispatch class"
            );
        }
    }

    #[test]
    fn control_tag_masks_reserved_high_bits() {
        // Upper 3 bits of the attribute byte are not part of the tag.
        assert_eq!(ControlTag::from_wire(0xE0), Some(ControlTag::Req));
        assert_eq!(ControlTag::from_wire(0x23), Some(ControlTag::ReqAck));
    }

    #[test]
    fn control_tag_rejects_reserved_values() {
        for v in 7u8..=31 {
            assert_eq!(ControlTag::from_wire(v), None, "tag {v} should be invalid");
        }
    }

    #[test]
    fn crc8_known_values() {
        assert_eq!(crc8(&[]), 0x00);
        // CRC-8/SMBUS check value for "123456789".
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn crc8_detects_single_bit_flip() {
        let mut data = b"hello framecall".to_vec();
        let good = crc8(&data);
        data[3] ^= 0x10;
        assert_ne!(crc8(&data), good);
    }
}
