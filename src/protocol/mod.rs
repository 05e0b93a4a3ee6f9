//! Protocol module - wire format, framing, and the inbound message type.
//!
//! - Fixed header with control tag, error code, correlation sequence and
//!   command code
//! - Frame building (`SYNC | header | payload | crc8`)
//! - Frame buffer with CRC validation and resynchronization for lossy links

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{build_frame, InboundMessage};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    crc8, ControlTag, Header, CTRL_TAG_MASK, FRAME_OVERHEAD, FRAME_SYNC, HEADER_SIZE,
};
