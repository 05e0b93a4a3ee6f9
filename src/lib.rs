//! Embedded-style request/response RPC engine over framed byte transports.
//!
//! `framecall` correlates outbound requests with inbound acknowledgments by
//! sequence number, bounds concurrency with an admission controller, and
//! delivers peer-initiated traffic to application handlers. The wire format
//! is a sync-delimited frame with a fixed binary header and a CRC-8
//! trailer; payloads are opaque bytes, with a MsgPack codec layered on top
//! for typed calls.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use framecall::{DuplexTransport, Engine};
//!
//! # async fn demo() {
//! let (transport, _peer) = DuplexTransport::duplex(1024);
//! let engine = Engine::builder()
//!     .on_request(|msg| async move {
//!         Some(Bytes::from(format!("echo {}", msg.cmd())))
//!     })
//!     .start(transport)
//!     .unwrap();
//!
//! let reply = engine.request(0x10, Bytes::from_static(b"ping")).await;
//! # let _ = reply;
//! # }
//! ```

mod admission;
mod codec;
mod dispatch;
mod engine;
mod error;
mod handlers;
pub mod protocol;
mod registry;
mod request;
pub mod transport;
mod writer;

pub use codec::MsgPackCodec;
pub use engine::{
    Engine, EngineBuilder, EngineConfig, TxMode, DEFAULT_BUFFER_SIZE, DEFAULT_TASK_STACK_SIZE,
    DEFAULT_WAIT_TIMEOUT, MAX_CONCURRENT_REQUESTS, TASK_STACK_CEILING,
};
pub use error::{FramecallError, Result};
pub use handlers::{BoxFuture, NotifyHandler, RequestHandler};
pub use protocol::{ControlTag, Header, InboundMessage};
pub use request::CallConfig;
pub use transport::{DuplexTransport, IoTransport, Transport, TransportRx, TransportTx};
