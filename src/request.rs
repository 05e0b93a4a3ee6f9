//! Per-call configuration and the in-flight request record.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::protocol::{ControlTag, Header, InboundMessage};

/// Configuration for a single [`Engine::perform`](crate::Engine::perform)
/// call.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// Command code.
    pub cmd: u32,
    /// Control tag placed in the outbound header.
    pub ctrl: ControlTag,
    /// Error code placed in the outbound header (meaningful on acks).
    pub err: u8,
    /// Sequence number to reuse. Only consulted when `ctrl` is an
    /// acknowledgment-class tag, i.e. when this call replies to a peer's
    /// request; originating calls get a fresh sequence from the engine.
    pub seq: u32,
    /// Whether to block for a correlated acknowledgment.
    pub expect_ack: bool,
    /// Retransmissions on rendezvous timeout before giving up.
    pub retry: u16,
    /// Rendezvous wait bound; `None` uses the engine default.
    pub timeout: Option<Duration>,
    /// Routing mask handed to the transport write.
    pub mask: u32,
    /// Source address byte.
    #[cfg(feature = "addressing")]
    pub src: u8,
    /// Destination address byte.
    #[cfg(feature = "addressing")]
    pub dst: u8,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            cmd: 0,
            ctrl: ControlTag::Req,
            err: 0,
            seq: 0,
            expect_ack: false,
            retry: 0,
            timeout: None,
            mask: 0,
            #[cfg(feature = "addressing")]
            src: 0,
            #[cfg(feature = "addressing")]
            dst: 0,
        }
    }
}

impl CallConfig {
    /// A request that blocks for its acknowledgment.
    pub fn request(cmd: u32) -> Self {
        Self {
            cmd,
            ctrl: ControlTag::Req,
            expect_ack: true,
            ..Default::default()
        }
    }

    /// A fire-and-forget notification.
    pub fn notify(cmd: u32) -> Self {
        Self {
            cmd,
            ctrl: ControlTag::Notify,
            ..Default::default()
        }
    }

    /// An acknowledgment replying to `msg`: same sequence, command advanced
    /// to its acknowledgment variant, no further ack expected.
    pub fn ack_for(msg: &InboundMessage) -> Self {
        Self {
            cmd: msg.cmd().wrapping_add(1),
            ctrl: ControlTag::ReqAck,
            seq: msg.seq(),
            ..Default::default()
        }
    }

    /// Set the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the retransmission count.
    pub fn retry(mut self, retry: u16) -> Self {
        self.retry = retry;
        self
    }
}

/// The unit of in-flight state for one outbound call.
///
/// Created by the call orchestrator, queued for transmission, then either
/// dropped by the transmit path (`expect_ack == false`) or converted into
/// an awaiting-set entry once its frame has been written. The rendezvous
/// producer half lives here; the caller keeps the consumer half, so at
/// most one acknowledgment can ever be delivered.
pub struct RequestRecord {
    /// Correlation sequence number.
    pub seq: u32,
    /// Command code.
    pub cmd: u32,
    /// Control tag.
    pub ctrl: ControlTag,
    /// Error code for the header.
    pub err: u8,
    /// Owned payload, length bounded by the engine's `buffer_size`.
    pub payload: Bytes,
    /// Whether an acknowledgment is expected.
    pub expect_ack: bool,
    /// Retransmissions remaining (policy, consumed by the orchestrator).
    pub retry: u16,
    /// Resolved rendezvous wait bound.
    pub timeout: Duration,
    /// Routing mask for the transport write.
    pub mask: u32,
    /// Source address byte.
    #[cfg(feature = "addressing")]
    pub src: u8,
    /// Destination address byte.
    #[cfg(feature = "addressing")]
    pub dst: u8,
    /// Rendezvous producer half, present iff `expect_ack`.
    pub rendezvous: Option<oneshot::Sender<InboundMessage>>,
}

impl RequestRecord {
    /// Build a record from a call configuration.
    pub fn new(
        conf: &CallConfig,
        seq: u32,
        payload: Bytes,
        default_timeout: Duration,
        rendezvous: Option<oneshot::Sender<InboundMessage>>,
    ) -> Self {
        debug_assert_eq!(conf.expect_ack, rendezvous.is_some());
        Self {
            seq,
            cmd: conf.cmd,
            ctrl: conf.ctrl,
            err: conf.err,
            payload,
            expect_ack: conf.expect_ack,
            retry: conf.retry,
            timeout: conf.timeout.unwrap_or(default_timeout),
            mask: conf.mask,
            #[cfg(feature = "addressing")]
            src: conf.src,
            #[cfg(feature = "addressing")]
            dst: conf.dst,
            rendezvous,
        }
    }

    /// Header for this record's outbound frame.
    pub fn header(&self) -> Header {
        #[allow(unused_mut)]
        let mut header = Header::new(
            self.ctrl,
            self.err,
            self.seq,
            self.cmd,
            self.payload.len() as u16,
        );
        #[cfg(feature = "addressing")]
        {
            header.src = self.src;
            header.dst = self.dst;
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Header;

    #[test]
    fn request_config_defaults() {
        let conf = CallConfig::request(9);
        assert_eq!(conf.cmd, 9);
        assert_eq!(conf.ctrl, ControlTag::Req);
        assert!(conf.expect_ack);
        assert_eq!(conf.retry, 0);
        assert!(conf.timeout.is_none());
    }

    #[test]
    fn notify_config_is_fire_and_forget() {
        let conf = CallConfig::notify(4);
        assert_eq!(conf.ctrl, ControlTag::Notify);
        assert!(!conf.expect_ack);
    }

    #[test]
    fn ack_for_reuses_sequence_and_advances_command() {
        let header = Header::new(ControlTag::Req, 0, 77, 10, 0);
        let msg = InboundMessage::new(header, Bytes::new());
        let conf = CallConfig::ack_for(&msg);

        assert_eq!(conf.seq, 77);
        assert_eq!(conf.cmd, 11);
        assert_eq!(conf.ctrl, ControlTag::ReqAck);
        assert!(!conf.expect_ack);
    }

    #[test]
    fn record_header_matches_fields() {
        let conf = CallConfig::request(5);
        let (tx, _rx) = oneshot::channel();
        let record = RequestRecord::new(
            &conf,
            3,
            Bytes::from_static(b"abc"),
            Duration::from_secs(5),
            Some(tx),
        );

        let header = record.header();
        assert_eq!(header.seq, 3);
        assert_eq!(header.cmd, 5);
        assert_eq!(header.len, 3);
        assert_eq!(header.tag(), Some(ControlTag::Req));
    }

    #[test]
    fn record_resolves_default_timeout() {
        let conf = CallConfig::notify(1);
        let record = RequestRecord::new(&conf, 0, Bytes::new(), Duration::from_secs(5), None);
        assert_eq!(record.timeout, Duration::from_secs(5));

        let conf = CallConfig::notify(1).timeout(Duration::from_millis(50));
        let record = RequestRecord::new(&conf, 0, Bytes::new(), Duration::from_secs(5), None);
        assert_eq!(record.timeout, Duration::from_millis(50));
    }
}
