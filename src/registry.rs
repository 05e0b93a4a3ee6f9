//! Pending-request registry and correlation id generation.
//!
//! One structure owns everything the execution contexts share: the
//! outbound FIFO, the awaiting-acknowledgment set, and the sequence
//! counter. The engine wraps it in a single `tokio::sync::Mutex`; the
//! transmit path holds that lock across the write so "remove from
//! outbound, insert into awaiting" is atomic with respect to dispatch.
//!
//! Handler-generated sends are spawned tasks that feed the same outbound
//! queue, so lock acquisition depth never exceeds one.

use tokio::sync::oneshot;

use crate::protocol::InboundMessage;
use crate::request::RequestRecord;

/// An awaiting-set entry: the acknowledgment side of one in-flight call.
pub struct Waiter {
    /// Correlation sequence number.
    pub seq: u32,
    /// Command code of the originating request (diagnostics).
    pub cmd: u32,
    /// Rendezvous producer half.
    pub tx: oneshot::Sender<InboundMessage>,
}

/// Shared engine state: outbound queue, awaiting set, sequence counter.
pub struct Registry {
    outbound: std::collections::VecDeque<RequestRecord>,
    awaiting: Vec<Waiter>,
    next_seq: u32,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            outbound: std::collections::VecDeque::new(),
            awaiting: Vec::new(),
            next_seq: 0,
        }
    }

    /// Produce the next correlation sequence number (wrapping).
    ///
    /// Wraps are tolerated: concurrency is capped far below the counter's
    /// range, so a sequence is never live twice.
    pub fn next_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    /// Append a record to the outbound queue.
    pub fn push_outbound(&mut self, record: RequestRecord) {
        self.outbound.push_back(record);
    }

    /// Pop the next record queued for transmission.
    pub fn pop_outbound(&mut self) -> Option<RequestRecord> {
        self.outbound.pop_front()
    }

    /// Move a written record's rendezvous into the awaiting set.
    ///
    /// Called by the transmit path immediately after the frame write,
    /// while still holding the registry lock.
    pub fn register_waiter(&mut self, mut record: RequestRecord) {
        debug_assert!(record.expect_ack);
        if let Some(tx) = record.rendezvous.take() {
            self.awaiting.push(Waiter {
                seq: record.seq,
                cmd: record.cmd,
                tx,
            });
        }
    }

    /// Find and remove the awaiting entry matching `seq`.
    ///
    /// At most one match can exist: a sequence is only reused after its
    /// entry has been removed.
    pub fn match_and_remove(&mut self, seq: u32) -> Option<Waiter> {
        let at = self.awaiting.iter().position(|w| w.seq == seq)?;
        Some(self.awaiting.swap_remove(at))
    }

    /// Forced removal by sequence from whichever collection holds the
    /// request (timeout and cleanup paths). Returns whether anything was
    /// removed.
    pub fn remove(&mut self, seq: u32) -> bool {
        if let Some(at) = self.outbound.iter().position(|r| r.seq == seq) {
            self.outbound.remove(at);
            return true;
        }
        if let Some(at) = self.awaiting.iter().position(|w| w.seq == seq) {
            self.awaiting.swap_remove(at);
            return true;
        }
        false
    }

    /// Records queued for transmission.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Requests awaiting an acknowledgment.
    pub fn awaiting_len(&self) -> usize {
        self.awaiting.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
