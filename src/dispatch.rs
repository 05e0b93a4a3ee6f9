//! Inbound message dispatch.
//!
//! Classifies each decoded message by control tag and routes it:
//! acknowledgments rendezvous with the waiting caller, notifications and
//! requests go to the application handlers. Handlers run in spawned tasks;
//! a handler that wants to answer feeds the engine's own submission queue
//! instead of re-entering the dispatcher, so registry lock depth stays
//! bounded at one.
//!
//! Every inbound message is consumed exactly once on every path: moved
//! into a rendezvous slot, moved into a handler, or dropped here.

use std::sync::Arc;

use tracing::{debug, error};

use crate::engine::{perform_call, EngineInner};
use crate::protocol::InboundMessage;
use crate::request::CallConfig;

/// Route one inbound message.
pub(crate) async fn dispatch(inner: &Arc<EngineInner>, msg: InboundMessage) {
    let Some(tag) = msg.header.tag() else {
        // The decode collaborator is producing malformed tags; fatal in
        // debug builds, drop-and-log in release.
        debug_assert!(
            false,
            "unrecognized control tag {:#04x}",
            msg.header.ctrl
        );
        error!(ctrl = msg.header.ctrl, seq = msg.seq(), "unrecognized control tag, dropping frame");
        return;
    };

    if tag.is_ack() {
        deliver_ack(inner, msg).await;
    } else if tag.is_notify() {
        match &inner.notify_handler {
            Some(handler) => {
                debug!(cmd = msg.cmd(), seq = msg.seq(), "notify");
                tokio::spawn(handler(msg));
            }
            None => debug!(cmd = msg.cmd(), "no notify handler registered, dropping"),
        }
    } else if tag.is_request_class() {
        // Req, Rsp, RspReq: a command from the peer that may want a reply.
        match &inner.request_handler {
            Some(handler) => {
                debug!(cmd = msg.cmd(), seq = msg.seq(), "request");
                let reply_conf = CallConfig::ack_for(&msg);
                let fut = handler(msg);
                let inner = inner.clone();
                tokio::spawn(async move {
                    if let Some(reply) = fut.await {
                        // Fire-and-forget; bypasses admission by carrying
                        // expect_ack = false.
                        let _ = perform_call(&inner, reply_conf, reply).await;
                    }
                });
            }
            None => debug!(cmd = msg.cmd(), "no request handler registered, dropping"),
        }
    }
}

/// Match an acknowledgment against the awaiting set and hand it to the
/// blocked caller.
async fn deliver_ack(inner: &Arc<EngineInner>, msg: InboundMessage) {
    let seq = msg.seq();
    let waiter = inner.registry.lock().await.match_and_remove(seq);
    match waiter {
        Some(waiter) => {
            debug!(seq, cmd = msg.cmd(), "acknowledgment matched waiter");
            if waiter.tx.send(msg).is_err() {
                // The caller's wait resolved (timeout) between match and
                // delivery; a protocol/timing race, not fatal.
                debug!(seq, "waiter gone before delivery, dropping acknowledgment");
            }
        }
        None => {
            // Late or spurious acknowledgment; discarding is idempotent.
            debug!(seq, cmd = msg.cmd(), "no waiter for acknowledgment, discarding");
        }
    }
}
