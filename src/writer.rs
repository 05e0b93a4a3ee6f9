//! Transmit path: drains the outbound queue onto the transport.
//!
//! The drain runs under the registry lock so that "remove from outbound,
//! write, insert into awaiting" is atomic with respect to dispatch: an
//! acknowledgment racing the write cannot observe a request that is in
//! neither collection. A write failure is reported but the record is still
//! moved or destroyed; a dead transport must not leak requests (the waiter
//! simply times out).

use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::EngineInner;
use crate::protocol::build_frame;
use crate::transport::TransportTx;

/// Write every queued record, then release the lock.
pub(crate) async fn drain_outbound<T: TransportTx>(inner: &Arc<EngineInner>, tx: &mut T) {
    let mut registry = inner.registry.lock().await;
    while let Some(record) = registry.pop_outbound() {
        let frame = build_frame(&record.header(), &record.payload);
        if let Err(error) = tx.write(&frame, record.mask).await {
            warn!(seq = record.seq, cmd = record.cmd, %error, "transport write failed");
        }
        if record.expect_ack {
            registry.register_waiter(record);
        }
        // No-ack records are dropped here, after the write.
    }
}

/// Dedicated transmit loop: wakes on the outbound signal and drains.
pub(crate) async fn tx_loop<T: TransportTx>(inner: Arc<EngineInner>, mut tx: T) {
    debug!("transmit loop started");
    loop {
        inner.tx_signal.notified().await;
        drain_outbound(&inner, &mut tx).await;
    }
}
