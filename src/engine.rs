//! Engine construction and the call orchestrator.
//!
//! [`EngineBuilder`] collects configuration and the two application
//! handlers, then [`start`](EngineBuilder::start) splits the transport and
//! spawns the service loops. [`Engine::perform`] is the synchronous-style
//! entry point: build a request record, queue it for transmission, and
//! optionally wait for the correlated acknowledgment with bounded
//! concurrency and timeout.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::admission::AdmissionController;
use crate::codec::MsgPackCodec;
use crate::dispatch::dispatch;
use crate::error::{FramecallError, Result};
use crate::handlers::{box_notify, box_request, NotifyHandler, RequestHandler};
use crate::protocol::{FrameBuffer, InboundMessage};
use crate::registry::Registry;
use crate::request::{CallConfig, RequestRecord};
use crate::transport::{Transport, TransportRx, TransportTx};
use crate::writer::{drain_outbound, tx_loop};

/// Payload buffer capacity when the configured size is zero.
pub const DEFAULT_BUFFER_SIZE: usize = 256;

/// Hard ceiling on concurrently in-flight acknowledgment-awaiting
/// requests; also the default when `max_request` is zero.
pub const MAX_CONCURRENT_REQUESTS: usize = 6;

/// Default execution-context stack size when configured as zero.
pub const DEFAULT_TASK_STACK_SIZE: usize = 4096;

/// Stack sizes at or above this are rejected at build time.
pub const TASK_STACK_CEILING: usize = 8192;

/// Default rendezvous wait bound when a call specifies none.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read chunk size for the receive loop.
const READ_CHUNK: usize = 4096;

/// How the transmit path is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxMode {
    /// A dedicated transmit task decouples write latency from receive
    /// processing.
    #[default]
    Dedicated,
    /// The receive loop also drains the outbound queue; one task services
    /// both directions.
    Combined,
}

/// Engine configuration. Zero values select defaults; out-of-range values
/// are clamped or rejected at build time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of each request's payload buffer; 0 selects
    /// [`DEFAULT_BUFFER_SIZE`].
    pub buffer_size: usize,
    /// Admission ceiling; 0 or anything above
    /// [`MAX_CONCURRENT_REQUESTS`] is clamped to it.
    pub max_request: usize,
    /// Execution-context stack sizing; 0 selects
    /// [`DEFAULT_TASK_STACK_SIZE`], values at or above
    /// [`TASK_STACK_CEILING`] fail the build. Advisory under green-thread
    /// scheduling; honored by integrations that spawn dedicated threads.
    pub task_stack_size: usize,
    /// Rendezvous wait bound for calls that specify none.
    pub default_timeout: Duration,
    /// Transmit scheduling strategy.
    pub tx_mode: TxMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_request: MAX_CONCURRENT_REQUESTS,
            task_stack_size: DEFAULT_TASK_STACK_SIZE,
            default_timeout: DEFAULT_WAIT_TIMEOUT,
            tx_mode: TxMode::Dedicated,
        }
    }
}

impl EngineConfig {
    /// Apply defaults and clamps; reject configurations that cannot be
    /// normalized.
    fn normalize(mut self) -> Result<Self> {
        if self.buffer_size == 0 {
            self.buffer_size = DEFAULT_BUFFER_SIZE;
        }
        if self.max_request == 0 || self.max_request > MAX_CONCURRENT_REQUESTS {
            self.max_request = MAX_CONCURRENT_REQUESTS;
        }
        if self.task_stack_size == 0 {
            self.task_stack_size = DEFAULT_TASK_STACK_SIZE;
        }
        if self.task_stack_size >= TASK_STACK_CEILING {
            return Err(FramecallError::Config(format!(
                "task_stack_size {} exceeds ceiling {}",
                self.task_stack_size, TASK_STACK_CEILING
            )));
        }
        Ok(self)
    }
}

/// Shared state behind every execution context.
pub(crate) struct EngineInner {
    pub(crate) cfg: EngineConfig,
    /// Outbound queue, awaiting set and sequence counter under one lock.
    pub(crate) registry: Mutex<Registry>,
    pub(crate) admission: AdmissionController,
    /// Wakes the transmit path when the outbound queue gains a record.
    pub(crate) tx_signal: Notify,
    pub(crate) notify_handler: Option<NotifyHandler>,
    pub(crate) request_handler: Option<RequestHandler>,
}

/// Builder for configuring and starting an [`Engine`].
pub struct EngineBuilder {
    config: EngineConfig,
    notify_handler: Option<NotifyHandler>,
    request_handler: Option<RequestHandler>,
}

impl EngineBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            notify_handler: None,
            request_handler: None,
        }
    }

    /// Set the payload buffer capacity (0 selects the default).
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    /// Set the admission ceiling (0 or too large is clamped).
    pub fn max_request(mut self, max: usize) -> Self {
        self.config.max_request = max;
        self
    }

    /// Set the execution-context stack size (validated at build).
    pub fn task_stack_size(mut self, size: usize) -> Self {
        self.config.task_stack_size = size;
        self
    }

    /// Set the default rendezvous wait bound.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    /// Select the transmit scheduling strategy.
    pub fn tx_mode(mut self, mode: TxMode) -> Self {
        self.config.tx_mode = mode;
        self
    }

    /// Register the callback for inbound notification-class messages.
    pub fn on_notify<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.notify_handler = Some(box_notify(handler));
        self
    }

    /// Register the callback for inbound request-class messages. A
    /// `Some(payload)` return becomes an outbound acknowledgment.
    pub fn on_request<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Option<Bytes>> + Send + 'static,
    {
        self.request_handler = Some(box_request(handler));
        self
    }

    /// Validate configuration, split the transport and spawn the service
    /// loops.
    pub fn start<T: Transport>(self, transport: T) -> Result<Engine> {
        let config = self.config.normalize()?;
        let inner = Arc::new(EngineInner {
            admission: AdmissionController::new(config.max_request),
            registry: Mutex::new(Registry::new()),
            tx_signal: Notify::new(),
            notify_handler: self.notify_handler,
            request_handler: self.request_handler,
            cfg: config,
        });

        let (tx, rx) = transport.split();
        let mut tasks = Vec::new();
        match inner.cfg.tx_mode {
            TxMode::Dedicated => {
                tasks.push(tokio::spawn(tx_loop(inner.clone(), tx)));
                tasks.push(tokio::spawn(rx_loop(inner.clone(), rx)));
            }
            TxMode::Combined => {
                tasks.push(tokio::spawn(combined_loop(inner.clone(), tx, rx)));
            }
        }

        Ok(Engine { inner, tasks })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running RPC engine instance.
pub struct Engine {
    inner: Arc<EngineInner>,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Create an engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Issue a call. Returns the acknowledgment payload for successful
    /// `expect_ack` calls; `None` on fire-and-forget submission, resource
    /// exhaustion, timeout or command mismatch. Failures never corrupt
    /// engine state or leak admission slots.
    pub async fn perform(&self, conf: CallConfig, payload: Bytes) -> Option<Bytes> {
        perform_call(&self.inner, conf, payload).await.ok().flatten()
    }

    /// Like [`perform`](Self::perform), but failures come back as
    /// structured errors instead of an absent response: `SlotsExhausted`,
    /// `Timeout`, `Protocol` (oversized payload or acknowledgment command
    /// mismatch), `ConnectionClosed`. `Ok(None)` is a fire-and-forget
    /// submission.
    pub async fn try_perform(&self, conf: CallConfig, payload: Bytes) -> Result<Option<Bytes>> {
        perform_call(&self.inner, conf, payload).await
    }

    /// Issue a request that blocks for its acknowledgment.
    pub async fn request(&self, cmd: u32, payload: Bytes) -> Option<Bytes> {
        self.perform(CallConfig::request(cmd), payload).await
    }

    /// Send a fire-and-forget notification.
    pub async fn notify(&self, cmd: u32, payload: Bytes) {
        let _ = self.perform(CallConfig::notify(cmd), payload).await;
    }

    /// Typed request: MsgPack-encode the argument, decode the
    /// acknowledgment payload. Decode failures are logged and reported as
    /// an absent response.
    pub async fn request_typed<T, R>(&self, cmd: u32, arg: &T) -> Option<R>
    where
        T: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let payload = match MsgPackCodec::encode(arg) {
            Ok(bytes) => Bytes::from(bytes),
            Err(error) => {
                warn!(cmd, %error, "request payload encode failed");
                return None;
            }
        };
        let reply = self.request(cmd, payload).await?;
        match MsgPackCodec::decode(&reply) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(cmd, %error, "acknowledgment payload decode failed");
                None
            }
        }
    }

    /// Wake the transmit drain. For transports that signal writability out
    /// of band; normal operation never needs this, every submission
    /// signals the drain itself.
    pub fn wake_transmit(&self) {
        self.inner.tx_signal.notify_one();
    }

    /// Requests currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.inner.admission.in_flight()
    }

    /// Records queued for transmission.
    pub async fn pending_outbound(&self) -> usize {
        self.inner.registry.lock().await.outbound_len()
    }

    /// Requests awaiting an acknowledgment.
    pub async fn pending_awaiting(&self) -> usize {
        self.inner.registry.lock().await.awaiting_len()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// The call orchestrator. See module docs; shared with the dispatcher for
/// handler-generated acknowledgments.
pub(crate) async fn perform_call(
    inner: &Arc<EngineInner>,
    conf: CallConfig,
    payload: Bytes,
) -> Result<Option<Bytes>> {
    if payload.len() > inner.cfg.buffer_size {
        warn!(
            len = payload.len(),
            capacity = inner.cfg.buffer_size,
            cmd = conf.cmd,
            "payload exceeds buffer capacity, call rejected"
        );
        return Err(FramecallError::Protocol(format!(
            "payload length {} exceeds buffer capacity {}",
            payload.len(),
            inner.cfg.buffer_size
        )));
    }

    // Only acknowledgment-awaiting calls consume a slot; held on this
    // stack so the admission count returns to zero exactly when the call
    // resolves.
    let _slot = if conf.expect_ack {
        match inner.admission.try_acquire() {
            Some(slot) => Some(slot),
            None => {
                warn!(cmd = conf.cmd, "admission slots exhausted, call rejected");
                return Err(FramecallError::SlotsExhausted);
            }
        }
    } else {
        None
    };

    // Replying to a peer reuses its sequence; originating calls get a
    // fresh one under the registry lock.
    let seq = if conf.ctrl.is_ack() {
        conf.seq
    } else {
        inner.registry.lock().await.next_seq()
    };
    debug!(cmd = conf.cmd, seq, ctrl = ?conf.ctrl, expect_ack = conf.expect_ack, "perform");

    let mut attempts = u32::from(conf.retry) + 1;
    loop {
        let (tx, rx) = if conf.expect_ack {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let record = RequestRecord::new(&conf, seq, payload.clone(), inner.cfg.default_timeout, tx);
        let wait = record.timeout;

        inner.registry.lock().await.push_outbound(record);
        inner.tx_signal.notify_one();

        // Fire-and-forget: the transmit path destroys the record after
        // the write; nothing to wait for.
        let Some(rx) = rx else { return Ok(None) };

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(msg)) => {
                if msg.cmd() == conf.cmd {
                    debug!(cmd = conf.cmd, seq, "acknowledgment matched");
                    return Ok(Some(msg.payload));
                }
                warn!(
                    expected = conf.cmd,
                    received = msg.cmd(),
                    seq,
                    "acknowledgment command mismatch"
                );
                return Err(FramecallError::Protocol(format!(
                    "acknowledgment command {} does not match request command {}",
                    msg.cmd(),
                    conf.cmd
                )));
            }
            Ok(Err(_)) => {
                // Producer half dropped without a send: the engine is
                // shutting down underneath us.
                warn!(cmd = conf.cmd, seq, "rendezvous abandoned");
                inner.registry.lock().await.remove(seq);
                return Err(FramecallError::ConnectionClosed);
            }
            Err(_elapsed) => {
                inner.registry.lock().await.remove(seq);
                attempts -= 1;
                if attempts == 0 {
                    warn!(cmd = conf.cmd, seq, "timed out waiting for acknowledgment");
                    return Err(FramecallError::Timeout);
                }
                debug!(cmd = conf.cmd, seq, remaining = attempts, "rendezvous timeout, retransmitting");
            }
        }
    }
}

/// Receive loop: read the transport, decode frames, dispatch.
async fn rx_loop<R: TransportRx>(inner: Arc<EngineInner>, mut rx: R) {
    debug!("receive loop started");
    let mut frames = FrameBuffer::new(inner.cfg.buffer_size);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match rx.read(&mut buf).await {
            Ok(0) => {
                debug!("transport closed, receive loop exiting");
                return;
            }
            Ok(n) => {
                for msg in frames.push(&buf[..n]) {
                    dispatch(&inner, msg).await;
                }
            }
            Err(error) => {
                warn!(%error, "transport read failed, receive loop exiting");
                return;
            }
        }
    }
}

/// Combined-mode loop: one task services both directions, draining the
/// outbound queue whenever it is signalled or after inbound processing.
async fn combined_loop<T, R>(inner: Arc<EngineInner>, mut tx: T, mut rx: R)
where
    T: TransportTx,
    R: TransportRx,
{
    debug!("combined service loop started");
    let mut frames = FrameBuffer::new(inner.cfg.buffer_size);
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        tokio::select! {
            read = rx.read(&mut buf) => match read {
                Ok(0) => {
                    debug!("transport closed, service loop exiting");
                    return;
                }
                Ok(n) => {
                    for msg in frames.push(&buf[..n]) {
                        dispatch(&inner, msg).await;
                    }
                    drain_outbound(&inner, &mut tx).await;
                }
                Err(error) => {
                    warn!(%error, "transport read failed, service loop exiting");
                    return;
                }
            },
            _ = inner.tx_signal.notified() => {
                drain_outbound(&inner, &mut tx).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_zero_values_select_defaults() {
        let config = EngineConfig {
            buffer_size: 0,
            max_request: 0,
            task_stack_size: 0,
            default_timeout: DEFAULT_WAIT_TIMEOUT,
            tx_mode: TxMode::Dedicated,
        }
        .normalize()
        .unwrap();

        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.max_request, MAX_CONCURRENT_REQUESTS);
        assert_eq!(config.task_stack_size, DEFAULT_TASK_STACK_SIZE);
    }

    #[test]
    fn config_clamps_oversized_max_request() {
        let config = EngineConfig {
            max_request: 1000,
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(config.max_request, MAX_CONCURRENT_REQUESTS);
    }

    #[test]
    fn config_keeps_in_range_max_request() {
        let config = EngineConfig {
            max_request: 2,
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(config.max_request, 2);
    }

    #[test]
    fn config_rejects_stack_at_ceiling() {
        let result = EngineConfig {
            task_stack_size: TASK_STACK_CEILING,
            ..Default::default()
        }
        .normalize();
        assert!(matches!(result, Err(FramecallError::Config(_))));
    }

    #[tokio::test]
    async fn builder_rejects_bad_stack_size() {
        let (transport, _peer) = crate::transport::DuplexTransport::duplex(64);
        let result = Engine::builder()
            .task_stack_size(16 * 1024)
            .start(transport);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn builder_starts_with_defaults() {
        let (transport, _peer) = crate::transport::DuplexTransport::duplex(64);
        let engine = Engine::builder().start(transport).unwrap();
        assert_eq!(engine.in_flight(), 0);
        assert_eq!(engine.pending_outbound().await, 0);
        assert_eq!(engine.pending_awaiting().await, 0);
    }

    #[tokio::test]
    async fn spurious_transmit_wakes_are_harmless() {
        let (transport, _peer) = crate::transport::DuplexTransport::duplex(64);
        let engine = Engine::builder().start(transport).unwrap();
        for _ in 0..3 {
            engine.wake_transmit();
        }
        tokio::task::yield_now().await;
        assert_eq!(engine.pending_outbound().await, 0);
        assert_eq!(engine.pending_awaiting().await, 0);
    }
}
