//! Application callback slots.
//!
//! Two handlers, registered once at build time and read-only afterwards:
//! one for notification-class traffic (fire-and-forget) and one for
//! request-class traffic, whose return value becomes an outbound
//! acknowledgment payload. Handlers are async and run in spawned tasks,
//! so a slow handler never stalls the receive loop.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::protocol::InboundMessage;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback for inbound notification-class messages.
pub type NotifyHandler = Box<dyn Fn(InboundMessage) -> BoxFuture<'static, ()> + Send + Sync>;

/// Callback for inbound request-class messages. Returning `Some(payload)`
/// makes the engine send an acknowledgment carrying it.
pub type RequestHandler =
    Box<dyn Fn(InboundMessage) -> BoxFuture<'static, Option<Bytes>> + Send + Sync>;

/// Box a notify closure into the stored handler shape.
pub(crate) fn box_notify<F, Fut>(f: F) -> NotifyHandler
where
    F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Box::new(move |msg| Box::pin(f(msg)))
}

/// Box a request closure into the stored handler shape.
pub(crate) fn box_request<F, Fut>(f: F) -> RequestHandler
where
    F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Bytes>> + Send + 'static,
{
    Box::new(move |msg| Box::pin(f(msg)))
}
