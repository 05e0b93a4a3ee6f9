//! Transport seam - the byte-level collaborator the engine drives.
//!
//! The engine never touches the physical link directly. It consumes a
//! [`Transport`], split once at startup into a transmit half and a receive
//! half so the two execution contexts can run independently. The transmit
//! half takes a routing mask alongside each frame; transports without
//! routing simply ignore it.
//!
//! [`IoTransport`] adapts any tokio `AsyncRead`/`AsyncWrite` pair (serial
//! port bindings, TCP streams, `tokio::io::duplex` in tests).

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A full-duplex framed byte link.
pub trait Transport: Send + 'static {
    /// Transmit half type.
    type Tx: TransportTx;
    /// Receive half type.
    type Rx: TransportRx;

    /// Split into independently owned transmit and receive halves.
    fn split(self) -> (Self::Tx, Self::Rx);
}

/// Write side of a transport.
#[async_trait]
pub trait TransportTx: Send + 'static {
    /// Write one complete frame.
    ///
    /// `mask` is an opaque routing hint taken from the call configuration
    /// (multi-drop buses use it for receiver selection).
    async fn write(&mut self, frame: &[u8], mask: u32) -> std::io::Result<()>;
}

/// Read side of a transport.
#[async_trait]
pub trait TransportRx: Send + 'static {
    /// Read available bytes into `buf`, returning the count. `Ok(0)` means
    /// the link is closed.
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Adapter for plain tokio I/O halves.
pub struct IoTransport<R, W> {
    reader: R,
    writer: W,
}

impl<R, W> IoTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a reader/writer pair.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

/// In-memory transport built on `tokio::io::duplex`, mainly for tests.
pub type DuplexTransport = IoTransport<
    tokio::io::ReadHalf<tokio::io::DuplexStream>,
    tokio::io::WriteHalf<tokio::io::DuplexStream>,
>;

impl DuplexTransport {
    /// In-memory transport pair: bytes written to one end are read from
    /// the other.
    pub fn duplex(capacity: usize) -> (DuplexTransport, DuplexTransport) {
        let (a, b) = tokio::io::duplex(capacity);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (IoTransport::new(ar, aw), IoTransport::new(br, bw))
    }
}

impl<R, W> Transport for IoTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    type Tx = IoTx<W>;
    type Rx = IoRx<R>;

    fn split(self) -> (Self::Tx, Self::Rx) {
        (IoTx(self.writer), IoRx(self.reader))
    }
}

/// Transmit half of an [`IoTransport`].
pub struct IoTx<W>(W);

#[async_trait]
impl<W> TransportTx for IoTx<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write(&mut self, frame: &[u8], _mask: u32) -> std::io::Result<()> {
        self.0.write_all(frame).await?;
        self.0.flush().await
    }
}

/// Receive half of an [`IoTransport`].
pub struct IoRx<R>(R);

#[async_trait]
impl<R> TransportRx for IoRx<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplex_roundtrip() {
        let (a, b) = IoTransport::duplex(1024);
        let (mut atx, _arx) = a.split();
        let (_btx, mut brx) = b.split();

        atx.write(b"over the wire", 0).await.unwrap();

        let mut buf = [0u8; 64];
        let n = brx.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"over the wire");
    }

    #[tokio::test]
    async fn read_zero_on_close() {
        let (a, b) = IoTransport::duplex(64);
        let (_btx, mut brx) = b.split();
        drop(a);

        let mut buf = [0u8; 8];
        assert_eq!(brx.read(&mut buf).await.unwrap(), 0);
    }
}
