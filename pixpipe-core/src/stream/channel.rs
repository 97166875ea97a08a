//! Message channel between the frame producer and the viewer.
//!
//! The controller only needs two operations: wait for the next frame
//! payload and send a "ready" acknowledgment. [`FrameChannel`] captures
//! exactly that, and [`FramedChannel`] provides it over any async byte
//! stream using [`StreamCodec`] framing.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::StreamCodec;
use crate::error::{PipeError, Result};

/// Content of every acknowledgment message.
pub const ACK_SENTINEL: u8 = 0x00;

/// Ordered, reliable, message-delimited channel as seen by the viewer.
#[async_trait]
pub trait FrameChannel: Send {
    /// Wait for the next inbound payload.
    ///
    /// Returns [`PipeError::ChannelClosed`] once the peer has gone.
    async fn recv(&mut self) -> Result<Bytes>;

    /// Tell the producer the viewer is ready for the next frame.
    async fn send_ack(&mut self) -> Result<()>;
}

// ── FramedChannel ────────────────────────────────────────────────

/// A [`FrameChannel`] over a length-prefixed byte stream.
///
/// The same type serves the producer side through
/// [`recv_ack`](Self::recv_ack) and [`send_frame`](Self::send_frame).
#[derive(Debug)]
pub struct FramedChannel<T> {
    framed: Framed<T, StreamCodec>,
}

impl<T> FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(io: T, codec: StreamCodec) -> Self {
        Self {
            framed: Framed::new(io, codec),
        }
    }

    /// Next message of any kind.
    pub async fn recv_message(&mut self) -> Result<Bytes> {
        match self.framed.next().await {
            Some(Ok(message)) => Ok(message),
            Some(Err(e)) => Err(classify(e)),
            None => Err(PipeError::ChannelClosed),
        }
    }

    /// Send one message and flush it.
    pub async fn send_message(&mut self, message: Bytes) -> Result<()> {
        self.framed.send(message).await.map_err(classify)
    }

    /// Producer side: wait for the viewer's acknowledgment.
    pub async fn recv_ack(&mut self) -> Result<()> {
        let message = self.recv_message().await?;
        if message[..] != [ACK_SENTINEL] {
            return Err(PipeError::ProtocolViolation(
                "acknowledgment must be the single ready sentinel",
            ));
        }
        Ok(())
    }

    /// Producer side: send one encoded frame.
    pub async fn send_frame(&mut self, payload: Bytes) -> Result<()> {
        self.send_message(payload).await
    }

    pub fn get_ref(&self) -> &T {
        self.framed.get_ref()
    }

    pub fn into_inner(self) -> T {
        self.framed.into_inner()
    }
}

impl FramedChannel<TcpStream> {
    /// Open a TCP connection, bounded by `timeout`.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        codec: StreamCodec,
        timeout: Duration,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| PipeError::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        debug!("connected to {:?}", stream.peer_addr().ok());
        Ok(Self::new(stream, codec))
    }
}

#[async_trait]
impl<T> FrameChannel for FramedChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Bytes> {
        self.recv_message().await
    }

    async fn send_ack(&mut self) -> Result<()> {
        self.send_message(Bytes::from_static(&[ACK_SENTINEL])).await
    }
}

/// Fold the I/O errors a vanished peer produces into `ChannelClosed`.
fn classify(err: PipeError) -> PipeError {
    match err {
        PipeError::Connection(ref io) => match io.kind() {
            std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => PipeError::ChannelClosed,
            _ => err,
        },
        other => other,
    }
}

// ── Tests ────────────────────────────────────────────────────────
