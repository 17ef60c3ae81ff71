use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::error::PeerError;
use super::message::{Handshake, Message, MessageLimits};
use crate::config::PeerConfig;
use crate::constants::{HANDSHAKE_LEN, PROTOCOL_STRING};

/// Async framing over any byte stream (a `TcpStream` in practice).
///
/// Frames are accumulated in an internal buffer and handed to the same
/// decoder as [`Message::read_from`]. Every read and write is bounded by the
/// timeouts in [`PeerConfig`].
pub struct PeerTransport<S> {
    stream: S,
    read_buf: BytesMut,
    limits: MessageLimits,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> PeerTransport<S> {
    pub fn new(stream: S, config: &PeerConfig, piece_count: usize) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(32 * 1024),
            limits: MessageLimits::new(config, piece_count),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    pub fn limits(&self) -> &MessageLimits {
        &self.limits
    }

    pub async fn send_handshake(&mut self, handshake: &Handshake) -> Result<(), PeerError> {
        self.write(&handshake.encode()).await
    }

    pub async fn receive_handshake(&mut self) -> Result<Handshake, PeerError> {
        self.fill(1).await?;
        if self.read_buf[0] as usize != PROTOCOL_STRING.len() {
            return Err(PeerError::IncompatibleProtocol);
        }
        self.fill(HANDSHAKE_LEN).await?;

        let frame = self.read_buf.split_to(HANDSHAKE_LEN);
        let handshake = Handshake::read_from(&mut &frame[..])?;
        tracing::debug!(
            info_hash = %handshake.info_hash,
            peer_id = %handshake.peer_id,
            "handshake received"
        );
        Ok(handshake)
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        self.write(&message.encode()).await
    }

    /// Receives one message. Oversized or malformed frames are rejected
    /// from their header, before the payload is buffered.
    pub async fn receive_message(&mut self) -> Result<Message, PeerError> {
        self.fill(4).await?;
        let length = u32::from_be_bytes([
            self.read_buf[0],
            self.read_buf[1],
            self.read_buf[2],
            self.read_buf[3],
        ]);

        if length > 0 {
            self.fill(5).await?;
            self.limits.check(self.read_buf[4], length)?;
        }

        let total_len = 4 + length as usize;
        self.fill(total_len).await?;

        let frame = self.read_buf.split_to(total_len);
        let message = Message::read_from(&mut &frame[..], &self.limits)?;
        tracing::trace!(id = ?message.id(), length, "message received");
        Ok(message)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), PeerError> {
        timeout(self.write_timeout, self.stream.write_all(data))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Reads until at least `len` bytes are buffered.
    async fn fill(&mut self, len: usize) -> Result<(), PeerError> {
        while self.read_buf.len() < len {
            let n = timeout(self.read_timeout, self.stream.read_buf(&mut self.read_buf))
                .await
                .map_err(|_| PeerError::Timeout)??;

            if n == 0 {
                return Err(PeerError::EndOfStream);
            }
        }
        Ok(())
    }
}
