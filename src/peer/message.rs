use std::io::{self, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::PeerError;
use super::peer_id::PeerId;
use crate::bitfield::Bitfield;
use crate::config::PeerConfig;
use crate::constants::{HANDSHAKE_LEN, HASH_LEN, PROTOCOL_STRING, RESERVED_BYTES};
use crate::metainfo::InfoHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageId {
    Choke = 0,
    Unchoke = 1,
    Interested = 2,
    NotInterested = 3,
    Have = 4,
    Bitfield = 5,
    Request = 6,
    Piece = 7,
    Cancel = 8,
}

impl MessageId {
    fn name(self) -> &'static str {
        match self {
            MessageId::Choke => "choke",
            MessageId::Unchoke => "unchoke",
            MessageId::Interested => "interested",
            MessageId::NotInterested => "not interested",
            MessageId::Have => "have",
            MessageId::Bitfield => "bitfield",
            MessageId::Request => "request",
            MessageId::Piece => "piece",
            MessageId::Cancel => "cancel",
        }
    }
}

impl TryFrom<u8> for MessageId {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            other => Err(other),
        }
    }
}

/// Bounds the decoder enforces on incoming frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLimits {
    /// Largest block a `piece` message may carry.
    pub max_data_length: u32,
    /// Number of pieces in the torrent, fixing the `bitfield` length.
    pub piece_count: usize,
}

impl MessageLimits {
    pub fn new(config: &PeerConfig, piece_count: usize) -> Self {
        Self {
            max_data_length: config.max_data_length,
            piece_count,
        }
    }

    /// Checks a frame's declared length (id byte included) against its id,
    /// before any of the payload is read.
    pub(crate) fn check(&self, id: u8, length: u32) -> Result<MessageId, PeerError> {
        let id = MessageId::try_from(id).map_err(|id| PeerError::UnrecognizedMessage { id, length })?;

        let expected = match id {
            MessageId::Choke
            | MessageId::Unchoke
            | MessageId::Interested
            | MessageId::NotInterested => 1,
            MessageId::Have => 5,
            MessageId::Bitfield => 1 + self.piece_count.div_ceil(8) as u32,
            MessageId::Request | MessageId::Cancel => 13,
            MessageId::Piece => {
                let max = 9u32.saturating_add(self.max_data_length);
                if length < 9 {
                    return Err(PeerError::PieceTooShort { length });
                }
                if length > max {
                    return Err(PeerError::PieceTooLong { length, max });
                }
                return Ok(id);
            }
        };

        if length != expected {
            return Err(PeerError::IncorrectLength {
                message: id.name(),
                length,
                expected,
            });
        }
        Ok(id)
    }
}

/// The opening exchange of a peer connection.
///
/// On the wire: the length byte `19`, the literal `BitTorrent protocol`,
/// eight reserved bytes, the info hash and the peer id (68 bytes in total).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self { info_hash, peer_id }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL_STRING.len() as u8);
        buf.put_slice(PROTOCOL_STRING.as_bytes());
        buf.put_slice(&RESERVED_BYTES);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), PeerError> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Reads a handshake, ignoring whatever the reserved bytes advertise.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, PeerError> {
        let mut len = [0u8; 1];
        read_exact(reader, &mut len)?;

        let mut protocol = vec![0u8; len[0] as usize];
        read_exact(reader, &mut protocol)?;
        if protocol != PROTOCOL_STRING.as_bytes() {
            return Err(PeerError::IncompatibleProtocol);
        }

        let mut rest = [0u8; RESERVED_BYTES.len() + 2 * HASH_LEN];
        read_exact(reader, &mut rest)?;

        let mut info_hash = [0u8; HASH_LEN];
        let mut peer_id = [0u8; HASH_LEN];
        info_hash.copy_from_slice(&rest[8..28]);
        peer_id.copy_from_slice(&rest[28..48]);

        Ok(Self {
            info_hash: InfoHash::new(info_hash),
            peer_id: PeerId::new(peer_id),
        })
    }
}

/// A peer wire message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have { piece: u32 },
    Bitfield(Bitfield),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, data: Bytes },
    Cancel { index: u32, begin: u32, length: u32 },
}

impl Message {
    /// The message id, or `None` for keep-alives.
    pub fn id(&self) -> Option<MessageId> {
        match self {
            Message::KeepAlive => None,
            Message::Choke => Some(MessageId::Choke),
            Message::Unchoke => Some(MessageId::Unchoke),
            Message::Interested => Some(MessageId::Interested),
            Message::NotInterested => Some(MessageId::NotInterested),
            Message::Have { .. } => Some(MessageId::Have),
            Message::Bitfield(_) => Some(MessageId::Bitfield),
            Message::Request { .. } => Some(MessageId::Request),
            Message::Piece { .. } => Some(MessageId::Piece),
            Message::Cancel { .. } => Some(MessageId::Cancel),
        }
    }

    /// Encodes the message with its 4-byte length prefix.
    pub fn encode(&self) -> Bytes {
        let Some(id) = self.id() else {
            return Bytes::from_static(&[0; 4]);
        };

        let mut payload = BytesMut::new();
        match self {
            Message::KeepAlive
            | Message::Choke
            | Message::Unchoke
            | Message::Interested
            | Message::NotInterested => {}
            Message::Have { piece } => payload.put_u32(*piece),
            Message::Bitfield(bits) => payload.put_slice(bits.as_bytes()),
            Message::Request {
                index,
                begin,
                length,
            }
            | Message::Cancel {
                index,
                begin,
                length,
            } => {
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_u32(*length);
            }
            Message::Piece { index, begin, data } => {
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_slice(data);
            }
        }

        let mut buf = BytesMut::with_capacity(5 + payload.len());
        buf.put_u32(1 + payload.len() as u32);
        buf.put_u8(id as u8);
        buf.put_slice(&payload);
        buf.freeze()
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), PeerError> {
        writer.write_all(&self.encode())?;
        Ok(())
    }

    /// Reads exactly one frame.
    ///
    /// The declared length is checked against `limits` before the payload is
    /// read, so an oversized `piece` frame is rejected without allocating.
    pub fn read_from<R: Read>(reader: &mut R, limits: &MessageLimits) -> Result<Self, PeerError> {
        let mut prefix = [0u8; 4];
        read_exact(reader, &mut prefix)?;
        let length = u32::from_be_bytes(prefix);
        if length == 0 {
            return Ok(Message::KeepAlive);
        }

        let mut id = [0u8; 1];
        read_exact(reader, &mut id)?;
        let id = limits.check(id[0], length)?;

        let mut payload = vec![0u8; length as usize - 1];
        read_exact(reader, &mut payload)?;
        Self::from_payload(id, Bytes::from(payload), limits)
    }

    /// Builds a message from a payload whose length already passed
    /// [`MessageLimits::check`].
    fn from_payload(id: MessageId, mut payload: Bytes, limits: &MessageLimits) -> Result<Self, PeerError> {
        let message = match id {
            MessageId::Choke => Message::Choke,
            MessageId::Unchoke => Message::Unchoke,
            MessageId::Interested => Message::Interested,
            MessageId::NotInterested => Message::NotInterested,
            MessageId::Have => Message::Have {
                piece: payload.get_u32(),
            },
            MessageId::Bitfield => {
                let bits = Bitfield::from_bytes(&payload, limits.piece_count).ok_or(
                    PeerError::IncorrectLength {
                        message: id.name(),
                        length: payload.len() as u32 + 1,
                        expected: limits.piece_count.div_ceil(8) as u32 + 1,
                    },
                )?;
                Message::Bitfield(bits)
            }
            MessageId::Request => Message::Request {
                index: payload.get_u32(),
                begin: payload.get_u32(),
                length: payload.get_u32(),
            },
            MessageId::Piece => {
                let index = payload.get_u32();
                let begin = payload.get_u32();
                Message::Piece {
                    index,
                    begin,
                    data: payload,
                }
            }
            MessageId::Cancel => Message::Cancel {
                index: payload.get_u32(),
                begin: payload.get_u32(),
                length: payload.get_u32(),
            },
        };
        Ok(message)
    }
}

/// `read_exact` with a short read reported as [`PeerError::EndOfStream`].
fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), PeerError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => PeerError::EndOfStream,
        _ => PeerError::Io(e),
    })
}
