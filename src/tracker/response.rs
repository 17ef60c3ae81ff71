use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;

use super::error::TrackerError;
use crate::bencode::{decode, Value};
use crate::constants::{COMPACT_PEER_LEN, HASH_LEN};
use crate::metainfo::{optional_integer, optional_string, required_integer, Dict, MetainfoError};

const COMPACT_PEER6_LEN: usize = 18;

/// A peer returned from a tracker.
///
/// The peer id is only present in non-compact responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub addr: SocketAddr,
    pub peer_id: Option<[u8; HASH_LEN]>,
}

impl Peer {
    /// Parses a compact IPv4 record: 4 address bytes then a big-endian port.
    pub fn from_compact_v4(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; COMPACT_PEER_LEN] = bytes.get(..COMPACT_PEER_LEN)?.try_into().ok()?;
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Some(Self {
            addr: SocketAddr::new(IpAddr::V4(ip), port),
            peer_id: None,
        })
    }

    /// Parses a compact IPv6 record: 16 address bytes then a big-endian port.
    pub fn from_compact_v6(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; COMPACT_PEER6_LEN] = bytes.get(..COMPACT_PEER6_LEN)?.try_into().ok()?;
        let mut ip = [0u8; 16];
        ip.copy_from_slice(&bytes[..16]);
        let port = u16::from_be_bytes([bytes[16], bytes[17]]);
        Some(Self {
            addr: SocketAddr::new(IpAddr::V6(Ipv6Addr::from(ip)), port),
            peer_id: None,
        })
    }

    fn from_dict(dict: &Dict) -> Result<Self, MetainfoError> {
        let ip: IpAddr = dict
            .get(b"ip".as_slice())
            .ok_or(MetainfoError::MissingField("ip"))?
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or(MetainfoError::InvalidField("ip"))?;
        let port = u16::try_from(required_integer(dict, "port")?)
            .map_err(|_| MetainfoError::InvalidField("port"))?;
        let peer_id = match dict.get(b"peer id".as_slice()) {
            Some(id) => Some(
                id.as_bytes()
                    .and_then(|b| <[u8; HASH_LEN]>::try_from(b.as_ref()).ok())
                    .ok_or(MetainfoError::InvalidField("peer id"))?,
            ),
            None => None,
        };

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            peer_id,
        })
    }
}

/// A successful announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnounceResponse {
    /// Seconds the client should wait between announces.
    pub interval: u32,
    pub min_interval: Option<u32>,
    /// Opaque id to echo back on the next announce.
    pub tracker_id: Option<Bytes>,
    /// Number of seeders.
    pub complete: Option<u32>,
    /// Number of leechers.
    pub incomplete: Option<u32>,
    pub warning_message: Option<String>,
    pub peers: Vec<Peer>,
}

/// What a tracker answered to an announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerResponse {
    Failure { reason: String },
    Success(AnnounceResponse),
}

impl TrackerResponse {
    pub fn from_bytes(data: &[u8]) -> Result<Self, TrackerError> {
        Self::from_value(&decode(data)?)
    }

    /// Maps a decoded response.
    ///
    /// A `failure reason` takes precedence over every other key. Peers may be
    /// a list of dictionaries or a compact string of 6-byte records; a
    /// trailing partial record is dropped. Compact IPv6 peers in `peers6`
    /// are appended after the IPv4 ones.
    pub fn from_value(value: &Value) -> Result<Self, TrackerError> {
        let dict = value
            .as_dict()
            .ok_or(MetainfoError::InvalidField("response"))?;

        if let Some(reason) = optional_string(dict, "failure reason")? {
            return Ok(TrackerResponse::Failure { reason });
        }

        let mut peers = match dict
            .get(b"peers".as_slice())
            .ok_or(MetainfoError::MissingField("peers"))?
        {
            Value::Bytes(compact) => compact
                .chunks_exact(COMPACT_PEER_LEN)
                .filter_map(Peer::from_compact_v4)
                .collect(),
            Value::List(list) => list
                .iter()
                .map(|peer| {
                    peer.as_dict()
                        .ok_or(MetainfoError::InvalidField("peers"))
                        .and_then(Peer::from_dict)
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(MetainfoError::InvalidField("peers").into()),
        };

        if let Some(compact) = dict.get(b"peers6".as_slice()).and_then(Value::as_bytes) {
            peers.extend(
                compact
                    .chunks_exact(COMPACT_PEER6_LEN)
                    .filter_map(Peer::from_compact_v6),
            );
        }

        let tracker_id = match dict.get(b"tracker id".as_slice()) {
            Some(id) => Some(
                id.as_bytes()
                    .cloned()
                    .ok_or(MetainfoError::InvalidField("tracker id"))?,
            ),
            None => None,
        };

        Ok(TrackerResponse::Success(AnnounceResponse {
            interval: to_u32(required_integer(dict, "interval")?, "interval")?,
            min_interval: optional_u32(dict, "min interval")?,
            tracker_id,
            complete: optional_u32(dict, "complete")?,
            incomplete: optional_u32(dict, "incomplete")?,
            warning_message: optional_string(dict, "warning message")?,
            peers,
        }))
    }
}

fn to_u32(value: i64, key: &'static str) -> Result<u32, MetainfoError> {
    u32::try_from(value).map_err(|_| MetainfoError::InvalidField(key))
}

fn optional_u32(dict: &Dict, key: &'static str) -> Result<Option<u32>, MetainfoError> {
    optional_integer(dict, key)?
        .map(|v| to_u32(v, key))
        .transpose()
}
