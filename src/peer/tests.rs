use super::*;
use crate::bitfield::Bitfield;
use crate::config::PeerConfig;
use crate::metainfo::InfoHash;
use bytes::Bytes;
use std::io::Cursor;
use std::time::Duration;

fn limits() -> MessageLimits {
    MessageLimits {
        max_data_length: 16,
        piece_count: 10,
    }
}

fn decode(data: &[u8]) -> Result<Message, PeerError> {
    Message::read_from(&mut Cursor::new(data), &limits())
}

fn test_handshake() -> Handshake {
    Handshake::new(InfoHash::new([1u8; 20]), PeerId::new([2u8; 20]))
}

#[test]
fn test_peer_id_generate() {
    let id1 = PeerId::generate();
    let id2 = PeerId::generate();
    assert_ne!(id1, id2);
    assert_eq!(&id1.as_bytes()[..8], b"-BP0001-");
    assert_eq!(id1.client(), Some("BP0001"));

    assert!(PeerId::from_slice(&[0u8; 19]).is_none());
    let plain = PeerId::from_slice(&[b'a'; 20]).unwrap();
    assert_eq!(plain.client(), None);
    assert_eq!(plain.to_string(), "a".repeat(20));
}

#[test]
fn test_handshake_roundtrip() {
    let handshake = test_handshake();
    let mut buf = Vec::new();
    handshake.write_to(&mut buf).unwrap();

    assert_eq!(buf.len(), 68);
    assert_eq!(buf[0], 19);
    assert_eq!(&buf[1..20], b"BitTorrent protocol");
    assert_eq!(&buf[20..28], &[0u8; 8]);

    let decoded = Handshake::read_from(&mut Cursor::new(&buf)).unwrap();
    assert_eq!(decoded, handshake);
}

#[test]
fn test_handshake_ignores_reserved_bits() {
    let mut buf = test_handshake().encode().to_vec();
    buf[25] = 0x10;
    buf[27] = 0x05;
    let decoded = Handshake::read_from(&mut Cursor::new(&buf)).unwrap();
    assert_eq!(decoded, test_handshake());
}

#[test]
fn test_handshake_wrong_protocol() {
    let mut buf = test_handshake().encode().to_vec();
    buf[19] = b'X';
    assert!(matches!(
        Handshake::read_from(&mut Cursor::new(&buf)),
        Err(PeerError::IncompatibleProtocol)
    ));

    let mut buf = vec![5u8];
    buf.extend_from_slice(b"hello");
    buf.extend_from_slice(&[0u8; 48]);
    assert!(matches!(
        Handshake::read_from(&mut Cursor::new(&buf)),
        Err(PeerError::IncompatibleProtocol)
    ));
}

#[test]
fn test_handshake_short_read() {
    let buf = test_handshake().encode();
    assert!(matches!(
        Handshake::read_from(&mut Cursor::new(&buf[..60])),
        Err(PeerError::EndOfStream)
    ));
}

#[test]
fn test_keep_alive() {
    assert_eq!(decode(&[0, 0, 0, 0]).unwrap(), Message::KeepAlive);
    assert_eq!(Message::KeepAlive.encode().as_ref(), &[0, 0, 0, 0]);
    assert_eq!(Message::KeepAlive.id(), None);
}

#[test]
fn test_message_encode_decode() {
    let mut bits = Bitfield::new(10);
    bits.set(0);
    bits.set(9);

    let messages = vec![
        Message::Choke,
        Message::Unchoke,
        Message::Interested,
        Message::NotInterested,
        Message::Have { piece: 42 },
        Message::Bitfield(bits),
        Message::Request {
            index: 1,
            begin: 0,
            length: 16384,
        },
        Message::Piece {
            index: 3,
            begin: 32,
            data: Bytes::from_static(b"sixteen bytes!!!"),
        },
        Message::Piece {
            index: 3,
            begin: 0,
            data: Bytes::new(),
        },
        Message::Cancel {
            index: 1,
            begin: 0,
            length: 16384,
        },
    ];

    for msg in messages {
        let mut buf = Vec::new();
        msg.write_to(&mut buf).unwrap();
        assert_eq!(decode(&buf).unwrap(), msg);
    }
}

#[test]
fn test_have_wire_format() {
    let encoded = Message::Have { piece: 0x01020304 }.encode();
    assert_eq!(encoded.as_ref(), &[0, 0, 0, 5, 4, 1, 2, 3, 4]);
}

#[test]
fn test_read_stops_at_frame_boundary() {
    let mut buf = Message::Interested.encode().to_vec();
    buf.extend_from_slice(&Message::Have { piece: 7 }.encode());

    let mut cursor = Cursor::new(buf);
    assert_eq!(
        Message::read_from(&mut cursor, &limits()).unwrap(),
        Message::Interested
    );
    assert_eq!(cursor.position(), 5);
    assert_eq!(
        Message::read_from(&mut cursor, &limits()).unwrap(),
        Message::Have { piece: 7 }
    );
}

#[test]
fn test_incorrect_fixed_lengths() {
    // Request declaring 12 bytes; nothing after the header is needed.
    match decode(&[0, 0, 0, 12, 6]) {
        Err(PeerError::IncorrectLength {
            message,
            length,
            expected,
        }) => {
            assert_eq!(message, "request");
            assert_eq!(length, 12);
            assert_eq!(expected, 13);
        }
        other => panic!("expected incorrect length, got {:?}", other),
    }

    assert!(matches!(
        decode(&[0, 0, 0, 12, 8]),
        Err(PeerError::IncorrectLength { expected: 13, .. })
    ));
    assert!(matches!(
        decode(&[0, 0, 0, 2, 0, 0]),
        Err(PeerError::IncorrectLength { expected: 1, .. })
    ));
    assert!(matches!(
        decode(&[0, 0, 0, 4, 4, 0, 0, 0]),
        Err(PeerError::IncorrectLength { expected: 5, .. })
    ));
    // Ten pieces need two bitfield bytes.
    assert!(matches!(
        decode(&[0, 0, 0, 4, 5, 0, 0, 0]),
        Err(PeerError::IncorrectLength {
            length: 4,
            expected: 3,
            ..
        })
    ));
}

#[test]
fn test_piece_length_bounds() {
    assert!(matches!(
        decode(&[0, 0, 0, 26, 7]),
        Err(PeerError::PieceTooLong { length: 26, max: 25 })
    ));
    assert!(matches!(
        decode(&[0, 0, 0, 8, 7]),
        Err(PeerError::PieceTooShort { length: 8 })
    ));

    let max = Message::Piece {
        index: 0,
        begin: 0,
        data: Bytes::from(vec![9u8; 16]),
    };
    assert_eq!(decode(&max.encode()).unwrap(), max);
}

#[test]
fn test_unrecognized_message() {
    assert!(matches!(
        decode(&[0, 0, 0, 1, 20]),
        Err(PeerError::UnrecognizedMessage { id: 20, length: 1 })
    ));
}

#[test]
fn test_truncated_frame() {
    assert!(matches!(decode(&[0, 0]), Err(PeerError::EndOfStream)));
    assert!(matches!(
        decode(&[0, 0, 0, 5, 4, 0, 0]),
        Err(PeerError::EndOfStream)
    ));
}

#[test]
fn test_bitfield_spare_bits_cleared() {
    match decode(&[0, 0, 0, 3, 5, 0xFF, 0xFF]).unwrap() {
        Message::Bitfield(bits) => {
            assert_eq!(bits.len(), 10);
            assert_eq!(bits.count(), 10);
            assert_eq!(bits.as_bytes(), &[0xFF, 0xC0]);
        }
        other => panic!("expected bitfield, got {:?}", other),
    }
}

fn test_config() -> PeerConfig {
    PeerConfig {
        max_data_length: 16,
        read_timeout: Duration::from_millis(200),
        write_timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn test_transport_exchange() {
    let (a, b) = tokio::io::duplex(1024);
    let mut local = PeerTransport::new(a, &test_config(), 10);
    let mut remote = PeerTransport::new(b, &test_config(), 10);

    local.send_handshake(&test_handshake()).await.unwrap();
    assert_eq!(remote.receive_handshake().await.unwrap(), test_handshake());

    let messages = vec![
        Message::KeepAlive,
        Message::Unchoke,
        Message::Request {
            index: 2,
            begin: 0,
            length: 16,
        },
        Message::Piece {
            index: 2,
            begin: 0,
            data: Bytes::from_static(b"0123456789abcdef"),
        },
    ];
    for msg in &messages {
        local.send_message(msg).await.unwrap();
    }
    for msg in messages {
        assert_eq!(remote.receive_message().await.unwrap(), msg);
    }
}

#[tokio::test]
async fn test_transport_rejects_oversized_piece_from_header() {
    let (a, b) = tokio::io::duplex(1024);
    let mut remote = PeerTransport::new(b, &test_config(), 10);

    // Only the header is ever sent; the payload would be 1 MiB.
    let mut local = a;
    tokio::io::AsyncWriteExt::write_all(&mut local, &[0, 0x10, 0, 9, 7])
        .await
        .unwrap();

    assert!(matches!(
        remote.receive_message().await,
        Err(PeerError::PieceTooLong { max: 25, .. })
    ));
}

#[tokio::test]
async fn test_transport_closed_stream() {
    let (a, b) = tokio::io::duplex(1024);
    let mut remote = PeerTransport::new(b, &test_config(), 10);

    let mut local = a;
    tokio::io::AsyncWriteExt::write_all(&mut local, &[0, 0, 0, 5, 4, 0])
        .await
        .unwrap();
    drop(local);

    assert!(matches!(
        remote.receive_message().await,
        Err(PeerError::EndOfStream)
    ));
}

#[tokio::test]
async fn test_transport_wrong_protocol() {
    let (a, b) = tokio::io::duplex(1024);
    let mut remote = PeerTransport::new(b, &test_config(), 10);

    let mut local = a;
    tokio::io::AsyncWriteExt::write_all(&mut local, b"\x04HTTP").await.unwrap();

    assert!(matches!(
        remote.receive_handshake().await,
        Err(PeerError::IncompatibleProtocol)
    ));
}

#[tokio::test]
async fn test_transport_read_timeout() {
    let (_a, b) = tokio::io::duplex(1024);
    let config = PeerConfig {
        read_timeout: Duration::from_millis(20),
        ..test_config()
    };
    let mut remote = PeerTransport::new(b, &config, 10);

    assert!(matches!(
        remote.receive_message().await,
        Err(PeerError::Timeout)
    ));
}
