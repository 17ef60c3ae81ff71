use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use sha1::{Digest, Sha1};
use tempfile::TempDir;

use super::*;
use crate::bencode::{encode, Value};
use crate::observable::Observable;

const ANNOUNCE: &str = "http://tracker.example.com/announce";

fn hashes(count: usize) -> Value {
    Value::Bytes(Bytes::from(vec![0xAB; count * 20]))
}

fn single_file_info(length: i64, piece_length: i64, pieces: usize) -> Value {
    Value::dict([
        ("length", Value::Integer(length)),
        ("name", Value::string("file.bin")),
        ("piece length", Value::Integer(piece_length)),
        ("pieces", hashes(pieces)),
    ])
}

fn torrent_bytes(info: Value) -> Vec<u8> {
    encode(&Value::dict([
        ("announce", Value::string(ANNOUNCE)),
        ("info", info),
    ]))
}

fn expect_invalid(data: &[u8], field: &str) {
    match Metainfo::from_bytes(data) {
        Err(MetainfoError::InvalidField(f)) => assert_eq!(f, field),
        other => panic!("expected invalid {}, got {:?}", field, other),
    }
}

#[test]
fn test_info_hash_from_hex() {
    let hex = "0123456789abcdef0123456789abcdef01234567";
    let hash = InfoHash::from_hex(hex).unwrap();
    assert_eq!(hash.to_hex(), hex);
    assert_eq!(hash.to_hex_upper(), hex.to_uppercase());
    assert_eq!(InfoHash::from_hex(&hex.to_uppercase()).unwrap(), hash);

    assert!(InfoHash::from_hex("0123").is_err());
    assert!(InfoHash::from_hex("zz23456789abcdef0123456789abcdef01234567").is_err());
}

#[test]
fn test_parse_single_file() {
    let data = torrent_bytes(single_file_info(40000, 16384, 3));
    let metainfo = Metainfo::from_bytes(&data).unwrap();

    assert_eq!(metainfo.announce, ANNOUNCE);
    assert_eq!(metainfo.info.name(), "file.bin");
    assert_eq!(metainfo.info.piece_count(), 3);
    assert_eq!(metainfo.info.total_length(), 40000);
    assert_eq!(metainfo.info.piece_size(0), Some(16384));
    assert_eq!(metainfo.info.piece_size(2), Some(40000 - 2 * 16384));
    assert_eq!(metainfo.info.piece_size(3), None);
    assert!(!metainfo.info.is_multi_file());
    assert_eq!(metainfo.info.private, None);

    let files = metainfo.info.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, PathBuf::from("file.bin"));
}

#[test]
fn test_parse_multi_file() {
    let info = Value::dict([
        (
            "files",
            Value::List(vec![
                Value::dict([
                    ("length", Value::Integer(10000)),
                    ("path", Value::List(vec![Value::string("a.txt")])),
                ]),
                Value::dict([
                    ("length", Value::Integer(10000)),
                    ("md5sum", Value::string("d41d8cd98f00b204e9800998ecf8427e")),
                    (
                        "path",
                        Value::List(vec![Value::string("sub"), Value::string("b.txt")]),
                    ),
                ]),
            ]),
        ),
        ("name", Value::string("dir")),
        ("piece length", Value::Integer(16384)),
        ("pieces", hashes(2)),
        ("private", Value::Integer(1)),
    ]);
    let metainfo = Metainfo::from_bytes(&torrent_bytes(info)).unwrap();

    assert!(metainfo.info.is_multi_file());
    assert_eq!(metainfo.info.private, Some(true));
    let files = metainfo.info.files();
    assert_eq!(files[1].path, PathBuf::from("sub").join("b.txt"));
    assert_eq!(files[1].offset, 10000);
    assert_eq!(metainfo.info.total_length(), 20000);
    assert_eq!(
        metainfo.info.content_dir(&PathBuf::from("/downloads")),
        PathBuf::from("/downloads/dir")
    );

    match &metainfo.info.layout {
        Layout::MultiFile { files, .. } => {
            assert_eq!(files[0].md5sum, None);
            assert!(files[1].md5sum.is_some());
        }
        _ => panic!("expected multi-file layout"),
    }
}

#[test]
fn test_info_hash_uses_original_bytes() {
    // `name` before `length`: well-formed but not canonical.
    let mut info = b"d4:name8:file.bin6:lengthi100e12:piece lengthi16384e6:pieces20:".to_vec();
    info.extend_from_slice(&[7u8; 20]);
    info.push(b'e');

    let mut data = b"d8:announce".to_vec();
    data.extend_from_slice(format!("{}:{}", ANNOUNCE.len(), ANNOUNCE).as_bytes());
    data.extend_from_slice(b"4:info");
    data.extend_from_slice(&info);
    data.push(b'e');

    let metainfo = Metainfo::from_bytes(&data).unwrap();
    let expected: [u8; 20] = Sha1::digest(&info).into();
    assert_eq!(metainfo.info_hash.as_bytes(), &expected);
    assert_eq!(metainfo.raw_info().as_ref(), info.as_slice());

    let canonical: [u8; 20] = Sha1::digest(encode(&metainfo.info.to_value())).into();
    assert_ne!(canonical, expected);
}

#[test]
fn test_missing_fields() {
    let data = encode(&Value::dict([("info", single_file_info(100, 16384, 1))]));
    assert!(matches!(
        Metainfo::from_bytes(&data),
        Err(MetainfoError::MissingField("announce"))
    ));

    let data = encode(&Value::dict([("announce", Value::string(ANNOUNCE))]));
    assert!(matches!(
        Metainfo::from_bytes(&data),
        Err(MetainfoError::MissingField("info"))
    ));

    let info = Value::dict([
        ("name", Value::string("x")),
        ("piece length", Value::Integer(16384)),
        ("pieces", hashes(1)),
    ]);
    assert!(matches!(
        Metainfo::from_bytes(&torrent_bytes(info)),
        Err(MetainfoError::MissingField("length"))
    ));
}

#[test]
fn test_invalid_fields() {
    let mut info = single_file_info(100, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"pieces"), Value::Bytes(Bytes::from(vec![0u8; 21])));
    }
    expect_invalid(&torrent_bytes(info), "pieces");

    // 40000 bytes at 16 KiB needs 3 pieces, not 2.
    expect_invalid(&torrent_bytes(single_file_info(40000, 16384, 2)), "pieces");
    expect_invalid(&torrent_bytes(single_file_info(100, 0, 1)), "piece length");

    let data = encode(&Value::dict([
        ("announce", Value::Integer(1)),
        ("info", single_file_info(100, 16384, 1)),
    ]));
    expect_invalid(&data, "announce");

    expect_invalid(b"li1ee", "root");

    // Both layouts at once.
    let mut info = single_file_info(100, 16384, 1);
    if let Value::Dict(ref mut d) = info {
        d.insert(Bytes::from_static(b"files"), Value::List(vec![file_entry("a", 100)]));
    }
    expect_invalid(&torrent_bytes(info), "files");
}

fn file_entry(path: &str, length: i64) -> Value {
    Value::dict([
        ("length", Value::Integer(length)),
        ("path", Value::List(vec![Value::string(path)])),
    ])
}

#[test]
fn test_file_lengths_overflow() {
    let info = Value::dict([
        (
            "files",
            Value::List(vec![
                file_entry("a", i64::MAX),
                file_entry("b", i64::MAX),
                file_entry("c", i64::MAX),
            ]),
        ),
        ("name", Value::string("huge")),
        ("piece length", Value::Integer(16384)),
        ("pieces", hashes(1)),
    ]);
    expect_invalid(&torrent_bytes(info), "length");
}

#[test]
fn test_optional_fields_and_trackers() {
    let data = encode(&Value::dict([
        ("announce", Value::string(ANNOUNCE)),
        (
            "announce-list",
            Value::List(vec![
                Value::List(vec![Value::string(ANNOUNCE)]),
                Value::List(vec![Value::string("udp://backup.example.com:80")]),
            ]),
        ),
        ("comment", Value::string("hello")),
        ("created by", Value::string("test")),
        ("creation date", Value::Integer(1_500_000_000)),
        ("encoding", Value::string("UTF-8")),
        ("info", single_file_info(100, 16384, 1)),
    ]));
    let metainfo = Metainfo::from_bytes(&data).unwrap();

    assert_eq!(metainfo.comment.as_deref(), Some("hello"));
    assert_eq!(metainfo.created_by.as_deref(), Some("test"));
    assert_eq!(metainfo.creation_date, Some(1_500_000_000));
    assert_eq!(metainfo.encoding.as_deref(), Some("UTF-8"));
    assert_eq!(
        metainfo.trackers(),
        vec![ANNOUNCE.to_string(), "udp://backup.example.com:80".to_string()]
    );

    // Canonical input re-serializes byte for byte.
    assert_eq!(metainfo.to_bytes(), data);
}

#[test]
fn test_to_value_keeps_info_hash() {
    let data = torrent_bytes(single_file_info(100, 16384, 1));
    let metainfo = Metainfo::from_bytes(&data).unwrap();

    let reparsed = Metainfo::from_bytes(&metainfo.to_bytes()).unwrap();
    assert_eq!(reparsed.info_hash, metainfo.info_hash);
    assert_eq!(reparsed.info, metainfo.info);

    let mapped = Metainfo::from_value(&metainfo.to_value(), metainfo.info_hash).unwrap();
    assert_eq!(mapped.info, metainfo.info);
}

#[test]
fn test_builder_single_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.bin");
    let content: Vec<u8> = (0..40000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &content).unwrap();

    let progress = Arc::new(Observable::new(0.0));
    let builder = TorrentBuilder::single_file(&path)
        .unwrap()
        .piece_length(16384)
        .announce(ANNOUNCE)
        .comment("built in a test")
        .progress(progress.clone());
    assert_eq!(builder.root(), temp.path());

    let metainfo = builder.build().unwrap();
    assert_eq!(progress.get(), 1.0);
    assert_eq!(metainfo.info.name(), "data.bin");
    assert_eq!(metainfo.info.total_length(), 40000);
    assert_eq!(metainfo.info.piece_count(), 3);
    assert_eq!(metainfo.comment.as_deref(), Some("built in a test"));
    assert!(metainfo.creation_date.is_some());

    for (i, chunk) in content.chunks(16384).enumerate() {
        let expected: [u8; 20] = Sha1::digest(chunk).into();
        assert_eq!(metainfo.info.pieces[i], expected);
    }

    let parsed = Metainfo::from_bytes(&metainfo.to_bytes()).unwrap();
    assert_eq!(parsed.info_hash, metainfo.info_hash);
}

#[test]
fn test_builder_directory_spans_files() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("album");
    std::fs::create_dir_all(dir.join("disc1")).unwrap();
    std::fs::write(dir.join("cover.jpg"), vec![1u8; 10]).unwrap();
    std::fs::write(dir.join("disc1").join("track.flac"), vec![2u8; 20]).unwrap();

    let metainfo = TorrentBuilder::scan_directory(&dir)
        .unwrap()
        .piece_length(16)
        .announce(ANNOUNCE)
        .build()
        .unwrap();

    assert_eq!(metainfo.info.name(), "album");
    assert_eq!(metainfo.info.piece_count(), 2);
    let files = metainfo.info.files();
    assert_eq!(files[0].path, PathBuf::from("cover.jpg"));
    assert_eq!(files[1].path, PathBuf::from("disc1").join("track.flac"));

    let mut first = vec![1u8; 10];
    first.extend_from_slice(&[2u8; 6]);
    let expected: [u8; 20] = Sha1::digest(&first).into();
    assert_eq!(metainfo.info.pieces[0], expected);
}

#[test]
fn test_builder_requires_announce() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("data.bin");
    std::fs::write(&path, b"content").unwrap();

    let result = TorrentBuilder::single_file(&path).unwrap().build();
    assert!(matches!(result, Err(MetainfoError::MissingField("announce"))));

    let result = TorrentBuilder::single_file(temp.path().join("missing.bin"))
        .unwrap()
        .announce(ANNOUNCE)
        .build();
    assert!(matches!(result, Err(MetainfoError::Io(_))));
}
