use std::collections::BTreeMap;

use bytes::Bytes;

use super::*;

fn syntax_error(data: &[u8]) -> (Option<u8>, u64) {
    match decode(data) {
        Err(BencodeError::UnexpectedByte { byte, offset }) => (Some(byte), offset),
        Err(BencodeError::UnexpectedEof { offset }) => (None, offset),
        other => panic!("expected syntax error for {:?}, got {:?}", data, other),
    }
}

#[test]
fn test_decode_integer() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Integer(42));
    assert_eq!(decode(b"i-42e").unwrap(), Value::Integer(-42));
    assert_eq!(decode(b"i0e").unwrap(), Value::Integer(0));
}

#[test]
fn test_decode_integer_full_range() {
    assert_eq!(
        decode(b"i9223372036854775807e").unwrap(),
        Value::Integer(i64::MAX)
    );
    assert_eq!(
        decode(b"i-9223372036854775808e").unwrap(),
        Value::Integer(i64::MIN)
    );
    assert_eq!(syntax_error(b"i9223372036854775808e"), (Some(b'8'), 19));
}

#[test]
fn test_decode_integer_invalid() {
    assert_eq!(syntax_error(b"i00e"), (Some(b'0'), 2));
    assert_eq!(syntax_error(b"i01e"), (Some(b'1'), 2));
    assert_eq!(syntax_error(b"i-0e"), (Some(b'0'), 2));
    assert_eq!(syntax_error(b"ie"), (Some(b'e'), 1));
    assert_eq!(syntax_error(b"i1"), (None, 2));
    assert_eq!(syntax_error(b"i1-e"), (Some(b'-'), 2));
    assert_eq!(syntax_error(b"i--1e"), (Some(b'-'), 2));
}

#[test]
fn test_decode_bytes() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(decode(b"0:").unwrap(), Value::Bytes(Bytes::from_static(b"")));
}

#[test]
fn test_decode_bytes_invalid() {
    assert_eq!(syntax_error(b"2:a"), (None, 3));
    assert_eq!(syntax_error(b"-1:a"), (Some(b'-'), 0));
    assert_eq!(syntax_error(b":a"), (Some(b':'), 0));
    assert_eq!(syntax_error(b"1e:a"), (Some(b'e'), 1));
    assert_eq!(syntax_error(b"01:a"), (Some(b'1'), 1));
}

#[test]
fn test_decode_list() {
    let result = decode(b"l4:spami42ee").unwrap();
    match result {
        Value::List(l) => {
            assert_eq!(l.len(), 2);
            assert_eq!(l[0], Value::Bytes(Bytes::from_static(b"spam")));
            assert_eq!(l[1], Value::Integer(42));
        }
        _ => panic!("expected list"),
    }
}

#[test]
fn test_decode_dict() {
    let result = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    match result {
        Value::Dict(d) => {
            assert_eq!(d.len(), 2);
            assert_eq!(
                d.get(&Bytes::from_static(b"cow")),
                Some(&Value::Bytes(Bytes::from_static(b"moo")))
            );
        }
        _ => panic!("expected dict"),
    }
}

#[test]
fn test_decode_dict_out_of_order_keys() {
    let value = decode(b"d4:spam4:eggs3:cow3:mooe").unwrap();
    assert_eq!(value.get(b"spam").and_then(Value::as_str), Some("eggs"));
    assert_eq!(encode(&value), b"d3:cow3:moo4:spam4:eggse");
}

#[test]
fn test_decode_dict_non_string_key() {
    assert_eq!(syntax_error(b"di1ei2ee"), (Some(b'i'), 1));
}

#[test]
fn test_decode_unterminated_containers() {
    assert_eq!(syntax_error(b"l4:spam"), (None, 7));
    assert_eq!(syntax_error(b"d3:cow"), (None, 6));
    assert_eq!(syntax_error(b""), (None, 0));
}

#[test]
fn test_encode_integer() {
    assert_eq!(encode(&Value::Integer(42)), b"i42e");
    assert_eq!(encode(&Value::Integer(-42)), b"i-42e");
    assert_eq!(encode(&Value::Integer(0)), b"i0e");
}

#[test]
fn test_encode_bytes() {
    assert_eq!(encode(&Value::Bytes(Bytes::from_static(b"spam"))), b"4:spam");
    assert_eq!(encode(&Value::string("")), b"0:");
    assert_eq!(encode(&Value::string("aā")), "3:aā".as_bytes());
}

#[test]
fn test_encode_empty_containers() {
    assert_eq!(encode(&Value::List(vec![])), b"le");
    assert_eq!(encode(&Value::Dict(BTreeMap::new())), b"de");
}

#[test]
fn test_encode_dict_sorts_keys() {
    let mut dict = BTreeMap::new();
    dict.insert(Bytes::from_static(b"spam"), Value::string("eggs"));
    dict.insert(Bytes::from_static(b"cow"), Value::string("moo"));
    assert_eq!(encode(&Value::Dict(dict)), b"d3:cow3:moo4:spam4:eggse");

    let value = Value::dict([("b", Value::Integer(2)), ("a", Value::Integer(1))]);
    assert_eq!(encode(&value), b"d1:ai1e1:bi2ee");
}

#[test]
fn test_encode_dict_byte_order() {
    // Byte order, not character order: uppercase sorts before lowercase.
    let value = Value::dict([("a", Value::Integer(1)), ("B", Value::Integer(2))]);
    assert_eq!(encode(&value), b"d1:Bi2e1:ai1ee");
}

#[test]
fn test_roundtrip() {
    let original = b"d8:announce15:http://test.com4:infod4:name4:test12:piece lengthi16384eee";
    let decoded = decode(original).unwrap();
    let encoded = encode(&decoded);
    assert_eq!(encoded, original);
}

#[test]
fn test_nested_structures() {
    let data = b"d4:listl4:spami42eee";
    let decoded = decode(data).unwrap();
    assert_eq!(decode(&encode(&decoded)).unwrap(), decoded);
    assert_eq!(encode(&decoded), data);
}

#[test]
fn test_trailing_data_error() {
    assert!(matches!(
        decode(b"i42eextra"),
        Err(BencodeError::TrailingData { offset: 4 })
    ));
}

#[test]
fn test_nesting_too_deep() {
    let mut data = vec![b'l'; 100];
    data.extend(vec![b'e'; 100]);
    assert!(matches!(
        decode(&data),
        Err(BencodeError::NestingTooDeep { .. })
    ));
}

#[test]
fn test_stream_decode_consumes_one_value() {
    let mut stream: &[u8] = b"d1:ai1ee4:tail";
    let value = decode_from(&mut stream).unwrap();
    assert_eq!(value.get(b"a"), Some(&Value::Integer(1)));
    assert_eq!(stream, b"4:tail");

    let mut decoder = Decoder::new(stream);
    assert_eq!(decoder.decode_value().unwrap(), Value::string("tail"));
    assert_eq!(decoder.offset(), 6);
}

#[test]
fn test_dict_entry_span() {
    let data = b"d8:announce3:url4:infod4:name1:xe7:comment0:e";
    let span = dict_entry_span(data, b"info").unwrap().unwrap();
    assert_eq!(&data[span], b"d4:name1:xe");
    assert_eq!(dict_entry_span(data, b"missing").unwrap(), None);
    assert!(dict_entry_span(b"i1e", b"info").is_err());
}

#[test]
fn test_error_offsets() {
    let err = decode(b"l1:ax").unwrap_err();
    assert_eq!(err.offset(), Some(4));
}

#[test]
fn test_value_accessors() {
    let value = Value::Integer(42);
    assert_eq!(value.as_integer(), Some(42));
    assert!(value.as_bytes().is_none());

    let value = Value::Bytes(Bytes::from_static(b"test"));
    assert_eq!(value.as_str(), Some("test"));
    assert!(value.as_integer().is_none());

    let value = Value::List(vec![]);
    assert!(value.as_list().is_some());
    assert!(value.as_dict().is_none());
}
