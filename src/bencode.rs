//! Bencode encoding and decoding ([BEP-3]).
//!
//! Bencode is the serialization format used for `.torrent` files, tracker
//! responses and the persisted session state.
//!
//! | Type | Format | Example |
//! |------|--------|---------|
//! | Integer | `i<number>e` | `i42e` → 42 |
//! | Byte String | `<length>:<data>` | `4:spam` → "spam" |
//! | List | `l<items>e` | `l4:spami42ee` → ["spam", 42] |
//! | Dictionary | `d<key><value>...e` | `d3:foo3:bare` → {"foo": "bar"} |
//!
//! Writing is canonical: dictionary keys come out in ascending byte order and
//! integers never carry leading zeros. Reading is strict about the grammar
//! but accepts dictionaries whose keys are out of order.
//!
//! # Examples
//!
//! ```
//! use bitpiece::bencode::{decode, decode_from, encode, Value};
//!
//! let value = decode(b"l4:spami42ee").unwrap();
//! assert_eq!(value.as_list().map(|l| l.len()), Some(2));
//! assert_eq!(encode(&value), b"l4:spami42ee");
//!
//! // A stream decode stops right after the value.
//! let mut stream: &[u8] = b"i1ei2e";
//! assert_eq!(decode_from(&mut stream).unwrap(), Value::Integer(1));
//! assert_eq!(stream, b"i2e");
//! ```
//!
//! # Errors
//!
//! - [`BencodeError::UnexpectedEof`] - Input ended inside a value
//! - [`BencodeError::UnexpectedByte`] - A byte that the grammar does not allow
//!   at that position (leading zeros, `-0`, bad length prefixes, ...)
//! - [`BencodeError::NestingTooDeep`] - Recursion limit exceeded (max 64 levels)
//! - [`BencodeError::TrailingData`] - Extra data after the value
//!
//! [BEP-3]: http://bittorrent.org/beps/bep_0003.html

mod decode;
mod encode;
mod error;
mod value;

pub use decode::{decode, decode_from, dict_entry_span, Decoder};
pub use encode::{encode, encode_to};
pub use error::BencodeError;
pub use value::Value;

#[cfg(test)]
mod tests;
