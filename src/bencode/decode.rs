use super::error::BencodeError;
use super::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::io::{ErrorKind, Read};
use std::ops::Range;

const MAX_DEPTH: usize = 64;

/// Upper bound on the buffer reserved up front for a byte string. Longer
/// strings grow as their bytes actually arrive.
const PREALLOCATE_LIMIT: u64 = 64 * 1024;

/// Decodes a complete bencode buffer.
///
/// The buffer must hold exactly one value; anything after it is rejected with
/// [`BencodeError::TrailingData`].
pub fn decode(data: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder::new(data);
    let value = decoder.decode_value()?;

    if decoder.offset() != data.len() as u64 {
        return Err(BencodeError::TrailingData {
            offset: decoder.offset(),
        });
    }

    Ok(value)
}

/// Decodes one value from a reader, consuming only the bytes that belong to it.
///
/// Pass `&mut reader` to keep using the stream afterwards.
pub fn decode_from<R: Read>(reader: R) -> Result<Value, BencodeError> {
    Decoder::new(reader).decode_value()
}

/// Finds the byte span of the value stored under `key` in a top-level
/// dictionary, without re-encoding it.
///
/// If the key occurs more than once the last occurrence is reported, matching
/// the value [`decode`] keeps.
pub fn dict_entry_span(data: &[u8], key: &[u8]) -> Result<Option<Range<usize>>, BencodeError> {
    let mut decoder = Decoder::new(data);
    let first = decoder.next_byte()?;
    if first != b'd' {
        return Err(decoder.unexpected(first));
    }

    let mut span = None;
    loop {
        let byte = decoder.next_byte()?;
        match byte {
            b'e' => return Ok(span),
            b'0'..=b'9' => {
                let entry_key = decoder.decode_bytes(byte)?;
                let start = decoder.offset() as usize;
                let first = decoder.next_byte()?;
                decoder.decode_with(first, 1)?;
                if entry_key.as_ref() == key {
                    span = Some(start..decoder.offset() as usize);
                }
            }
            _ => return Err(decoder.unexpected(byte)),
        }
    }
}

/// A streaming bencode decoder.
///
/// Reads byte by byte from the underlying reader and never reads past the end
/// of the value being decoded, so several values can be decoded back to back
/// from one stream. Wrap unbuffered sources such as files in a
/// [`std::io::BufReader`].
pub struct Decoder<R> {
    reader: R,
    offset: u64,
}

impl<R: Read> Decoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decodes the next value from the stream.
    pub fn decode_value(&mut self) -> Result<Value, BencodeError> {
        let first = self.next_byte()?;
        self.decode_with(first, 0)
    }

    fn decode_with(&mut self, first: u8, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::NestingTooDeep {
                offset: self.offset - 1,
            });
        }

        match first {
            b'i' => self.decode_integer(),
            b'l' => self.decode_list(depth),
            b'd' => self.decode_dict(depth),
            b'0'..=b'9' => self.decode_bytes(first).map(Value::Bytes),
            byte => Err(self.unexpected(byte)),
        }
    }

    fn decode_integer(&mut self) -> Result<Value, BencodeError> {
        let mut byte = self.next_byte()?;
        let negative = byte == b'-';
        if negative {
            byte = self.next_byte()?;
        }

        match byte {
            b'0' if !negative => {
                let end = self.next_byte()?;
                if end != b'e' {
                    return Err(self.unexpected(end));
                }
                return Ok(Value::Integer(0));
            }
            b'1'..=b'9' => {}
            _ => return Err(self.unexpected(byte)),
        }

        // Accumulating towards the sign keeps i64::MIN representable.
        let mut value: i64 = 0;
        loop {
            let digit = i64::from(byte - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or_else(|| self.unexpected(byte))?;

            byte = self.next_byte()?;
            match byte {
                b'e' => return Ok(Value::Integer(value)),
                b'0'..=b'9' => {}
                _ => return Err(self.unexpected(byte)),
            }
        }
    }

    fn decode_bytes(&mut self, first: u8) -> Result<Bytes, BencodeError> {
        let mut length = u64::from(first - b'0');
        loop {
            let byte = self.next_byte()?;
            match byte {
                b':' => break,
                b'0'..=b'9' if length != 0 => {
                    length = length
                        .checked_mul(10)
                        .and_then(|l| l.checked_add(u64::from(byte - b'0')))
                        .ok_or_else(|| self.unexpected(byte))?;
                }
                _ => return Err(self.unexpected(byte)),
            }
        }

        let mut data = Vec::with_capacity(length.min(PREALLOCATE_LIMIT) as usize);
        let read = (&mut self.reader).take(length).read_to_end(&mut data)? as u64;
        self.offset += read;

        if read < length {
            return Err(BencodeError::UnexpectedEof {
                offset: self.offset,
            });
        }

        Ok(Bytes::from(data))
    }

    fn decode_list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        let mut list = Vec::new();
        loop {
            let byte = self.next_byte()?;
            if byte == b'e' {
                return Ok(Value::List(list));
            }
            list.push(self.decode_with(byte, depth + 1)?);
        }
    }

    fn decode_dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        let mut dict = BTreeMap::new();
        loop {
            let byte = self.next_byte()?;
            match byte {
                b'e' => return Ok(Value::Dict(dict)),
                b'0'..=b'9' => {
                    let key = self.decode_bytes(byte)?;
                    let first = self.next_byte()?;
                    let value = self.decode_with(first, depth + 1)?;
                    dict.insert(key, value);
                }
                _ => return Err(self.unexpected(byte)),
            }
        }
    }

    fn next_byte(&mut self) -> Result<u8, BencodeError> {
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => {
                    return Err(BencodeError::UnexpectedEof {
                        offset: self.offset,
                    })
                }
                Ok(_) => {
                    self.offset += 1;
                    return Ok(buf[0]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Error for the byte most recently returned by `next_byte`.
    fn unexpected(&self, byte: u8) -> BencodeError {
        BencodeError::UnexpectedByte {
            byte,
            offset: self.offset - 1,
        }
    }
}
