//! Record and sequence readers.

use super::format::*;
use super::record::Record;
use crate::error::DecodeError;

/// Cursor over the bytes of one encoded record.
///
/// Field payload readers do not re-check the wire type; adapters match on
/// `(field, wire_type)` returned by [`RecordReader::next_field`] and reject
/// anything else with [`RecordReader::unexpected`].
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    /// Create a reader over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read a raw varint.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or(DecodeError::Truncated { offset: self.pos })?;
            self.pos += 1;

            // The tenth byte may only contribute the top bit.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(DecodeError::VarintOverflow { offset: start });
            }
            value |= ((byte & 0x7f) as u64) << (7 * i);
            if byte < 0x80 {
                return Ok(value);
            }
        }
        Err(DecodeError::VarintOverflow { offset: start })
    }

    /// Read the next field key, or `None` at end of input.
    pub fn next_field(&mut self) -> Result<Option<(u32, WireType)>, DecodeError> {
        if self.is_eof() {
            return Ok(None);
        }
        let key = self.read_varint()?;
        split_key(key).map(Some)
    }

    /// Error for a field the adapter does not accept.
    pub fn unexpected(&self, field: u32, wire_type: WireType) -> DecodeError {
        DecodeError::UnexpectedField {
            field,
            wire_type: wire_type.as_u8(),
        }
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        self.read_varint()
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.read_varint().map(zigzag_decode)
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        self.read_varint().map(|v| v != 0)
    }

    pub fn read_fixed64(&mut self) -> Result<u64, DecodeError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_fixed32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_le_bytes(buf))
    }

    /// Read a length-delimited payload.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::Truncated { offset: self.pos })?;
        self.take(len)
    }

    /// Read a length-delimited UTF-8 string for `field`.
    pub fn read_string(&mut self, field: u32) -> Result<String, DecodeError> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field })
    }

    /// Read a nested record.
    pub fn read_message<R: Record>(&mut self) -> Result<R, DecodeError> {
        let bytes = self.read_bytes()?;
        decode(bytes)
    }

    /// Fail if any input remains.
    pub fn finish(mut self) -> Result<(), DecodeError> {
        match self.next_field()? {
            None => Ok(()),
            Some((field, wire_type)) => Err(self.unexpected(field, wire_type)),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(DecodeError::Truncated {
                offset: self.data.len(),
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }
}

/// Decode a single record.
pub fn decode<R: Record>(data: &[u8]) -> Result<R, DecodeError> {
    let mut reader = RecordReader::new(data);
    let value = R::decode_fields(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

/// Decode a sequence written by [`super::encode_sequence`].
///
/// Every key at an element boundary must be the sequence tag with the
/// length-delimited wire type. Any other key, including one that is not a
/// valid key at all, fails the whole decode with [`DecodeError::Protocol`];
/// a partial list is never returned. Errors inside an element are reported
/// as they are.
pub fn decode_sequence<R: Record>(data: &[u8]) -> Result<Vec<R>, DecodeError> {
    let mut reader = RecordReader::new(data);
    let mut result = Vec::new();

    while !reader.is_eof() {
        let key = reader.read_varint()?;
        match split_key(key) {
            Ok((SEQUENCE_TAG, WireType::LengthDelimited)) => result.push(reader.read_message()?),
            _ => return Err(protocol_error(key)),
        }
    }

    Ok(result)
}

fn protocol_error(key: u64) -> DecodeError {
    DecodeError::Protocol {
        field: u32::try_from(key >> 3).unwrap_or(u32::MAX),
        wire_type: (key & 0x7) as u8,
    }
}
