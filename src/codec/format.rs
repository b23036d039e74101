//! Wire format constants and key helpers.

use crate::error::DecodeError;

/// Tag written before every element of an encoded sequence.
pub const SEQUENCE_TAG: u32 = 114514;

/// Largest valid field number (29 bits).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Maximum encoded length of a varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Wire type identifiers (low three bits of a key).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    /// LEB128 varint
    Varint = 0,
    /// 8 bytes, little-endian
    Fixed64 = 1,
    /// Varint length followed by that many bytes
    LengthDelimited = 2,
    /// 4 bytes, little-endian
    Fixed32 = 5,
}

impl WireType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Varint),
            1 => Some(Self::Fixed64),
            2 => Some(Self::LengthDelimited),
            5 => Some(Self::Fixed32),
            _ => None,
        }
    }

    /// Convert to a u8 value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Build the key for a field.
pub fn make_key(field: u32, wire_type: WireType) -> u64 {
    debug_assert!(field != 0 && field <= MAX_FIELD_NUMBER);
    ((field as u64) << 3) | wire_type.as_u8() as u64
}

/// Split a key into field number and wire type.
pub fn split_key(key: u64) -> Result<(u32, WireType), DecodeError> {
    let field = key >> 3;
    if field == 0 || field > MAX_FIELD_NUMBER as u64 {
        return Err(DecodeError::InvalidField(field));
    }
    let field = field as u32;
    let raw = (key & 0x7) as u8;
    let wire_type = WireType::from_u8(raw).ok_or(DecodeError::UnknownWireType {
        field,
        wire_type: raw,
    })?;
    Ok((field, wire_type))
}

/// ZigZag-encode a signed integer.
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// ZigZag-decode a signed integer.
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes needed to encode `value` as a varint.
pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}
