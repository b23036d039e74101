//! The `Record` adapter trait and built-in adapters.

use super::format::WireType;
use super::reader::RecordReader;
use super::writer::RecordWriter;
use crate::error::DecodeError;

/// Type-specific adapter between a value and its tagged fields.
///
/// `decode_fields` must consume the reader to the end and reject any field
/// it does not know with [`RecordReader::unexpected`]; unknown fields are
/// never skipped.
///
/// # Examples
/// ```
/// use stashguard::codec::{self, Record, RecordReader, RecordWriter, WireType};
/// use stashguard::DecodeError;
///
/// #[derive(Debug, PartialEq)]
/// struct Forum {
///     id: i64,
///     name: String,
/// }
///
/// impl Record for Forum {
///     fn encode_fields(&self, writer: &mut RecordWriter) {
///         writer.write_i64(1, self.id);
///         writer.write_str(2, &self.name);
///     }
///
///     fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
///         let mut id = None;
///         let mut name = None;
///         while let Some((field, wire_type)) = reader.next_field()? {
///             match (field, wire_type) {
///                 (1, WireType::Varint) => id = Some(reader.read_i64()?),
///                 (2, WireType::LengthDelimited) => name = Some(reader.read_string(field)?),
///                 _ => return Err(reader.unexpected(field, wire_type)),
///             }
///         }
///         Ok(Forum {
///             id: id.ok_or(DecodeError::MissingField("id"))?,
///             name: name.unwrap_or_default(),
///         })
///     }
/// }
///
/// let forum = Forum { id: 7, name: "rust".into() };
/// let bytes = codec::encode(&forum);
/// assert_eq!(codec::decode::<Forum>(&bytes).unwrap(), forum);
/// ```
pub trait Record: Sized {
    /// Write every field of `self`.
    fn encode_fields(&self, writer: &mut RecordWriter);

    /// Read a value from the fields remaining in `reader`.
    fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError>;
}

/// Single-field adapters store their value in field 1; an empty record
/// decodes to the type's default, mirroring proto3 scalar defaults.
macro_rules! scalar_record {
    ($ty:ty, $wire:path, $write:ident, $read:ident) => {
        impl Record for $ty {
            fn encode_fields(&self, writer: &mut RecordWriter) {
                writer.$write(1, *self);
            }

            fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
                let mut value = <$ty>::default();
                while let Some((field, wire_type)) = reader.next_field()? {
                    match (field, wire_type) {
                        (1, $wire) => value = reader.$read()?,
                        _ => return Err(reader.unexpected(field, wire_type)),
                    }
                }
                Ok(value)
            }
        }
    };
}

scalar_record!(u64, WireType::Varint, write_u64, read_u64);
scalar_record!(i64, WireType::Varint, write_i64, read_i64);
scalar_record!(bool, WireType::Varint, write_bool, read_bool);

impl Record for String {
    fn encode_fields(&self, writer: &mut RecordWriter) {
        writer.write_str(1, self);
    }

    fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
        let mut value = String::new();
        while let Some((field, wire_type)) = reader.next_field()? {
            match (field, wire_type) {
                (1, WireType::LengthDelimited) => value = reader.read_string(field)?,
                _ => return Err(reader.unexpected(field, wire_type)),
            }
        }
        Ok(value)
    }
}

impl Record for Vec<u8> {
    fn encode_fields(&self, writer: &mut RecordWriter) {
        writer.write_bytes(1, self);
    }

    fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
        let mut value = Vec::new();
        while let Some((field, wire_type)) = reader.next_field()? {
            match (field, wire_type) {
                (1, WireType::LengthDelimited) => value = reader.read_bytes()?.to_vec(),
                _ => return Err(reader.unexpected(field, wire_type)),
            }
        }
        Ok(value)
    }
}

/// Value of one field in a [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Varint(u64),
    Fixed64(u64),
    Bytes(Vec<u8>),
    Fixed32(u32),
}

impl FieldValue {
    /// Wire type this value is encoded with.
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldValue::Varint(_) => WireType::Varint,
            FieldValue::Fixed64(_) => WireType::Fixed64,
            FieldValue::Bytes(_) => WireType::LengthDelimited,
            FieldValue::Fixed32(_) => WireType::Fixed32,
        }
    }
}

/// Schema-less record that keeps every field in order.
///
/// Accepts any well-formed field, so it can read any cache file written
/// by this codec without knowing its record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub fields: Vec<(u32, FieldValue)>,
}

impl Record for RawRecord {
    fn encode_fields(&self, writer: &mut RecordWriter) {
        for (field, value) in &self.fields {
            match value {
                FieldValue::Varint(v) => writer.write_u64(*field, *v),
                FieldValue::Fixed64(v) => writer.write_fixed64(*field, *v),
                FieldValue::Bytes(v) => writer.write_bytes(*field, v),
                FieldValue::Fixed32(v) => writer.write_fixed32(*field, *v),
            }
        }
    }

    fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
        let mut fields = Vec::new();
        while let Some((field, wire_type)) = reader.next_field()? {
            let value = match wire_type {
                WireType::Varint => FieldValue::Varint(reader.read_u64()?),
                WireType::Fixed64 => FieldValue::Fixed64(reader.read_fixed64()?),
                WireType::LengthDelimited => FieldValue::Bytes(reader.read_bytes()?.to_vec()),
                WireType::Fixed32 => FieldValue::Fixed32(reader.read_fixed32()?),
            };
            fields.push((field, value));
        }
        Ok(RawRecord { fields })
    }
}
