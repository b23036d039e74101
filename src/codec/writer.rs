//! Record and sequence writers.

use super::format::*;
use super::record::Record;

/// Field writer backing a single encoded record.
///
/// Writing never fails: every in-memory value has an encoding.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buffer: Vec<u8>,
}

impl RecordWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with a preallocated buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the writer and return its buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Write a raw varint (no key).
    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buffer.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buffer.push(value as u8);
    }

    /// Write a field key.
    pub fn write_key(&mut self, field: u32, wire_type: WireType) {
        self.write_varint(make_key(field, wire_type));
    }

    /// Write an unsigned varint field.
    pub fn write_u64(&mut self, field: u32, value: u64) {
        self.write_key(field, WireType::Varint);
        self.write_varint(value);
    }

    /// Write a signed (zigzag) varint field.
    pub fn write_i64(&mut self, field: u32, value: i64) {
        self.write_key(field, WireType::Varint);
        self.write_varint(zigzag_encode(value));
    }

    pub fn write_bool(&mut self, field: u32, value: bool) {
        self.write_u64(field, value as u64);
    }

    pub fn write_fixed64(&mut self, field: u32, value: u64) {
        self.write_key(field, WireType::Fixed64);
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_fixed32(&mut self, field: u32, value: u32) {
        self.write_key(field, WireType::Fixed32);
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a length-delimited byte field.
    pub fn write_bytes(&mut self, field: u32, value: &[u8]) {
        self.write_key(field, WireType::LengthDelimited);
        self.write_varint(value.len() as u64);
        self.buffer.extend_from_slice(value);
    }

    /// Write a UTF-8 string field.
    pub fn write_str(&mut self, field: u32, value: &str) {
        self.write_bytes(field, value.as_bytes());
    }

    /// Write a nested record as a length-delimited field.
    pub fn write_message<R: Record>(&mut self, field: u32, value: &R) {
        let mut nested = RecordWriter::new();
        value.encode_fields(&mut nested);
        self.write_bytes(field, nested.as_bytes());
    }
}

/// Incremental writer for a sequence of records.
///
/// Each element is framed as `key(SEQUENCE_TAG, length-delimited)`, its
/// length, then its bytes, so elements can be appended one at a time
/// without knowing the final count.
#[derive(Debug, Default)]
pub struct SequenceWriter {
    inner: RecordWriter,
    count: usize,
}

impl SequenceWriter {
    /// Create a new sequence writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one element.
    pub fn push<R: Record>(&mut self, value: &R) {
        self.inner.write_message(SEQUENCE_TAG, value);
        self.count += 1;
    }

    /// Number of elements appended.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Consume the writer and return the encoded sequence.
    pub fn finish(self) -> Vec<u8> {
        self.inner.into_bytes()
    }
}

/// Encode a single record.
pub fn encode<R: Record>(value: &R) -> Vec<u8> {
    let mut writer = RecordWriter::new();
    value.encode_fields(&mut writer);
    writer.into_bytes()
}

/// Encode an ordered sequence of records.
pub fn encode_sequence<R: Record>(values: &[R]) -> Vec<u8> {
    let mut writer = SequenceWriter::new();
    for value in values {
        writer.push(value);
    }
    writer.finish()
}
