//! Tests for the codec working as a whole: adapters, nesting and
//! sequence framing.

use super::*;
use crate::error::DecodeError;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Author {
    id: i64,
    name: String,
}

impl Record for Author {
    fn encode_fields(&self, writer: &mut RecordWriter) {
        writer.write_i64(1, self.id);
        writer.write_str(2, &self.name);
    }

    fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
        let mut id = None;
        let mut name = String::new();
        while let Some((field, wire_type)) = reader.next_field()? {
            match (field, wire_type) {
                (1, WireType::Varint) => id = Some(reader.read_i64()?),
                (2, WireType::LengthDelimited) => name = reader.read_string(field)?,
                _ => return Err(reader.unexpected(field, wire_type)),
            }
        }
        Ok(Author {
            id: id.ok_or(DecodeError::MissingField("id"))?,
            name,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Post {
    title: String,
    author: Author,
    score: u64,
    pinned: bool,
}

impl Record for Post {
    fn encode_fields(&self, writer: &mut RecordWriter) {
        writer.write_str(1, &self.title);
        writer.write_message(2, &self.author);
        writer.write_fixed64(3, self.score);
        writer.write_bool(4, self.pinned);
    }

    fn decode_fields(reader: &mut RecordReader<'_>) -> Result<Self, DecodeError> {
        let mut title = String::new();
        let mut author = None;
        let mut score = 0;
        let mut pinned = false;
        while let Some((field, wire_type)) = reader.next_field()? {
            match (field, wire_type) {
                (1, WireType::LengthDelimited) => title = reader.read_string(field)?,
                (2, WireType::LengthDelimited) => author = Some(reader.read_message()?),
                (3, WireType::Fixed64) => score = reader.read_fixed64()?,
                (4, WireType::Varint) => pinned = reader.read_bool()?,
                _ => return Err(reader.unexpected(field, wire_type)),
            }
        }
        Ok(Post {
            title,
            author: author.ok_or(DecodeError::MissingField("author"))?,
            score,
            pinned,
        })
    }
}

fn sample_post(n: i64) -> Post {
    Post {
        title: format!("post #{}", n),
        author: Author {
            id: -n,
            name: "tester".to_string(),
        },
        score: n as u64 * 1000,
        pinned: n % 2 == 0,
    }
}

// ============================================================================
// Single records
// ============================================================================

#[test]
fn test_nested_record_roundtrip() {
    let post = sample_post(3);
    let bytes = encode(&post);
    assert_eq!(decode::<Post>(&bytes).unwrap(), post);
}

#[test]
fn test_builtin_adapters() {
    assert_eq!(decode::<i64>(&encode(&-5i64)).unwrap(), -5);
    assert_eq!(decode::<u64>(&encode(&u64::MAX)).unwrap(), u64::MAX);
    assert!(decode::<bool>(&encode(&true)).unwrap());
    assert_eq!(
        decode::<String>(&encode(&"héllo".to_string())).unwrap(),
        "héllo"
    );
    assert_eq!(
        decode::<Vec<u8>>(&encode(&vec![0u8, 1, 2])).unwrap(),
        vec![0, 1, 2]
    );
}

#[test]
fn test_empty_input_is_default_scalar() {
    assert_eq!(decode::<String>(&[]).unwrap(), "");
    assert_eq!(decode::<u64>(&[]).unwrap(), 0);
}

#[test]
fn test_missing_required_field() {
    // Only field 2 (name) present
    let mut writer = RecordWriter::new();
    writer.write_str(2, "nobody");
    assert_eq!(
        decode::<Author>(writer.as_bytes()),
        Err(DecodeError::MissingField("id"))
    );
}

#[test]
fn test_unexpected_field_is_rejected() {
    let mut writer = RecordWriter::new();
    writer.write_i64(1, 1);
    writer.write_u64(9, 42);
    assert_eq!(
        decode::<Author>(writer.as_bytes()),
        Err(DecodeError::UnexpectedField {
            field: 9,
            wire_type: 0
        })
    );
}

#[test]
fn test_wrong_wire_type_is_rejected() {
    // field 1 written as a string where a varint is expected
    let mut writer = RecordWriter::new();
    writer.write_str(1, "1");
    assert!(matches!(
        decode::<Author>(writer.as_bytes()),
        Err(DecodeError::UnexpectedField { field: 1, .. })
    ));
}

#[test]
fn test_truncated_record() {
    let bytes = encode(&sample_post(1));

    // Inside the title payload
    assert!(matches!(
        decode::<Post>(&bytes[..3]),
        Err(DecodeError::Truncated { .. })
    ));
    // Key of the last field without its value
    assert!(matches!(
        decode::<Post>(&bytes[..bytes.len() - 1]),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn test_invalid_utf8() {
    let mut writer = RecordWriter::new();
    writer.write_bytes(1, &[0xff, 0xfe]);
    assert_eq!(
        decode::<String>(writer.as_bytes()),
        Err(DecodeError::InvalidUtf8 { field: 1 })
    );
}

#[test]
fn test_garbage_bytes_fail() {
    assert!(decode::<Post>(b"this is not a record").is_err());
}

// ============================================================================
// Sequences
// ============================================================================

#[test]
fn test_sequence_roundtrip() {
    let posts: Vec<Post> = (0..5).map(sample_post).collect();
    let bytes = encode_sequence(&posts);
    assert_eq!(decode_sequence::<Post>(&bytes).unwrap(), posts);
}

#[test]
fn test_empty_sequence_roundtrip() {
    let bytes = encode_sequence::<Post>(&[]);
    assert!(decode_sequence::<Post>(&bytes).unwrap().is_empty());
}

#[test]
fn test_incremental_writer_matches_batch() {
    let posts: Vec<Post> = (0..3).map(sample_post).collect();
    let mut writer = SequenceWriter::new();
    for post in &posts {
        writer.push(post);
    }
    assert_eq!(writer.count(), 3);
    assert_eq!(writer.finish(), encode_sequence(&posts));
}

#[test]
fn test_sequence_trailing_foreign_tag_fails_whole_decode() {
    let mut bytes = encode_sequence(&[sample_post(1)]);
    // key for field 1, varint: not the sequence tag
    bytes.push(0x08);
    bytes.push(0x01);

    let err = decode_sequence::<Post>(&bytes).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Protocol {
            field: 1,
            wire_type: 0
        }
    );
    assert!(err.is_protocol());
}

#[test]
fn test_sequence_trailing_single_byte_fails() {
    let mut bytes = encode_sequence(&[sample_post(1)]);
    bytes.push(0x10);
    assert!(decode_sequence::<Post>(&bytes).unwrap_err().is_protocol());
}

#[test]
fn test_sequence_trailing_invalid_key_is_protocol() {
    // Field zero, then an unknown wire type
    for (trailing, field, wire_type) in [(0x00u8, 0u32, 0u8), (0x0b, 1, 3)] {
        let mut bytes = encode_sequence(&[sample_post(1)]);
        bytes.push(trailing);
        assert_eq!(
            decode_sequence::<Post>(&bytes).unwrap_err(),
            DecodeError::Protocol { field, wire_type }
        );
    }
}

#[test]
fn test_sequence_truncated_element_is_not_protocol() {
    let bytes = encode_sequence(&[sample_post(1)]);
    let err = decode_sequence::<Post>(&bytes[..bytes.len() - 1]).unwrap_err();
    assert!(!err.is_protocol());
}

#[test]
fn test_sequence_tag_with_wrong_wire_type_fails() {
    let mut writer = RecordWriter::new();
    writer.write_u64(SEQUENCE_TAG, 1);
    assert!(matches!(
        decode_sequence::<Post>(writer.as_bytes()),
        Err(DecodeError::Protocol { field: SEQUENCE_TAG, wire_type: 0 })
    ));
}

#[test]
fn test_single_record_is_not_a_sequence() {
    let bytes = encode(&sample_post(1));
    assert!(decode_sequence::<Post>(&bytes).unwrap_err().is_protocol());
}

#[test]
fn test_corrupt_element_fails_sequence() {
    let mut writer = SequenceWriter::new();
    writer.push(&sample_post(1));
    // Element that is a valid Author but not a valid Post
    writer.push(&Author {
        id: 1,
        name: "x".into(),
    });
    let bytes = writer.finish();
    assert!(decode_sequence::<Post>(&bytes).is_err());
}

// ============================================================================
// Raw records
// ============================================================================

#[test]
fn test_raw_record_reads_any_record() {
    let post = sample_post(4);
    let raw: RawRecord = decode(&encode(&post)).unwrap();

    let fields: Vec<u32> = raw.fields.iter().map(|(f, _)| *f).collect();
    assert_eq!(fields, vec![1, 2, 3, 4]);
    assert_eq!(raw.fields[0].1, FieldValue::Bytes(b"post #4".to_vec()));
    assert_eq!(raw.fields[2].1.wire_type(), WireType::Fixed64);

    // Raw re-encoding is byte-identical
    assert_eq!(encode(&raw), encode(&post));
}

// ============================================================================
// Properties
// ============================================================================

fn arb_post() -> impl Strategy<Value = Post> {
    (any::<i64>(), ".*", ".*", any::<u64>(), any::<bool>()).prop_map(
        |(id, name, title, score, pinned)| Post {
            title,
            author: Author { id, name },
            score,
            pinned,
        },
    )
}

proptest! {
    #[test]
    fn prop_record_roundtrip(post in arb_post()) {
        prop_assert_eq!(decode::<Post>(&encode(&post)).unwrap(), post);
    }

    #[test]
    fn prop_sequence_roundtrip(posts in proptest::collection::vec(arb_post(), 0..16)) {
        prop_assert_eq!(decode_sequence::<Post>(&encode_sequence(&posts)).unwrap(), posts);
    }
}
