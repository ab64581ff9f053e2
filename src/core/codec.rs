//! # Record Codec
//!
//! Decodes a byte stream into a [`Record`] following a compiled [`Schema`],
//! and encodes the inverse.
//!
//! Fields are processed in position order. A field declared with a dynamic
//! `bytecount` takes its width from the integer already decoded (or, when
//! encoding, already present) under the referenced sibling name.
//!
//! ## Value Conversion
//! | Kind  | Decode                                   | Encode                  |
//! |-------|------------------------------------------|-------------------------|
//! | Int   | left-pad to 8 bytes, big-endian, as i64   | 8 bytes big-endian      |
//! | Bytes | verbatim                                 | verbatim                |
//! | Text  | verbatim, UTF-8 checked on access        | raw bytes               |
//! | Bool  | exactly 1 byte, nonzero is true          | single `0`/`1` byte     |
//!
//! When encoding, every rendered value is fitted to its resolved width by
//! prepending zero bytes or by dropping leading bytes. This applies to text
//! and byte fields as well as integers.
//!
//! Text keeps the exact wire bytes, so decode followed by encode reproduces
//! the input even when a text field is not valid UTF-8. [`Record::text`]
//! reports `InvalidUtf8`; [`Record::text_bytes`] never fails on content.
//!
//! ## Security
//! Dynamically sized reads never preallocate the declared width; a huge size
//! with a short stream fails with `TruncatedInput` after reading what exists.

use crate::core::schema::{Field, FieldDef, FieldKind, Schema, Size};
use crate::error::{CodecError, Result, SchemaError};
use std::collections::HashMap;
use std::io::Read;
use std::sync::OnceLock;
use tracing::trace;

/// A single decoded field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Bytes(Vec<u8>),
    /// Raw text bytes, not guaranteed to be UTF-8
    Text(Vec<u8>),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Value::Int(_) => FieldKind::Int,
            Value::Bytes(_) => FieldKind::Bytes,
            Value::Text(_) => FieldKind::Text,
            Value::Bool(_) => FieldKind::Bool,
        }
    }

    fn to_wire(&self) -> Vec<u8> {
        match self {
            Value::Int(n) => n.to_be_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            Value::Text(s) => s.clone(),
            Value::Bool(b) => vec![u8::from(*b)],
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s.into_bytes())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.as_bytes().to_vec())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Field name to value mapping produced by [`decode`] and consumed by [`encode`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, name: &str) -> std::result::Result<i64, CodecError> {
        match self.lookup(name)? {
            Value::Int(n) => Ok(*n),
            other => Err(mismatch(name, FieldKind::Int, other)),
        }
    }

    pub fn boolean(&self, name: &str) -> std::result::Result<bool, CodecError> {
        match self.lookup(name)? {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(name, FieldKind::Bool, other)),
        }
    }

    pub fn bytes(&self, name: &str) -> std::result::Result<&[u8], CodecError> {
        match self.lookup(name)? {
            Value::Bytes(b) => Ok(b),
            other => Err(mismatch(name, FieldKind::Bytes, other)),
        }
    }

    /// Text field as `&str`; fails with `InvalidUtf8` if the bytes are not UTF-8
    pub fn text(&self, name: &str) -> std::result::Result<&str, CodecError> {
        std::str::from_utf8(self.text_bytes(name)?).map_err(|_| CodecError::InvalidUtf8 {
            field: name.to_string(),
        })
    }

    /// Text field exactly as it appeared on the wire
    pub fn text_bytes(&self, name: &str) -> std::result::Result<&[u8], CodecError> {
        match self.lookup(name)? {
            Value::Text(s) => Ok(s),
            other => Err(mismatch(name, FieldKind::Text, other)),
        }
    }

    /// Move a byte field out of the record
    pub fn take_bytes(&mut self, name: &str) -> std::result::Result<Vec<u8>, CodecError> {
        match self.values.remove(name) {
            Some(Value::Bytes(b)) => Ok(b),
            Some(other) => Err(mismatch(name, FieldKind::Bytes, &other)),
            None => Err(CodecError::MissingField(name.to_string())),
        }
    }

    /// Move a text field out of the record as a `String`
    pub fn take_text(&mut self, name: &str) -> std::result::Result<String, CodecError> {
        match self.values.remove(name) {
            Some(Value::Text(s)) => String::from_utf8(s).map_err(|_| CodecError::InvalidUtf8 {
                field: name.to_string(),
            }),
            Some(other) => Err(mismatch(name, FieldKind::Text, &other)),
            None => Err(CodecError::MissingField(name.to_string())),
        }
    }

    fn lookup(&self, name: &str) -> std::result::Result<&Value, CodecError> {
        self.values
            .get(name)
            .ok_or_else(|| CodecError::MissingField(name.to_string()))
    }
}

fn mismatch(name: &str, expected: FieldKind, found: &Value) -> CodecError {
    CodecError::UnknownType {
        field: name.to_string(),
        expected: expected.name(),
        found: found.kind().name(),
    }
}

/// Resolve the wire width of `field` against the values gathered so far
fn resolve_size(field: &Field, record: &Record) -> std::result::Result<usize, CodecError> {
    match field.size() {
        Size::Fixed(n) => Ok(*n),
        Size::DynamicRef(reference) => match record.get(reference) {
            Some(Value::Int(n)) => usize::try_from(*n).map_err(|_| CodecError::InvalidSize {
                field: field.name().to_string(),
                size: *n,
            }),
            _ => Err(CodecError::UnresolvedSize {
                field: field.name().to_string(),
                reference: reference.clone(),
            }),
        },
    }
}

fn read_field<R: Read>(
    reader: &mut R,
    field: &Field,
    size: usize,
) -> std::result::Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    reader.by_ref().take(size as u64).read_to_end(&mut buf)?;

    if buf.len() != size {
        return Err(CodecError::TruncatedInput {
            field: field.name().to_string(),
            expected: size,
            actual: buf.len(),
        });
    }
    Ok(buf)
}

fn decode_value(field: &Field, bytes: Vec<u8>) -> std::result::Result<Value, CodecError> {
    match field.kind() {
        FieldKind::Int => {
            if bytes.len() > 8 {
                return Err(CodecError::IntegerTooWide {
                    field: field.name().to_string(),
                    len: bytes.len(),
                });
            }
            let mut padded = [0u8; 8];
            padded[8 - bytes.len()..].copy_from_slice(&bytes);
            Ok(Value::Int(u64::from_be_bytes(padded) as i64))
        }
        FieldKind::Bytes => Ok(Value::Bytes(bytes)),
        FieldKind::Text => Ok(Value::Text(bytes)),
        FieldKind::Bool => match bytes.as_slice() {
            [b] => Ok(Value::Bool(*b != 0)),
            _ => Err(CodecError::InvalidBool {
                field: field.name().to_string(),
                len: bytes.len(),
            }),
        },
    }
}

/// Decode one record from `reader`.
///
/// Stops at the first failing field; nothing past it is read.
pub fn decode<R: Read>(reader: &mut R, schema: &Schema) -> std::result::Result<Record, CodecError> {
    let mut record = Record {
        values: HashMap::with_capacity(schema.len()),
    };

    for field in schema.fields() {
        let size = resolve_size(field, &record)?;
        let bytes = read_field(reader, field, size)?;
        trace!(field = field.name(), size, "Decoded field");
        let value = decode_value(field, bytes)?;
        record.values.insert(field.name().to_string(), value);
    }

    Ok(record)
}

/// Decode one record from the front of `bytes`
pub fn decode_slice(mut bytes: &[u8], schema: &Schema) -> std::result::Result<Record, CodecError> {
    decode(&mut bytes, schema)
}

/// Encode `record` into its wire form.
pub fn encode(record: &Record, schema: &Schema) -> std::result::Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();

    for field in schema.fields() {
        let size = resolve_size(field, record)?;
        let value = record
            .get(field.name())
            .ok_or_else(|| CodecError::MissingField(field.name().to_string()))?;
        if value.kind() != field.kind() {
            return Err(mismatch(field.name(), field.kind(), value));
        }

        let rendered = value.to_wire();
        if rendered.len() < size {
            out.resize(out.len() + size - rendered.len(), 0);
            out.extend_from_slice(&rendered);
        } else {
            out.extend_from_slice(&rendered[rendered.len() - size..]);
        }
    }

    Ok(out)
}

/// Lazily compiled, per-type schema storage for [`WireRecord`] implementations
pub struct SchemaCell(OnceLock<std::result::Result<Schema, SchemaError>>);

impl SchemaCell {
    pub const fn new() -> Self {
        Self(OnceLock::new())
    }

    /// Compile `fields` on first use; later calls return the cached outcome
    pub fn get_or_compile(
        &'static self,
        fields: &[FieldDef<'_>],
    ) -> std::result::Result<&'static Schema, SchemaError> {
        self.0
            .get_or_init(|| Schema::compile(fields))
            .as_ref()
            .map_err(Clone::clone)
    }
}

impl Default for SchemaCell {
    fn default() -> Self {
        Self::new()
    }
}

/// A statically declared binary record type.
///
/// ```rust
/// use maestro_protocol::core::codec::{Record, SchemaCell, WireRecord};
/// use maestro_protocol::core::schema::{FieldDef, FieldKind, Schema};
/// use maestro_protocol::error::{CodecError, SchemaError};
///
/// struct Ping {
///     seq: i64,
/// }
///
/// impl WireRecord for Ping {
///     const FIELDS: &'static [FieldDef<'static>] =
///         &[FieldDef::new("Seq", "position:1,bytecount:2", FieldKind::Int)];
///
///     fn schema() -> Result<&'static Schema, SchemaError> {
///         static SCHEMA: SchemaCell = SchemaCell::new();
///         SCHEMA.get_or_compile(Self::FIELDS)
///     }
///
///     fn from_record(record: Record) -> Result<Self, CodecError> {
///         Ok(Self { seq: record.int("Seq")? })
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new().with("Seq", self.seq)
///     }
/// }
///
/// let bytes = maestro_protocol::core::codec::encode_record(&Ping { seq: 7 }).unwrap();
/// assert_eq!(bytes, [0, 7]);
/// ```
pub trait WireRecord: Sized {
    /// Field declarations, one per candidate field
    const FIELDS: &'static [FieldDef<'static>];

    /// The compiled schema for this type
    fn schema() -> std::result::Result<&'static Schema, SchemaError>;

    fn from_record(record: Record) -> std::result::Result<Self, CodecError>;

    fn to_record(&self) -> Record;
}

/// Decode a typed record from `reader`
pub fn decode_record<T: WireRecord, R: Read>(reader: &mut R) -> Result<T> {
    let schema = T::schema()?;
    let record = decode(reader, schema)?;
    Ok(T::from_record(record)?)
}

/// Encode a typed record
pub fn encode_record<T: WireRecord>(value: &T) -> Result<Vec<u8>> {
    let schema = T::schema()?;
    Ok(encode(&value.to_record(), schema)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    fn schema(defs: &[FieldDef<'_>]) -> Schema {
        Schema::compile(defs).expect("valid schema")
    }

    fn cat(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    fn length_prefixed() -> Schema {
        schema(&[
            FieldDef::new("Data", "position:3,bytecount:ContentLength", FieldKind::Bytes),
            FieldDef::new("Version", "position:1,bytecount:4", FieldKind::Int),
            FieldDef::new("ContentLength", "position:2,bytecount:4", FieldKind::Int),
        ])
    }

    #[test]
    fn test_decode_dynamic_size() {
        let input = cat(&[&[0, 0, 0, 1], &[0, 0, 0, 5], b"hello"]);
        let record = decode_slice(&input, &length_prefixed()).unwrap();

        assert_eq!(record.int("Version").unwrap(), 1);
        assert_eq!(record.int("ContentLength").unwrap(), 5);
        assert_eq!(record.bytes("Data").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_two_fields_share_size() {
        let schema = schema(&[
            FieldDef::new("Version", "position:1,bytecount:4", FieldKind::Int),
            FieldDef::new("ContentLength", "position:2,bytecount:4", FieldKind::Int),
            FieldDef::new("Data", "position:3,bytecount:ContentLength", FieldKind::Bytes),
            FieldDef::new("ExtraData", "position:4,bytecount:ContentLength", FieldKind::Bytes),
        ]);
        let input = cat(&[&[0, 0, 0, 1], &[0, 0, 0, 5], b"hello", b"world"]);
        let record = decode_slice(&input, &schema).unwrap();

        assert_eq!(record.bytes("Data").unwrap(), b"hello");
        assert_eq!(record.bytes("ExtraData").unwrap(), b"world");
    }

    #[test]
    fn test_decode_does_not_over_read() {
        let input = cat(&[&[0, 0, 0, 1], &[0, 0, 0, 5], b"helloTRAILING"]);
        let mut reader = &input[..];
        let record = decode(&mut reader, &length_prefixed()).unwrap();

        assert_eq!(record.bytes("Data").unwrap(), b"hello");
        assert_eq!(reader, b"TRAILING");
    }

    #[test]
    fn test_decode_truncated() {
        let input = cat(&[&[0, 0, 0, 1], &[0, 0, 0, 5], b"hel"]);
        match decode_slice(&input, &length_prefixed()) {
            Err(CodecError::TruncatedInput {
                field,
                expected,
                actual,
            }) => {
                assert_eq!(field, "Data");
                assert_eq!(expected, 5);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_decode_huge_declared_size_is_truncation() {
        let input = cat(&[&[0, 0, 0, 1], &[0xFF, 0xFF, 0xFF, 0xFF], b"abc"]);
        assert!(matches!(
            decode_slice(&input, &length_prefixed()),
            Err(CodecError::TruncatedInput { actual: 3, .. })
        ));
    }

    #[test]
    fn test_decode_bool() {
        let flag = schema(&[FieldDef::new("Flag", "position:1,bytecount:1", FieldKind::Bool)]);
        assert!(decode_slice(&[0x02], &flag).unwrap().boolean("Flag").unwrap());
        assert!(!decode_slice(&[0x00], &flag).unwrap().boolean("Flag").unwrap());

        let wide = schema(&[FieldDef::new("Flag", "position:1,bytecount:2", FieldKind::Bool)]);
        assert!(matches!(
            decode_slice(&[0, 1], &wide),
            Err(CodecError::InvalidBool { len: 2, .. })
        ));
    }

    #[test]
    fn test_decode_int_too_wide() {
        let schema = schema(&[FieldDef::new("N", "position:1,bytecount:9", FieldKind::Int)]);
        assert!(matches!(
            decode_slice(&[0; 9], &schema),
            Err(CodecError::IntegerTooWide { len: 9, .. })
        ));
    }

    #[test]
    fn test_decode_full_width_int_wraps_to_signed() {
        let schema = schema(&[FieldDef::new("N", "position:1,bytecount:8", FieldKind::Int)]);
        let record = decode_slice(&[0xFF; 8], &schema).unwrap();
        assert_eq!(record.int("N").unwrap(), -1);
    }

    #[test]
    fn test_decode_text() {
        let schema = schema(&[FieldDef::new("Name", "position:1,bytecount:5", FieldKind::Text)]);
        assert_eq!(decode_slice(b"queue", &schema).unwrap().text("Name").unwrap(), "queue");
    }

    #[test]
    fn test_text_keeps_non_utf8_bytes() {
        let schema = schema(&[FieldDef::new("Name", "position:1,bytecount:3", FieldKind::Text)]);
        let input = [0xFF, 0x00, 0x41];
        let record = decode_slice(&input, &schema).unwrap();

        assert_eq!(record.text_bytes("Name").unwrap(), &input[..]);
        assert!(matches!(
            record.text("Name"),
            Err(CodecError::InvalidUtf8 { ref field }) if field == "Name"
        ));
        assert_eq!(encode(&record, &schema).unwrap(), input);
    }

    #[test]
    fn test_forward_reference_unresolved() {
        let schema = schema(&[
            FieldDef::new("Data", "position:1,bytecount:Len", FieldKind::Bytes),
            FieldDef::new("Len", "position:2,bytecount:1", FieldKind::Int),
        ]);
        assert!(matches!(
            decode_slice(&[1, 1], &schema),
            Err(CodecError::UnresolvedSize { .. })
        ));
    }

    #[test]
    fn test_size_reference_to_non_integer() {
        let schema = schema(&[
            FieldDef::new("Len", "position:1,bytecount:1", FieldKind::Bytes),
            FieldDef::new("Data", "position:2,bytecount:Len", FieldKind::Bytes),
        ]);
        assert!(matches!(
            decode_slice(&[1, 1], &schema),
            Err(CodecError::UnresolvedSize { .. })
        ));
    }

    #[test]
    fn test_negative_size_rejected() {
        let schema = schema(&[
            FieldDef::new("Len", "position:1,bytecount:8", FieldKind::Int),
            FieldDef::new("Data", "position:2,bytecount:Len", FieldKind::Bytes),
        ]);
        assert!(matches!(
            decode_slice(&[0x80, 0, 0, 0, 0, 0, 0, 0], &schema),
            Err(CodecError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_encode_pads_text_on_the_left() {
        let schema = schema(&[FieldDef::new("Greeting", "position:1,bytecount:8", FieldKind::Text)]);
        let record = Record::new().with("Greeting", "Hello");
        assert_eq!(
            encode(&record, &schema).unwrap(),
            [0x00, 0x00, 0x00, 0x48, 0x65, 0x6c, 0x6c, 0x6f]
        );
    }

    #[test]
    fn test_encode_truncates_from_the_front() {
        let schema = schema(&[
            FieldDef::new("Short", "position:1,bytecount:2", FieldKind::Int),
            FieldDef::new("Clipped", "position:2,bytecount:5", FieldKind::Bytes),
        ]);
        let record = Record::new()
            .with("Short", 0x0102_0304_i64)
            .with("Clipped", b"helloworld".to_vec());
        assert_eq!(encode(&record, &schema).unwrap(), cat(&[&[0x03, 0x04], b"world"]));
    }

    #[test]
    fn test_encode_dynamic_size_from_record() {
        let record = Record::new()
            .with("Version", 1_i64)
            .with("ContentLength", 5_i64)
            .with("Data", b"hello".to_vec());
        let expected = cat(&[&[0, 0, 0, 1], &[0, 0, 0, 5], b"hello"]);
        assert_eq!(encode(&record, &length_prefixed()).unwrap(), expected);
    }

    #[test]
    fn test_encode_type_mismatch() {
        let record = Record::new()
            .with("Version", "one")
            .with("ContentLength", 0_i64)
            .with("Data", Vec::new());
        assert!(matches!(
            encode(&record, &length_prefixed()),
            Err(CodecError::UnknownType { expected: "int", found: "text", .. })
        ));
    }

    #[test]
    fn test_encode_missing_field() {
        let record = Record::new().with("Version", 1_i64);
        assert!(matches!(
            encode(&record, &length_prefixed()),
            Err(CodecError::MissingField(name)) if name == "ContentLength"
        ));
    }

    #[test]
    fn test_round_trip() {
        let schema = schema(&[
            FieldDef::new("Version", "position:1,bytecount:4", FieldKind::Int),
            FieldDef::new("NameLen", "position:2,bytecount:2", FieldKind::Int),
            FieldDef::new("Name", "position:3,bytecount:NameLen", FieldKind::Text),
            FieldDef::new("Durable", "position:4,bytecount:1", FieldKind::Bool),
        ]);
        let input = cat(&[&[0, 0, 0, 9], &[0, 6], b"orders", &[1]]);
        let record = decode_slice(&input, &schema).unwrap();
        assert_eq!(encode(&record, &schema).unwrap(), input);
    }

    struct Header {
        version: i64,
        payload: Vec<u8>,
    }

    impl WireRecord for Header {
        const FIELDS: &'static [FieldDef<'static>] = &[
            FieldDef::new("Version", "position:1,bytecount:2", FieldKind::Int),
            FieldDef::new("Len", "position:2,bytecount:1", FieldKind::Int),
            FieldDef::new("Payload", "position:3,bytecount:Len", FieldKind::Bytes),
        ];

        fn schema() -> std::result::Result<&'static Schema, SchemaError> {
            static SCHEMA: SchemaCell = SchemaCell::new();
            SCHEMA.get_or_compile(Self::FIELDS)
        }

        fn from_record(mut record: Record) -> std::result::Result<Self, CodecError> {
            Ok(Self {
                version: record.int("Version")?,
                payload: record.take_bytes("Payload")?,
            })
        }

        fn to_record(&self) -> Record {
            Record::new()
                .with("Version", self.version)
                .with("Len", self.payload.len() as i64)
                .with("Payload", self.payload.clone())
        }
    }

    #[test]
    fn test_wire_record_round_trip() {
        let header = Header {
            version: 3,
            payload: b"abc".to_vec(),
        };
        let bytes = encode_record(&header).unwrap();
        assert_eq!(bytes, [0, 3, 3, b'a', b'b', b'c']);

        let decoded: Header = decode_record(&mut &bytes[..]).unwrap();
        assert_eq!(decoded.version, 3);
        assert_eq!(decoded.payload, b"abc");
    }

    #[test]
    fn test_wire_record_propagates_codec_error() {
        let result: Result<Header> = decode_record(&mut &[0u8, 3][..]);
        assert!(matches!(
            result,
            Err(ProtocolError::Codec(CodecError::TruncatedInput { .. }))
        ));
    }
}
