//! # Protobuf Envelope
//!
//! The enveloped protocol variant: content is a protobuf [`Envelope`] holding
//! a `major.minor.patch` version string and a polymorphic [`Any`] payload.
//!
//! ## Wire Format
//! ```text
//! [Version(4)] [ContentLength(4)] [Data(ContentLength)]
//! ```
//! `Data` is the encoded envelope. The outer header is decoded with the
//! generic record codec ([`EnvelopeHeader`]).
//!
//! ## Type Resolution
//! Payload type URLs (`type.googleapis.com/maestro.Subscribe`) resolve
//! through a [`TypeRegistry`] owned by the parser. Resolved URLs are cached
//! behind an `RwLock`; only registered types are ever cached.

use crate::config::EnvelopeConfig;
use crate::core::codec::{decode_record, Record, SchemaCell, WireRecord};
use crate::core::schema::{FieldDef, FieldKind, Schema};
use crate::error::{constants, CodecError, ParseError, Result, SchemaError};
use crate::protocol::message::{Acknowledge, Content, Message, Subscribe, Unsubscribe};
use crate::protocol::parser::Parser;
use crate::protocol::Protocol;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

/// Prefix used when packing payloads into [`Any`]
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/";

/// Polymorphic payload, wire-compatible with `google.protobuf.Any`
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

impl Any {
    /// Encode `message` and tag it with its type URL
    pub fn pack<M: prost::Message + prost::Name>(message: &M) -> Self {
        Self {
            type_url: format!("{TYPE_URL_PREFIX}{}", M::full_name()),
            value: message.encode_to_vec(),
        }
    }
}

/// Versioned wrapper around a payload
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct Envelope {
    #[prost(string, tag = "1")]
    pub proto_version: String,
    #[prost(message, optional, tag = "2")]
    pub content: Option<Any>,
}

impl prost::Name for Envelope {
    const NAME: &'static str = "Envelope";
    const PACKAGE: &'static str = "maestro";
}

/// `major.minor.patch` envelope version.
///
/// Versions are not ordered; a version is accepted against a minimum only
/// when every component reaches the matching minimum component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ProtoVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether each component is at least the matching component of `minimum`
    pub fn meets(&self, minimum: &ProtoVersion) -> bool {
        self.major >= minimum.major && self.minor >= minimum.minor && self.patch >= minimum.patch
    }
}

impl FromStr for ProtoVersion {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ParseError::InvalidProtoVersion(s.to_string());
        let mut parts = s.split('.').map(|part| part.parse::<u64>().map_err(|_| invalid()));

        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(major), Some(minor), Some(patch), None) => Ok(Self::new(major?, minor?, patch?)),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ProtoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Maps payload type URLs to the short type names the parser dispatches on.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    known: HashMap<String, Arc<str>>,
    resolved: RwLock<HashMap<String, Arc<str>>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing every payload the broker defines
    pub fn with_default_types() -> Self {
        let mut registry = Self::new();
        registry.register::<Subscribe>();
        registry.register::<Unsubscribe>();
        registry.register::<Acknowledge>();
        registry
    }

    pub fn register<M: prost::Name>(&mut self) {
        self.known.insert(M::full_name(), Arc::from(M::NAME));
    }

    /// Short type name for `type_url`, caching the answer on first sight
    pub fn resolve(&self, type_url: &str) -> std::result::Result<Arc<str>, ParseError> {
        {
            let resolved = self
                .resolved
                .read()
                .map_err(|_| ParseError::RegistryUnavailable(constants::ERR_REGISTRY_READ_LOCK))?;
            if let Some(name) = resolved.get(type_url) {
                return Ok(Arc::clone(name));
            }
        }

        let full_name = type_url.rsplit('/').next().unwrap_or_default();
        let name = self
            .known
            .get(full_name)
            .cloned()
            .ok_or_else(|| ParseError::UnknownMessageType(type_url.to_string()))?;

        let mut resolved = self
            .resolved
            .write()
            .map_err(|_| ParseError::RegistryUnavailable(constants::ERR_REGISTRY_WRITE_LOCK))?;
        let name = resolved
            .entry(type_url.to_string())
            .or_insert_with(|| name)
            .clone();
        debug!(type_url, name = %name, "Resolved payload type");
        Ok(name)
    }

    /// Number of type URLs resolved so far
    pub fn cached(&self) -> usize {
        self.resolved.read().map(|r| r.len()).unwrap_or(0)
    }
}

/// Parses protobuf [`Envelope`] content.
#[derive(Debug, Clone)]
pub struct ProtobufParser {
    registry: Arc<TypeRegistry>,
    min_version: ProtoVersion,
}

impl Default for ProtobufParser {
    fn default() -> Self {
        Self::new(Arc::new(TypeRegistry::with_default_types()), ProtoVersion::new(3, 0, 0))
    }
}

impl ProtobufParser {
    pub fn new(registry: Arc<TypeRegistry>, min_version: ProtoVersion) -> Self {
        Self {
            registry,
            min_version,
        }
    }

    /// Parser enforcing the configured minimum envelope version
    pub fn from_config(config: &EnvelopeConfig, registry: Arc<TypeRegistry>) -> Result<Self> {
        Ok(Self::new(registry, config.min_version()?))
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn min_version(&self) -> ProtoVersion {
        self.min_version
    }

    fn check_version(&self, version: &str) -> std::result::Result<(), ParseError> {
        if !version.parse::<ProtoVersion>()?.meets(&self.min_version) {
            debug!(version, minimum = %self.min_version, "Envelope version below minimum");
            return Err(ParseError::InvalidProtoVersion(version.to_string()));
        }
        Ok(())
    }
}

fn decode_payload<M: prost::Message + Default>(value: &[u8]) -> std::result::Result<M, ParseError> {
    M::decode(value).map_err(|e| ParseError::Malformed(e.to_string()))
}

impl Parser for ProtobufParser {
    #[instrument(skip(self, content), fields(len = content.len()), level = "debug")]
    fn parse(&self, content: &[u8]) -> std::result::Result<Message, ParseError> {
        let envelope: Envelope = decode_payload(content)?;
        self.check_version(&envelope.proto_version)?;

        let payload = envelope
            .content
            .ok_or_else(|| ParseError::Malformed("envelope has no content".to_string()))?;

        let name = self.registry.resolve(&payload.type_url)?;
        let content = match &*name {
            "Subscribe" => Content::Subscribe(decode_payload(&payload.value)?),
            "Acknowledge" => Content::Acknowledge(decode_payload(&payload.value)?),
            other => return Err(ParseError::UnknownMessageType(other.to_string())),
        };

        Ok(Message::new(content))
    }
}

/// Outer header of the enveloped layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: i64,
    pub data: Vec<u8>,
}

impl WireRecord for EnvelopeHeader {
    const FIELDS: &'static [FieldDef<'static>] = &[
        FieldDef::new("Version", "position:1,bytecount:4", FieldKind::Int),
        FieldDef::new("ContentLength", "position:2,bytecount:4", FieldKind::Int),
        FieldDef::new("Data", "position:3,bytecount:ContentLength", FieldKind::Bytes),
    ];

    fn schema() -> std::result::Result<&'static Schema, SchemaError> {
        static SCHEMA: SchemaCell = SchemaCell::new();
        SCHEMA.get_or_compile(Self::FIELDS)
    }

    fn from_record(mut record: Record) -> std::result::Result<Self, CodecError> {
        Ok(Self {
            version: record.int("Version")?,
            data: record.take_bytes("Data")?,
        })
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("Version", self.version)
            .with("ContentLength", self.data.len() as i64)
            .with("Data", self.data.clone())
    }
}

/// Protocol for the enveloped layout; carries no auth section, so messages
/// come back without a `conn_id`.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeProtocol {
    parser: ProtobufParser,
}

impl EnvelopeProtocol {
    pub fn new(parser: ProtobufParser) -> Self {
        Self { parser }
    }

    /// Protocol with the default payload types and the configured minimum version
    pub fn from_config(config: &EnvelopeConfig) -> Result<Self> {
        let registry = Arc::new(TypeRegistry::with_default_types());
        Ok(Self::new(ProtobufParser::from_config(config, registry)?))
    }
}

impl Protocol for EnvelopeProtocol {
    fn parse_incoming(&self, raw: &[u8]) -> Result<Message> {
        let header: EnvelopeHeader = decode_record(&mut &raw[..])?;
        Ok(self.parser.parse(&header.data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::codec::encode_record;
    use crate::error::ProtocolError;
    use crate::protocol::message::ActionType;
    use prost::Message as _;

    fn envelope(version: &str, payload: Option<Any>) -> Vec<u8> {
        Envelope {
            proto_version: version.to_string(),
            content: payload,
        }
        .encode_to_vec()
    }

    fn subscribe(queue: &str) -> Any {
        Any::pack(&Subscribe {
            queue: queue.to_string(),
        })
    }

    #[test]
    fn test_version_parsing() {
        assert_eq!("3.0.1".parse::<ProtoVersion>(), Ok(ProtoVersion::new(3, 0, 1)));
        for bad in ["3.0", "3.0.0.1", "3.x.0", "", "3..0", "-1.0.0"] {
            assert_eq!(
                bad.parse::<ProtoVersion>(),
                Err(ParseError::InvalidProtoVersion(bad.to_string())),
                "version {bad:?}"
            );
        }
    }

    #[test]
    fn test_version_meets_every_component() {
        let minimum = ProtoVersion::new(3, 2, 0);
        assert!(ProtoVersion::new(3, 2, 0).meets(&minimum));
        assert!(ProtoVersion::new(3, 10, 4).meets(&minimum));
        assert!(ProtoVersion::new(4, 2, 0).meets(&minimum));
        assert!(!ProtoVersion::new(2, 9, 9).meets(&minimum));
        // A larger major does not make up for a smaller minor
        assert!(!ProtoVersion::new(4, 0, 0).meets(&minimum));
        assert!(!ProtoVersion::new(4, 5, 0).meets(&ProtoVersion::new(3, 0, 1)));
    }

    #[test]
    fn test_each_component_checked_against_minimum() {
        let parser = ProtobufParser::new(
            Arc::new(TypeRegistry::with_default_types()),
            ProtoVersion::new(3, 2, 0),
        );
        assert_eq!(
            parser.parse(&envelope("4.0.0", Some(subscribe("q")))),
            Err(ParseError::InvalidProtoVersion("4.0.0".into()))
        );
        assert!(parser.parse(&envelope("4.2.0", Some(subscribe("q")))).is_ok());
    }

    #[test]
    fn test_parser_from_config() {
        let config = EnvelopeConfig {
            min_proto_version: "3.1.0".to_string(),
        };
        let parser =
            ProtobufParser::from_config(&config, Arc::new(TypeRegistry::with_default_types()))
                .unwrap();
        assert_eq!(parser.min_version(), ProtoVersion::new(3, 1, 0));
        assert_eq!(
            parser.parse(&envelope("3.0.5", Some(subscribe("q")))),
            Err(ParseError::InvalidProtoVersion("3.0.5".into()))
        );

        let bad = EnvelopeConfig {
            min_proto_version: "three".to_string(),
        };
        assert!(matches!(
            EnvelopeProtocol::from_config(&bad),
            Err(ProtocolError::Parse(ParseError::InvalidProtoVersion(_)))
        ));
    }

    #[test]
    fn test_minimum_version_enforced() {
        let parser = ProtobufParser::default();
        assert_eq!(
            parser.parse(&envelope("2.9.9", Some(subscribe("q")))),
            Err(ParseError::InvalidProtoVersion("2.9.9".into()))
        );
        assert_eq!(
            parser.parse(&envelope("3.0", Some(subscribe("q")))),
            Err(ParseError::InvalidProtoVersion("3.0".into()))
        );
        assert!(parser.parse(&envelope("3.0.0", Some(subscribe("q")))).is_ok());
        assert!(parser.parse(&envelope("3.0.1", Some(subscribe("q")))).is_ok());
    }

    #[test]
    fn test_subscribe_payload() {
        let msg = ProtobufParser::default()
            .parse(&envelope("3.1.0", Some(subscribe("orders"))))
            .unwrap();
        assert_eq!(msg.action_type, ActionType::Subscribe);
        assert_eq!(
            msg.content,
            Some(Content::Subscribe(Subscribe {
                queue: "orders".into()
            }))
        );
    }

    #[test]
    fn test_acknowledge_payload() {
        let ack = Any::pack(&Acknowledge {
            queue: "orders".into(),
            message_id: "m-7".into(),
        });
        let msg = ProtobufParser::default()
            .parse(&envelope("3.0.0", Some(ack)))
            .unwrap();
        assert_eq!(msg.action_type, ActionType::Acknowledge);
    }

    #[test]
    fn test_registered_type_without_action() {
        let unsub = Any::pack(&Unsubscribe {
            queue: "orders".into(),
        });
        assert_eq!(
            ProtobufParser::default().parse(&envelope("3.0.0", Some(unsub))),
            Err(ParseError::UnknownMessageType("Unsubscribe".into()))
        );
    }

    #[test]
    fn test_unregistered_type() {
        let payload = Any {
            type_url: "type.googleapis.com/maestro.Publish".into(),
            value: Vec::new(),
        };
        let parser = ProtobufParser::default();
        assert_eq!(
            parser.parse(&envelope("3.0.0", Some(payload))),
            Err(ParseError::UnknownMessageType(
                "type.googleapis.com/maestro.Publish".into()
            ))
        );
        assert_eq!(parser.registry().cached(), 0);
    }

    #[test]
    fn test_malformed_content() {
        let parser = ProtobufParser::default();
        assert!(matches!(
            parser.parse(&envelope("3.0.0", None)),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(
            parser.parse(&[0xff, 0xff, 0xff]),
            Err(ParseError::Malformed(_))
        ));

        let broken = Any {
            type_url: format!("{TYPE_URL_PREFIX}maestro.Subscribe"),
            value: vec![0x0a, 0x10],
        };
        assert!(matches!(
            parser.parse(&envelope("3.0.0", Some(broken))),
            Err(ParseError::Malformed(_))
        ));
    }

    #[test]
    fn test_registry_caches_once_per_url() {
        let registry = TypeRegistry::with_default_types();
        let url = format!("{TYPE_URL_PREFIX}maestro.Subscribe");
        assert_eq!(&*registry.resolve(&url).unwrap(), "Subscribe");
        assert_eq!(&*registry.resolve(&url).unwrap(), "Subscribe");
        assert_eq!(registry.cached(), 1);

        // Any prefix is accepted; the name after the last '/' decides
        assert_eq!(&*registry.resolve("/maestro.Subscribe").unwrap(), "Subscribe");
        assert_eq!(registry.cached(), 2);
    }

    #[test]
    fn test_envelope_protocol() {
        let header = EnvelopeHeader {
            version: 1,
            data: envelope("3.0.0", Some(subscribe("orders"))),
        };
        let raw = encode_record(&header).unwrap();
        assert_eq!(&raw[4..8], &(header.data.len() as u32).to_be_bytes());

        let msg = EnvelopeProtocol::default().parse_incoming(&raw).unwrap();
        assert_eq!(msg.action_type, ActionType::Subscribe);
        assert!(msg.conn_id.is_empty());
    }

    #[test]
    fn test_envelope_protocol_truncated() {
        let header = EnvelopeHeader {
            version: 1,
            data: envelope("3.0.0", Some(subscribe("orders"))),
        };
        let raw = encode_record(&header).unwrap();
        assert!(matches!(
            EnvelopeProtocol::default().parse_incoming(&raw[..raw.len() - 1]),
            Err(ProtocolError::Codec(CodecError::TruncatedInput { .. }))
        ));
    }
}
