//! # Error Types
//!
//! Error handling for every layer of the wire protocol.
//!
//! Each stage owns a narrow error enum so callers can match on exactly the
//! failure they care about, and [`ProtocolError`] wraps all of them for code
//! that just wants to propagate with `?`.
//!
//! ## Error Categories
//! - **Schema Errors**: malformed layout annotations, bad position sets
//! - **Codec Errors**: short reads, type mismatches, unresolved dynamic sizes
//! - **Frame Errors**: separator, terminator and truncation violations
//! - **Auth Errors**: rejected tokens and missing connection identity
//! - **Parse Errors**: unknown payload types, unsupported envelope versions
//!
//! ## Example Usage
//! ```rust
//! use maestro_protocol::core::frame::Frame;
//! use maestro_protocol::error::{FrameError, ProtocolError, Result};
//!
//! fn version_of(raw: &[u8]) -> Result<u32> {
//!     let frame = Frame::from_bytes(raw)?;
//!     Ok(frame.version)
//! }
//!
//! match version_of(&[0, 0, 0, 1]) {
//!     Err(ProtocolError::Frame(FrameError::TruncatedFrame { .. })) => {}
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Type registry lock failures
    pub const ERR_REGISTRY_READ_LOCK: &str = "Failed to acquire read lock on type registry";
    pub const ERR_REGISTRY_WRITE_LOCK: &str = "Failed to acquire write lock on type registry";

    /// Token validation failures
    pub const ERR_TOKEN_NOT_TEXT: &str = "token is not valid UTF-8 text";
    pub const ERR_TOKEN_SEGMENTS: &str = "token must have three dot-separated segments";
    pub const ERR_TOKEN_ENCODING: &str = "token segment is not valid base64url";
    pub const ERR_TOKEN_HEADER: &str = "token header is not a valid JSON object";
    pub const ERR_TOKEN_CLAIMS: &str = "token claims are not a valid JSON object";
    pub const ERR_ALGORITHM_MISMATCH: &str = "invalid signing method";
    pub const ERR_BAD_SIGNATURE: &str = "signature is invalid";
    pub const ERR_TOKEN_EXPIRED: &str = "token is expired";
    pub const ERR_TOKEN_NOT_YET_VALID: &str = "token is not valid yet";
    pub const ERR_TOKEN_ISSUED_IN_FUTURE: &str = "token used before issued";
    pub const ERR_INVALID_TIME_CLAIM: &str = "time claim is not a number";
    pub const ERR_SYSTEM_TIME: &str = "System time error: time went backwards";
}

/// Failures while compiling layout annotations into a [`Schema`](crate::core::schema::Schema).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown tag: {0}")]
    UnknownTag(String),

    #[error("missing tag: {0}")]
    MissingTag(&'static str),

    #[error("malformed tag: {0}")]
    MalformedTag(String),

    #[error("duplicate position: {0}")]
    DuplicatePosition(u32),

    #[error("duplicate field name: {0}")]
    DuplicateName(String),

    #[error("invalid position: {0}")]
    InvalidPosition(i64),
}

/// Failures while decoding or encoding a record.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("truncated input for field {field}: expected {expected} bytes, got {actual}")]
    TruncatedInput {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown type for field {field}: expected {expected}, found {found}")]
    UnknownType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("invalid bool for field {field}: {len} bytes")]
    InvalidBool { field: String, len: usize },

    #[error("integer field {field} is {len} bytes wide (maximum 8)")]
    IntegerTooWide { field: String, len: usize },

    #[error("text field {field} is not valid UTF-8")]
    InvalidUtf8 { field: String },

    #[error("size of field {field} refers to {reference}, which holds no decoded integer")]
    UnresolvedSize { field: String, reference: String },

    #[error("size of field {field} resolved to {size}")]
    InvalidSize { field: String, size: i64 },

    #[error("record has no value for field {0}")]
    MissingField(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Failures while parsing a sentinel-delimited frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid separator at offset {offset}: found {found:#04x}")]
    InvalidSeparator { offset: usize, found: u8 },

    #[error("invalid terminator at offset {offset}")]
    InvalidTerminator { offset: usize },

    #[error("truncated frame: needed {needed} bytes at offset {offset}")]
    TruncatedFrame { offset: usize, needed: usize },

    #[error("frame too large: {size} bytes (limit {limit})")]
    OversizedFrame { size: usize, limit: usize },
}

/// Failures while authenticating a frame's auth blob.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("token has no conn_id claim")]
    MissingConnId,

    #[error("conn_id claim is not a string")]
    InvalidConnId,
}

/// Failures while turning a content blob into a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("invalid protobuf version: {0}")]
    InvalidProtoVersion(String),

    #[error("malformed content: {0}")]
    Malformed(String),

    #[error("{0}")]
    RegistryUnavailable(&'static str),
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
