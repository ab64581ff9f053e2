//! # maestro-protocol
//!
//! Wire-protocol layer for the Maestro message broker.
//!
//! Turns raw bytes received from a client connection into a typed,
//! authenticated [`Message`] ready for the queue subsystem.
//!
//! ## Layers
//! - [`core`]: layout schemas, the generic record codec, sentinel frames
//! - [`protocol`]: authenticators, content parsers and the dispatcher that
//!   composes them
//! - [`config`]: TOML and environment configuration
//! - [`utils`]: logging setup and dispatch metrics
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use maestro_protocol::{Dispatcher, Frame, JsonParser, NilAuthenticator};
//!
//! let dispatcher = Dispatcher::new(Arc::new(NilAuthenticator), Arc::new(JsonParser));
//! let raw = Frame::new(1, &b""[..], &br#"{"action":"subscribe","queue":"orders"}"#[..])
//!     .to_bytes()
//!     .unwrap();
//!
//! let message = dispatcher.parse_incoming(&raw).unwrap();
//! assert_eq!(message.action_type, maestro_protocol::ActionType::Subscribe);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod utils;

pub use crate::config::ProtocolConfig;
pub use crate::core::codec::{decode, encode, Record, Value, WireRecord};
pub use crate::core::frame::Frame;
pub use crate::core::frame_codec::FrameCodec;
pub use crate::core::schema::{FieldDef, FieldKind, Schema};
pub use crate::error::{ProtocolError, Result};
pub use crate::protocol::auth::{AuthInfo, Authenticator, NilAuthenticator, TokenAuthenticator};
pub use crate::protocol::dispatcher::Dispatcher;
pub use crate::protocol::envelope::{EnvelopeProtocol, ProtobufParser, TypeRegistry};
pub use crate::protocol::message::{ActionType, Content, Message};
pub use crate::protocol::parser::{JsonParser, Parser};
pub use crate::protocol::Protocol;
