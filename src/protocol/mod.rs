//! # Protocol Layer
//!
//! Turns a complete client message into a typed, authenticated [`Message`].
//!
//! ## Components
//! - **Authenticators**: nil and HMAC-signed token strategies
//! - **Parsers**: JSON and protobuf-envelope content strategies
//! - **Dispatcher**: frame parsing, authentication and content parsing in one
//!   fail-fast pipeline
//! - **Envelope**: the alternate enveloped layout and its type registry
//!
//! Both [`Dispatcher`](dispatcher::Dispatcher) and
//! [`EnvelopeProtocol`](envelope::EnvelopeProtocol) implement [`Protocol`], so
//! a connection handler can hold either as `Arc<dyn Protocol>`.

pub mod auth;
pub mod dispatcher;
pub mod envelope;
pub mod message;
pub mod parser;


use crate::error::Result;
use crate::protocol::message::Message;

/// Raw bytes in, authenticated message out.
pub trait Protocol: Send + Sync {
    fn parse_incoming(&self, raw: &[u8]) -> Result<Message>;
}
