//! Broker messages and the protobuf payloads they carry.
//!
//! Payload structs double as serde types (for the JSON parser) and hand
//! declared `prost` messages (for the protobuf envelope) under the `maestro`
//! package.

use serde::{Deserialize, Serialize};
use std::fmt;

const PACKAGE: &str = "maestro";

/// What the queue subsystem should do with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Acknowledge,
    Subscribe,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Acknowledge => "acknowledge",
            ActionType::Subscribe => "subscribe",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Subscribe {
    #[prost(string, tag = "1")]
    pub queue: String,
}

impl prost::Name for Subscribe {
    const NAME: &'static str = "Subscribe";
    const PACKAGE: &'static str = PACKAGE;
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Unsubscribe {
    #[prost(string, tag = "1")]
    pub queue: String,
}

impl prost::Name for Unsubscribe {
    const NAME: &'static str = "Unsubscribe";
    const PACKAGE: &'static str = PACKAGE;
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Acknowledge {
    #[prost(string, tag = "1")]
    pub queue: String,
    #[prost(string, tag = "2")]
    pub message_id: String,
}

impl prost::Name for Acknowledge {
    const NAME: &'static str = "Acknowledge";
    const PACKAGE: &'static str = PACKAGE;
}

/// Payloads the broker acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Content {
    Subscribe(Subscribe),
    Acknowledge(Acknowledge),
}

impl Content {
    /// The action implied by this payload
    pub fn action_type(&self) -> ActionType {
        match self {
            Content::Subscribe(_) => ActionType::Subscribe,
            Content::Acknowledge(_) => ActionType::Acknowledge,
        }
    }

    pub fn queue(&self) -> &str {
        match self {
            Content::Subscribe(sub) => &sub.queue,
            Content::Acknowledge(ack) => &ack.queue,
        }
    }
}

/// A parsed, authenticated client message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: Option<Content>,
    /// Connection that sent the message; empty until authenticated
    pub conn_id: String,
    pub action_type: ActionType,
}

impl Message {
    /// Message for `content` with no connection identity yet
    pub fn new(content: Content) -> Self {
        Self {
            action_type: content.action_type(),
            content: Some(content),
            conn_id: String::new(),
        }
    }

    pub fn with_conn_id(mut self, conn_id: impl Into<String>) -> Self {
        self.conn_id = conn_id.into();
        self
    }
}
