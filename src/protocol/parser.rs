//! Content parsers: turn a frame's content section into a [`Message`].
//!
//! Parsers never set `conn_id`; the dispatcher fills it in from the
//! authenticator's result.

use crate::error::ParseError;
use crate::protocol::message::{Acknowledge, Content, Message, Subscribe};
use serde::Deserialize;

pub trait Parser: Send + Sync {
    fn parse(&self, content: &[u8]) -> Result<Message, ParseError>;
}

/// Parses JSON content of the form `{"action": "subscribe", "queue": "..."}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

#[derive(Deserialize)]
struct JsonEnvelope {
    action: String,
    #[serde(flatten)]
    body: serde_json::Value,
}

impl Parser for JsonParser {
    fn parse(&self, content: &[u8]) -> Result<Message, ParseError> {
        let envelope: JsonEnvelope =
            serde_json::from_slice(content).map_err(|e| ParseError::Malformed(e.to_string()))?;

        let malformed = |e: serde_json::Error| ParseError::Malformed(e.to_string());
        let content = match envelope.action.as_str() {
            "subscribe" => Content::Subscribe(
                serde_json::from_value::<Subscribe>(envelope.body).map_err(malformed)?,
            ),
            "acknowledge" => Content::Acknowledge(
                serde_json::from_value::<Acknowledge>(envelope.body).map_err(malformed)?,
            ),
            other => return Err(ParseError::UnknownMessageType(other.to_string())),
        };

        Ok(Message::new(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::message::ActionType;

    #[test]
    fn test_subscribe() {
        let msg = JsonParser
            .parse(br#"{"action":"subscribe","queue":"orders"}"#)
            .unwrap();
        assert_eq!(msg.action_type, ActionType::Subscribe);
        assert_eq!(
            msg.content,
            Some(Content::Subscribe(Subscribe {
                queue: "orders".into()
            }))
        );
        assert!(msg.conn_id.is_empty());
    }

    #[test]
    fn test_acknowledge() {
        let msg = JsonParser
            .parse(br#"{"action":"acknowledge","queue":"orders","message_id":"m-1"}"#)
            .unwrap();
        assert_eq!(msg.action_type, ActionType::Acknowledge);
    }

    #[test]
    fn test_unknown_action() {
        assert_eq!(
            JsonParser.parse(br#"{"action":"unsubscribe","queue":"orders"}"#),
            Err(ParseError::UnknownMessageType("unsubscribe".into()))
        );
    }

    #[test]
    fn test_malformed() {
        for input in [&b"not json"[..], br#"{"queue":"orders"}"#, br#"{"action":"subscribe"}"#] {
            assert!(
                matches!(JsonParser.parse(input), Err(ParseError::Malformed(_))),
                "input {:?}",
                String::from_utf8_lossy(input)
            );
        }
    }
}
