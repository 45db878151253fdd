// Message codec. Stateless; never fails loudly: frames that cannot be understood are reported as
// `Decoded::Ignored` so that newer servers can add message kinds without breaking older clients.

use std::fmt;

use serde_json::Value;

use crate::event::{ClientEvent, ServerEvent};


pub const KNOWN_SERVER_EVENT_TYPES: [&str; 4] = ["Assigned", "state", "MoveMsg", "ConsoleMsg"];

#[derive(Debug)]
pub enum ParseError {
    Malformed(serde_json::Error),
    MissingType,
    UnknownType(String),
}

#[derive(Debug)]
pub enum Decoded {
    Message(ServerEvent),
    Ignored(ParseError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Malformed(err) => write!(f, "malformed frame: {err}"),
            ParseError::MissingType => write!(f, "frame has no \"type\""),
            ParseError::UnknownType(t) => write!(f, "unknown frame type {t:?}"),
        }
    }
}

impl Decoded {
    pub fn into_message(self) -> Option<ServerEvent> {
        match self {
            Decoded::Message(event) => Some(event),
            Decoded::Ignored(_) => None,
        }
    }
}

pub fn decode(raw: &str) -> Decoded {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(err) => return Decoded::Ignored(ParseError::Malformed(err)),
    };
    let Some(event_type) = value.get("type").and_then(Value::as_str) else {
        return Decoded::Ignored(ParseError::MissingType);
    };
    if !KNOWN_SERVER_EVENT_TYPES.contains(&event_type) {
        return Decoded::Ignored(ParseError::UnknownType(event_type.to_owned()));
    }
    match serde_json::from_value(value) {
        Ok(event) => Decoded::Message(event),
        Err(err) => Decoded::Ignored(ParseError::Malformed(err)),
    }
}

// The pull endpoint returns a bare snapshot, usually without the `type` tag.
pub fn decode_snapshot(raw: &str) -> Decoded {
    let mut value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(err) => return Decoded::Ignored(ParseError::Malformed(err)),
    };
    if let Value::Object(ref mut map) = value {
        map.entry("type").or_insert_with(|| Value::String("state".to_owned()));
    }
    match serde_json::from_value(value) {
        Ok(event @ ServerEvent::State(_)) => Decoded::Message(event),
        Ok(_) => Decoded::Ignored(ParseError::UnknownType("non-state snapshot".to_owned())),
        Err(err) => Decoded::Ignored(ParseError::Malformed(err)),
    }
}

pub fn encode(event: &ClientEvent) -> String {
    // Serializing a plain enum of strings and small integers into a string cannot fail.
    serde_json::to_string(event).unwrap_or_else(|err| {
        log::error!("{}", crate::internal_error_message!("cannot encode {event:?}: {err}"));
        String::new()
    })
}
