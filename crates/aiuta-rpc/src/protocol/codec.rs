//! Envelope validation for inbound `message` events.
//!
//! The `message` event stream of a window is shared with everything else on
//! the page: browser extensions, analytics widgets and dev tools all post
//! their own traffic.  Anything that is not a well-formed envelope is
//! therefore *expected* noise and is dropped silently; only a `trace!` line
//! records it.
//!
//! # Legacy producers
//!
//! Before the typed protocol existed, both sides exchanged loose objects such
//! as `{"action": "RESIZE", "height": 640}`.  [`decode_inbound`] wraps such an
//! object into an `event` envelope that keeps its `action`, so those producers
//! keep working while they migrate.  A wrapped message is always an event: it
//! can reach event handlers but never expects or produces a response.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use super::ids::{now_millis, MessageIdGenerator};
use super::message::{Message, MessageType, RemoteError, PROTOCOL_VERSION};

/// Reasons a raw value is not a protocol envelope.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The payload is not a JSON object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A required envelope field is missing or has the wrong JSON type.
    #[error("missing or invalid envelope field `{0}`")]
    InvalidField(&'static str),

    /// The `type` field holds a value outside `request | response | event`.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The `data` of a known action does not match its argument shape.
    #[error("invalid arguments for {action}: {reason}")]
    InvalidArguments { action: String, reason: String },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parses `raw` as a full envelope, reporting why it is not one.
///
/// # Errors
///
/// Returns a [`ProtocolError`] describing the first field that fails.
pub fn parse_envelope(raw: &Value) -> Result<Message, ProtocolError> {
    let obj = raw.as_object().ok_or(ProtocolError::NotAnObject)?;

    let version = string_field(obj, "version")?;
    let id = string_field(obj, "id")?;
    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_f64)
        .filter(|t| t.is_finite())
        .ok_or(ProtocolError::InvalidField("timestamp"))?;
    let kind_str = string_field(obj, "type")?;
    let kind = MessageType::from_wire(&kind_str).ok_or(ProtocolError::UnknownType(kind_str))?;

    // `action` is optional, but when present it must be a string.
    let action = match obj.get("action") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(ProtocolError::InvalidField("action")),
    };

    // A malformed error object still marks the response as failed.
    let error = match obj.get("error") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<RemoteError>(v.clone())
                .unwrap_or_else(|_| RemoteError::new(v.to_string())),
        ),
    };

    Ok(Message {
        version,
        id,
        timestamp: timestamp.max(0.0) as u64,
        kind,
        action,
        data: obj.get("data").cloned(),
        error,
    })
}

/// Returns the envelope in `raw`, or `None` if `raw` is not one.
///
/// Never fails loudly: unrelated traffic is indistinguishable from a broken
/// peer and both are simply ignored.
pub fn validate_message(raw: &Value) -> Option<Message> {
    match parse_envelope(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            trace!("dropping non-protocol message: {e}");
            None
        }
    }
}

/// Decodes an inbound `message` event payload.
///
/// Accepts, in order:
///
/// 1. a full envelope,
/// 2. a JSON *string* containing a full envelope or loose object (some
///    producers post `JSON.stringify(...)` output),
/// 3. a loose object with a string `action`, wrapped as an `event`.
///
/// Everything else yields `None`, including malformed envelopes: an object
/// that carries `type`, `id` or `version` is never treated as loose.
pub fn decode_inbound(raw: &Value, ids: &MessageIdGenerator) -> Option<Message> {
    if let Value::String(text) = raw {
        let parsed: Value = serde_json::from_str(text).ok()?;
        // Only one level of string wrapping is unwrapped.
        if parsed.is_string() {
            return None;
        }
        return decode_inbound(&parsed, ids);
    }

    match parse_envelope(raw) {
        Ok(msg) => Some(msg),
        Err(e) => {
            let wrapped = wrap_loose(raw, ids);
            if wrapped.is_none() {
                trace!("dropping non-protocol message: {e}");
            }
            wrapped
        }
    }
}

/// Wraps a loose `{"action": ..., ...}` object into an `event` envelope.
///
/// The remaining fields become the event `data` (an object), or `null` when
/// the loose message only carried its action.  Objects with any envelope
/// key are rejected.
pub fn wrap_loose(raw: &Value, ids: &MessageIdGenerator) -> Option<Message> {
    let obj = raw.as_object()?;
    if ENVELOPE_KEYS.iter().any(|key| obj.contains_key(*key)) {
        return None;
    }
    let action = obj.get("action")?.as_str()?.to_string();

    let rest: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "action")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let data = if rest.is_empty() {
        Value::Null
    } else {
        Value::Object(rest)
    };

    Some(Message {
        version: PROTOCOL_VERSION.to_string(),
        id: ids.next_id(),
        timestamp: now_millis(),
        kind: MessageType::Event,
        action: Some(action),
        data: Some(data),
        error: None,
    })
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Keys that mark an object as an attempted envelope rather than loose traffic.
const ENVELOPE_KEYS: [&str; 3] = ["type", "id", "version"];

fn string_field(obj: &Map<String, Value>, name: &'static str) -> Result<String, ProtocolError> {
    obj.get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProtocolError::InvalidField(name))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
