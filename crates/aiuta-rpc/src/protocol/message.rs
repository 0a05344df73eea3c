//! The postMessage envelope.
//!
//! Every message exchanged between the host page and the iframe is a JSON
//! object of this shape:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "id": "18b7a3f0c21-0-9f3c1a2b",
//!   "timestamp": 1700000000000,
//!   "type": "request",
//!   "action": "app.tryOn",
//!   "data": [["sku-42"]]
//! }
//! ```
//!
//! - `type = "request"` expects exactly one `response` carrying the same `id`.
//! - `type = "response"` answers a request.  A failed call carries an
//!   `error` object instead of meaningful `data`.
//! - `type = "event"` is fire-and-forget.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{now_millis, MessageIdGenerator};

/// Protocol version stamped on every outgoing envelope.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Action name of the handshake request that exchanges [`super::context`] payloads.
pub const HANDSHAKE_ACTION: &str = "__handshake";

/// Discriminant of the envelope `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Response,
    Event,
}

impl MessageType {
    /// Parses the wire spelling of a message type.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "response" => Some(Self::Response),
            "event" => Some(Self::Event),
            _ => None,
        }
    }

    /// Returns the wire spelling of this message type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Event => "event",
        }
    }
}

/// Structured failure carried by a `response` whose handler failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Human-readable description produced by the remote handler.
    pub message: String,
    /// Optional machine-readable code, e.g. `"handler_failed"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// One validated protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub version: String,
    pub id: String,
    /// Milliseconds since the Unix epoch at construction time.
    pub timestamp: u64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl Message {
    /// Builds a `request` for `action` with a freshly generated id.
    pub fn request(ids: &MessageIdGenerator, action: impl Into<String>, data: Value) -> Self {
        Self::stamped(ids.next_id(), MessageType::Request, Some(action.into()), Some(data))
    }

    /// Builds a successful `response` to the request identified by `request_id`.
    pub fn response(request_id: impl Into<String>, data: Value) -> Self {
        Self::stamped(request_id.into(), MessageType::Response, None, Some(data))
    }

    /// Builds a failed `response` to the request identified by `request_id`.
    pub fn error_response(request_id: impl Into<String>, error: RemoteError) -> Self {
        let mut msg = Self::stamped(request_id.into(), MessageType::Response, None, None);
        msg.error = Some(error);
        msg
    }

    /// Builds a fire-and-forget `event` with a freshly generated id.
    pub fn event(ids: &MessageIdGenerator, action: impl Into<String>, data: Value) -> Self {
        Self::stamped(ids.next_id(), MessageType::Event, Some(action.into()), Some(data))
    }

    /// Echoes the answered action on a response, which only serves logging.
    pub fn for_action(mut self, action: Option<&str>) -> Self {
        self.action = action.map(str::to_string);
        self
    }

    fn stamped(
        id: String,
        kind: MessageType,
        action: Option<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            id,
            timestamp: now_millis(),
            kind,
            action,
            data,
            error: None,
        }
    }

    /// `true` if this is the handshake request or its response.
    pub fn is_handshake(&self) -> bool {
        self.action.as_deref() == Some(HANDSHAKE_ACTION)
    }

    /// The action name, or `""` for responses that do not echo one.
    pub fn action_name(&self) -> &str {
        self.action.as_deref().unwrap_or("")
    }

    /// Serializes the envelope into the JSON value handed to `postMessage`.
    pub fn to_value(&self) -> Value {
        // Serialization of this struct cannot fail: every field is a string,
        // number, or an already-built `Value`.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
