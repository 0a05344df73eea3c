//! Handshake context payloads.
//!
//! Each side sends its context exactly once, inside the handshake.  After that
//! the received context is immutable for the rest of the session.
//!
//! ```json
//! host → iframe: {"config": { ... }, "sdkVersion": "0.1.0"}
//! iframe → host: {"appVersion": "1.4.2"}
//! ```
//!
//! The connection itself treats contexts as opaque JSON; these structs are
//! the typed views used by the host SDK and the iframe app.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Context the host page sends to the iframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    /// The embedding page's configuration, forwarded verbatim.
    #[serde(default)]
    pub config: Value,
    /// Version of the host SDK.
    pub sdk_version: String,
}

/// Context the iframe sends to the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppContext {
    /// Version of the embedded try-on app.
    pub app_version: String,
}

impl HostContext {
    /// Parses a received context, `None` if it does not have the host shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl AppContext {
    /// Parses a received context, `None` if it does not have the app shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
