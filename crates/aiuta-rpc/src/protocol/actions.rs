//! Typed view of the `action` + `data` pair.
//!
//! On the wire `data` is arbitrary JSON.  [`Action`] is the tagged union the
//! rest of the workspace works with: each known action gets a variant with
//! typed fields, the pre-RPC message names map onto [`LegacyAction`], and any
//! other name travels untouched as [`Action::Opaque`] so that a newer peer can
//! call methods this build has never heard of.
//!
//! # Argument convention
//!
//! RPC methods receive their arguments as a JSON array, one element per
//! argument: `sdk.setInteractive(true)` is sent as `data = [true]`.  The
//! handshake is the one exception: its `data` is the context object itself.

use serde_json::{json, Value};

use super::codec::ProtocolError;
use super::message::HANDSHAKE_ACTION;

/// Fully qualified names of the typed RPC methods.
pub mod methods {
    /// Host-side: forward an analytics event to the embedding page.
    pub const SDK_TRACK_EVENT: &str = "sdk.trackEvent";
    /// Host-side: toggle whether the iframe intercepts pointer events.
    pub const SDK_SET_INTERACTIVE: &str = "sdk.setInteractive";
    /// Iframe-side: start a try-on session for the given products.
    pub const APP_TRY_ON: &str = "app.tryOn";
}

/// Message names used by producers that predate the typed protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyAction {
    BaseKeys,
    JwtToken,
    StylesConfiguration,
    Resize,
    CloseModal,
    GetAiutaApiKeys,
    OpenAiutaFullScreenModal,
    RemoveHistoryImages,
    IframeLoaded,
}

impl LegacyAction {
    /// Every legacy action, in declaration order.
    pub const ALL: [LegacyAction; 9] = [
        Self::BaseKeys,
        Self::JwtToken,
        Self::StylesConfiguration,
        Self::Resize,
        Self::CloseModal,
        Self::GetAiutaApiKeys,
        Self::OpenAiutaFullScreenModal,
        Self::RemoveHistoryImages,
        Self::IframeLoaded,
    ];

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BaseKeys => "BASE_KEYS",
            Self::JwtToken => "JWT_TOKEN",
            Self::StylesConfiguration => "STYLES_CONFIGURATION",
            Self::Resize => "RESIZE",
            Self::CloseModal => "CLOSE_MODAL",
            Self::GetAiutaApiKeys => "GET_AIUTA_API_KEYS",
            Self::OpenAiutaFullScreenModal => "OPEN_AIUTA_FULL_SCREEN_MODAL",
            Self::RemoveHistoryImages => "REMOVE_HISTORY_IMAGES",
            Self::IframeLoaded => "IFRAME_LOADED",
        }
    }
}

/// A decoded `action` together with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Handshake carrying the sender's context object.
    Handshake(Value),
    /// `sdk.trackEvent(event)`.
    TrackEvent { event: Value },
    /// `sdk.setInteractive(interactive)`.
    SetInteractive { interactive: bool },
    /// `app.tryOn(productIds)`.
    TryOn { product_ids: Vec<String> },
    /// A pre-RPC message; `data` is passed through untouched.
    Legacy { kind: LegacyAction, data: Value },
    /// Any other action name, passed through untouched.
    Opaque { action: String, data: Value },
}

impl Action {
    /// Decodes `data` according to the shape expected for `action`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArguments`] when a known action
    /// carries arguments of the wrong shape.  Unknown actions never fail.
    pub fn decode(action: &str, data: Value) -> Result<Self, ProtocolError> {
        let invalid = |reason: &str| ProtocolError::InvalidArguments {
            action: action.to_string(),
            reason: reason.to_string(),
        };

        match action {
            HANDSHAKE_ACTION => Ok(Self::Handshake(data)),
            methods::SDK_TRACK_EVENT => {
                let event = first_arg(data).ok_or_else(|| invalid("expected one event argument"))?;
                if !event.is_object() {
                    return Err(invalid("event must be an object"));
                }
                Ok(Self::TrackEvent { event })
            }
            methods::SDK_SET_INTERACTIVE => {
                let interactive = first_arg(data)
                    .and_then(|v| v.as_bool())
                    .ok_or_else(|| invalid("expected one boolean argument"))?;
                Ok(Self::SetInteractive { interactive })
            }
            methods::APP_TRY_ON => {
                let arg = first_arg(data).ok_or_else(|| invalid("expected product ids"))?;
                let product_ids = product_ids_from(arg)
                    .ok_or_else(|| invalid("product ids must be a string or an array of strings"))?;
                if product_ids.is_empty() {
                    return Err(invalid("at least one product id is required"));
                }
                Ok(Self::TryOn { product_ids })
            }
            other => match LegacyAction::from_wire(other) {
                Some(kind) => Ok(Self::Legacy { kind, data }),
                None => Ok(Self::Opaque {
                    action: other.to_string(),
                    data,
                }),
            },
        }
    }

    /// The wire name of this action.
    pub fn name(&self) -> &str {
        match self {
            Self::Handshake(_) => HANDSHAKE_ACTION,
            Self::TrackEvent { .. } => methods::SDK_TRACK_EVENT,
            Self::SetInteractive { .. } => methods::SDK_SET_INTERACTIVE,
            Self::TryOn { .. } => methods::APP_TRY_ON,
            Self::Legacy { kind, .. } => kind.as_str(),
            Self::Opaque { action, .. } => action,
        }
    }

    /// Splits the action into its wire name and `data` value.
    pub fn into_parts(self) -> (String, Value) {
        let name = self.name().to_string();
        let data = match self {
            Self::Handshake(ctx) => ctx,
            Self::TrackEvent { event } => json!([event]),
            Self::SetInteractive { interactive } => json!([interactive]),
            Self::TryOn { product_ids } => json!([product_ids]),
            Self::Legacy { data, .. } | Self::Opaque { data, .. } => data,
        };
        (name, data)
    }
}

/// Returns the first positional argument.
///
/// A non-array `data` is treated as a single argument so that hand-written
/// producers sending `data: true` instead of `data: [true]` still work.
fn first_arg(data: Value) -> Option<Value> {
    match data {
        Value::Array(mut args) if !args.is_empty() => Some(args.swap_remove(0)),
        Value::Array(_) | Value::Null => None,
        other => Some(other),
    }
}

fn product_ids_from(arg: Value) -> Option<Vec<String>> {
    match arg {
        Value::String(id) => Some(vec![id]),
        Value::Array(items) => items
            .into_iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_try_on_with_array_argument() {
        // Arrange
        let data = json!([["sku-1", "sku-2"]]);

        // Act
        let action = Action::decode(methods::APP_TRY_ON, data).unwrap();

        // Assert
        assert_eq!(
            action,
            Action::TryOn {
                product_ids: vec!["sku-1".to_string(), "sku-2".to_string()]
            }
        );
    }

    #[test]
    fn test_decode_try_on_with_single_string_argument() {
        let action = Action::decode(methods::APP_TRY_ON, json!(["sku-42"])).unwrap();
        assert_eq!(action, Action::TryOn { product_ids: vec!["sku-42".to_string()] });
    }

    #[test]
    fn test_decode_try_on_rejects_empty_and_mixed_ids() {
        assert!(Action::decode(methods::APP_TRY_ON, json!([[]])).is_err());
        assert!(Action::decode(methods::APP_TRY_ON, json!([["a", 1]])).is_err());
        assert!(Action::decode(methods::APP_TRY_ON, json!([])).is_err());
    }

    #[test]
    fn test_decode_set_interactive() {
        let action = Action::decode(methods::SDK_SET_INTERACTIVE, json!([true])).unwrap();
        assert_eq!(action, Action::SetInteractive { interactive: true });
    }

    #[test]
    fn test_decode_set_interactive_accepts_bare_boolean() {
        let action = Action::decode(methods::SDK_SET_INTERACTIVE, json!(false)).unwrap();
        assert_eq!(action, Action::SetInteractive { interactive: false });
    }

    #[test]
    fn test_decode_set_interactive_rejects_string() {
        let err = Action::decode(methods::SDK_SET_INTERACTIVE, json!(["yes"])).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_decode_track_event_requires_object() {
        assert!(Action::decode(methods::SDK_TRACK_EVENT, json!([{"type": "page"}])).is_ok());
        assert!(Action::decode(methods::SDK_TRACK_EVENT, json!(["page"])).is_err());
    }

    #[test]
    fn test_decode_legacy_action_keeps_data() {
        let action = Action::decode("RESIZE", json!({"height": 640})).unwrap();
        assert_eq!(
            action,
            Action::Legacy {
                kind: LegacyAction::Resize,
                data: json!({"height": 640})
            }
        );
    }

    #[test]
    fn test_decode_unknown_action_is_opaque() {
        let action = Action::decode("app.futureFeature", json!([1, 2])).unwrap();
        assert_eq!(action.name(), "app.futureFeature");
        assert!(matches!(action, Action::Opaque { .. }));
    }

    #[test]
    fn test_into_parts_wraps_arguments_in_array() {
        let (name, data) = Action::SetInteractive { interactive: true }.into_parts();
        assert_eq!(name, methods::SDK_SET_INTERACTIVE);
        assert_eq!(data, json!([true]));

        let (name, data) = Action::TryOn { product_ids: vec!["a".into()] }.into_parts();
        assert_eq!(name, methods::APP_TRY_ON);
        assert_eq!(data, json!([["a"]]));
    }

    #[test]
    fn test_handshake_data_is_not_wrapped() {
        let (name, data) = Action::Handshake(json!({"appVersion": "1.0.0"})).into_parts();
        assert_eq!(name, HANDSHAKE_ACTION);
        assert_eq!(data, json!({"appVersion": "1.0.0"}));
    }

    #[test]
    fn test_legacy_wire_names() {
        for kind in LegacyAction::ALL {
            assert_eq!(LegacyAction::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(LegacyAction::from_wire("resize"), None);
    }
}
