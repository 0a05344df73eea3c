//! # aiuta-rpc
//!
//! The message channel that bridges a host page and the sandboxed Aiuta
//! try-on iframe.  Both documents talk to each other exclusively through
//! `window.postMessage`; this crate gives that raw, untyped, unordered stream
//! a request/response shape.
//!
//! This crate is used by both the host SDK (`aiuta-sdk`) and the iframe app
//! (`aiuta-app`).  It has no knowledge of the DOM: windows are reached through
//! the [`MessageTarget`] trait and inbound traffic arrives as
//! [`MessageEvent`] values.
//!
//! # Architecture overview
//!
//! - **`protocol`** – The wire envelope (`version`, `id`, `timestamp`, `type`,
//!   `action`, `data`), its validation, message id generation, the tagged
//!   [`Action`] payloads and trusted-origin resolution.
//!
//! - **`rpc`** – The symmetric [`Connection`] (handshake, pending request
//!   correlation, handler registry, inbound dispatch), the [`FallbackProxy`]
//!   used while no connection exists, and the typed namespace views grouped
//!   under [`Rpc`].
//!
//! ```text
//! host page                                     iframe
//! ─────────                                     ──────
//! Connection ── request {__handshake, ctx} ───▶ Connection
//!            ◀── response {same id, ctx} ─────
//! rpc.app().try_on(ids) ── request ───────────▶ handler "app.tryOn"
//!            ◀── response {same id} ──────────
//! handler "sdk.trackEvent" ◀── request ──────── rpc.sdk().track_event(e)
//! ```

pub mod protocol;
pub mod rpc;

// Re-export the most-used types at the crate root so callers can write
// `aiuta_rpc::Connection` instead of `aiuta_rpc::rpc::connection::Connection`.
pub use protocol::actions::{Action, LegacyAction};
pub use protocol::codec::{decode_inbound, validate_message, ProtocolError};
pub use protocol::context::{AppContext, HostContext};
pub use protocol::message::{Message, MessageType, RemoteError, HANDSHAKE_ACTION, PROTOCOL_VERSION};
pub use protocol::origin::{origin_of, resolve_trusted_origin, PageEnvironment};
pub use rpc::connection::{Connection, ConnectionState, RpcConfig};
pub use rpc::error::{HandlerError, RpcError};
pub use rpc::fallback::FallbackProxy;
pub use rpc::namespace::{AppApi, ConfigApi, RemoteCaller, Rpc, SdkApi};
pub use rpc::transport::{ChannelWindow, MessageEvent, MessageTarget, TransportError, WindowId};
