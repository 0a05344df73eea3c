//! The RPC layer on top of the protocol envelope.
//!
//! - [`connection`] – the symmetric [`Connection`](connection::Connection)
//!   used identically by the host page and the iframe.
//! - [`registry`] – named handlers invoked by the remote side.
//! - [`pending`] – outstanding outbound requests awaiting their response.
//! - [`transport`] – the window abstraction messages are posted through.
//! - [`fallback`] – the stand-in used while no connection exists.
//! - [`namespace`] – typed `sdk` / `app` / `config` views.

pub mod connection;
pub mod error;
pub mod fallback;
pub mod namespace;
pub mod pending;
pub mod registry;
pub mod transport;

pub use connection::{Connection, ConnectionState, RpcConfig};
pub use error::{HandlerError, RpcError};
pub use fallback::FallbackProxy;
pub use namespace::{AppApi, ConfigApi, RemoteCaller, Rpc, SdkApi};
pub use registry::{Handler, HandlerRegistry, HandlerResult};
pub use transport::{ChannelWindow, MessageEvent, MessageTarget, TransportError, WindowId};
