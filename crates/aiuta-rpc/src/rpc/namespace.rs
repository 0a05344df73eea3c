//! Typed views over the remote side.
//!
//! [`Rpc`] wraps a [`RemoteCaller`] (a live [`Connection`] or the
//! [`FallbackProxy`]) and hands out one small struct per namespace:
//!
//! | Namespace | Methods                                  | Implemented by |
//! |-----------|------------------------------------------|----------------|
//! | `sdk`     | `track_event`, `set_interactive`         | host page      |
//! | `app`     | `try_on`                                 | iframe         |
//! | `config`  | read-only view of the host configuration | host context   |
//!
//! The strategy is chosen once, when the `Rpc` is built.  Every namespace
//! obtained from it uses the same caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::connection::Connection;
use super::error::RpcError;
use super::fallback::FallbackProxy;
use crate::protocol::actions::Action;

/// Something that can invoke actions on the other side.
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    /// Calls `name` with the positional argument array `args`.
    async fn invoke(&self, name: &str, args: Value) -> Result<Value, RpcError>;

    /// The context the other side sent during the handshake.
    fn context(&self) -> Value;

    /// `true` if calls actually reach the other side.
    fn is_live(&self) -> bool;
}

#[async_trait]
impl RemoteCaller for Connection {
    async fn invoke(&self, name: &str, args: Value) -> Result<Value, RpcError> {
        self.call(name, args).await
    }

    fn context(&self) -> Value {
        Connection::context(self)
    }

    fn is_live(&self) -> bool {
        self.is_connected() && !self.is_destroyed()
    }
}

/// Entry point to the typed namespaces.
#[derive(Clone)]
pub struct Rpc {
    caller: Arc<dyn RemoteCaller>,
}

impl Rpc {
    /// Routes every call through `conn`.
    pub fn connected(conn: Connection) -> Self {
        Self::with_caller(Arc::new(conn))
    }

    /// Routes every call to the [`FallbackProxy`].
    pub fn fallback() -> Self {
        Self::with_caller(Arc::new(FallbackProxy::new()))
    }

    /// Uses `conn` if its handshake has completed, the fallback otherwise.
    pub fn auto(conn: &Connection) -> Self {
        if conn.is_connected() {
            Self::connected(conn.clone())
        } else {
            Self::fallback()
        }
    }

    pub fn with_caller(caller: Arc<dyn RemoteCaller>) -> Self {
        Self { caller }
    }

    pub fn sdk(&self) -> SdkApi {
        SdkApi {
            caller: self.caller.clone(),
        }
    }

    pub fn app(&self) -> AppApi {
        AppApi {
            caller: self.caller.clone(),
        }
    }

    pub fn config(&self) -> ConfigApi {
        ConfigApi {
            caller: self.caller.clone(),
        }
    }

    /// Untyped call for actions without a namespace method.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, RpcError> {
        self.caller.invoke(name, args).await
    }

    /// Like [`call`](Self::call), with the result deserialized into `T`.
    ///
    /// # Errors
    ///
    /// [`RpcError::Serialization`] if the response does not have the shape of `T`.
    pub async fn call_as<T: DeserializeOwned>(&self, name: &str, args: Value) -> Result<T, RpcError> {
        let value = self.call(name, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn is_live(&self) -> bool {
        self.caller.is_live()
    }
}

impl std::fmt::Debug for Rpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rpc").field("live", &self.is_live()).finish()
    }
}

async fn send(caller: &dyn RemoteCaller, action: Action) -> Result<Value, RpcError> {
    let (name, data) = action.into_parts();
    caller.invoke(&name, data).await
}

/// Methods the host page implements.
#[derive(Clone)]
pub struct SdkApi {
    caller: Arc<dyn RemoteCaller>,
}

impl SdkApi {
    /// Forwards an analytics event to the host.
    pub async fn track_event(&self, event: Value) -> Result<(), RpcError> {
        send(self.caller.as_ref(), Action::TrackEvent { event }).await?;
        Ok(())
    }

    /// Asks the host to let pointer events reach the iframe (`true`) or pass
    /// through to the page (`false`).
    pub async fn set_interactive(&self, interactive: bool) -> Result<(), RpcError> {
        send(self.caller.as_ref(), Action::SetInteractive { interactive }).await?;
        Ok(())
    }
}

/// Methods the iframe implements.
#[derive(Clone)]
pub struct AppApi {
    caller: Arc<dyn RemoteCaller>,
}

impl AppApi {
    /// Starts a try-on session for `product_ids`.
    pub async fn try_on(&self, product_ids: Vec<String>) -> Result<Value, RpcError> {
        send(self.caller.as_ref(), Action::TryOn { product_ids }).await
    }
}

/// Read-only view of the `config` object in the host's handshake context.
///
/// Every accessor yields `Value::Null` until the host context is known.
#[derive(Clone)]
pub struct ConfigApi {
    caller: Arc<dyn RemoteCaller>,
}

impl ConfigApi {
    /// The whole `config` object.
    pub fn snapshot(&self) -> Value {
        self.caller
            .context()
            .get("config")
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// One top-level key of `config`.
    pub fn get(&self, key: &str) -> Value {
        self.snapshot().get(key).cloned().unwrap_or(Value::Null)
    }

    /// The `auth` section.
    pub fn auth(&self) -> Value {
        self.get("auth")
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
