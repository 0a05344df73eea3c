//! Stand-in used while no connection exists.

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::error::RpcError;
use super::namespace::RemoteCaller;

/// A [`RemoteCaller`] that answers every call with `Value::Null`.
///
/// Code that talks to the other side can run unchanged before the handshake
/// completes (or when the widget runs standalone, outside any host page): the
/// calls are no-ops that log a warning instead of failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackProxy;

impl FallbackProxy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteCaller for FallbackProxy {
    async fn invoke(&self, name: &str, _args: Value) -> Result<Value, RpcError> {
        warn!("{name} called without a connection; ignored");
        Ok(Value::Null)
    }

    fn context(&self) -> Value {
        Value::Null
    }

    fn is_live(&self) -> bool {
        false
    }
}
