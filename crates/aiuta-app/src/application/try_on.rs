//! The `app.tryOn` entry point.

use aiuta_rpc::HandlerError;
use async_trait::async_trait;
use serde_json::Value;

/// Implemented by the try-on UI.
///
/// Called once per `app.tryOn` request from the host.  The returned value is
/// sent back as the response payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TryOnHandler: Send + Sync {
    async fn try_on(&self, product_ids: Vec<String>) -> Result<Value, HandlerError>;
}
