//! Start-up of the iframe side.
//!
//! ```text
//! AppBootstrap::new()   parse launch params, resolve trusted origin,
//!                       register app.tryOn
//!   └─ listen(inbox)    window "message" events → connection
//!   └─ connect()        handshake, sends {appVersion}
//!   └─ rpc()            sdk.* / config views of the host
//! ```

use std::sync::Arc;

use aiuta_rpc::protocol::actions::methods;
use aiuta_rpc::{
    resolve_trusted_origin, Action, AppContext, Connection, HandlerError, HostContext,
    LegacyAction, MessageEvent, MessageTarget, PageEnvironment, Rpc, RpcConfig, RpcError,
};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::try_on::TryOnHandler;
use crate::infrastructure::launch::{LaunchError, LaunchParams};

/// Version reported to the host in the handshake context.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Every candidate origin was opaque.
    #[error("no trustworthy parent origin could be determined")]
    NoTrustedOrigin,

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// The app's end of the channel to the host page.
pub struct AppBootstrap {
    params: LaunchParams,
    connection: Connection,
}

impl AppBootstrap {
    /// Prepares a connection to `parent` (`window.parent`) for the document
    /// described by `env`.
    ///
    /// The `parentOrigin` query parameter is used as a hint when `env` does
    /// not carry one already.
    ///
    /// # Errors
    ///
    /// [`BootstrapError::Launch`] if the document URL cannot be parsed,
    /// [`BootstrapError::NoTrustedOrigin`] if only opaque origins are known.
    pub fn new(
        env: PageEnvironment,
        parent: Arc<dyn MessageTarget>,
        handler: Arc<dyn TryOnHandler>,
        config: RpcConfig,
    ) -> Result<Self, BootstrapError> {
        let params = LaunchParams::from_href(&env.href)?;
        let mut env = env;
        if env.parent_origin_hint.is_none() {
            env.parent_origin_hint = params.parent_origin.clone();
        }

        let trusted_origin = resolve_trusted_origin(&env);
        if trusted_origin == "null" {
            return Err(BootstrapError::NoTrustedOrigin);
        }
        debug!("trusting parent origin {trusted_origin}");

        let context = AppContext {
            app_version: APP_VERSION.to_string(),
        };
        let connection = Connection::new(parent, trusted_origin, context.to_value(), config);
        connection.register_handler(methods::APP_TRY_ON, move |data: Value| {
            let handler = handler.clone();
            async move {
                match Action::decode(methods::APP_TRY_ON, data)? {
                    Action::TryOn { product_ids } => {
                        info!("try-on started for {} product(s)", product_ids.len());
                        handler.try_on(product_ids).await
                    }
                    other => Err(HandlerError::new(format!("unexpected {}", other.name()))),
                }
            }
        });

        Ok(Self { params, connection })
    }

    /// Feeds the window's `message` events into the connection.
    pub fn listen(&self, inbox: mpsc::UnboundedReceiver<MessageEvent>) {
        self.connection.spawn_listener(inbox);
    }

    /// Performs the handshake with the host.
    ///
    /// # Errors
    ///
    /// [`RpcError::ConnectTimeout`] if the host never answers.
    pub async fn connect(&self) -> Result<(), BootstrapError> {
        self.connection.connect().await?;
        Ok(())
    }

    /// Tells the host the app has finished loading.
    ///
    /// # Errors
    ///
    /// [`RpcError`] if the event could not be posted.
    pub fn notify_loaded(&self) -> Result<(), BootstrapError> {
        self.connection
            .emit(LegacyAction::IframeLoaded.as_str(), Value::Null)?;
        Ok(())
    }

    /// Typed view of the host; the fallback until the handshake completes.
    pub fn rpc(&self) -> Rpc {
        Rpc::auto(&self.connection)
    }

    /// The host context, once received.
    pub fn host_context(&self) -> Option<HostContext> {
        HostContext::from_value(&self.connection.context())
    }

    pub fn launch_params(&self) -> &LaunchParams {
        &self.params
    }

    pub fn trusted_origin(&self) -> &str {
        self.connection.trusted_origin()
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for AppBootstrap {
    fn drop(&mut self) {
        self.connection.destroy();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
