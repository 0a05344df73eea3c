//! The `Aiuta` entry point embedded by a merchant page.
//!
//! ```text
//! aiuta.try_on("sku-42")
//!   └─ ensure_iframe()          create or adopt #aiuta-iframe; a recreated
//!                               element gets a new connection
//!   └─ connection.connect()     handshake, host context ⇄ app context
//!   └─ rpc.app().try_on(ids)    request "app.tryOn"
//! ```
//!
//! While the app runs it calls back into the page: `sdk.trackEvent` is
//! forwarded to an [`EventSink`], and `sdk.setInteractive` (plus the legacy
//! modal open/close messages) toggles the iframe's pointer events.
//!
//! A connection whose window can no longer be posted to is dropped, so the
//! next `try_on` starts a new handshake.

use std::sync::{Arc, Mutex, MutexGuard};

use aiuta_rpc::protocol::actions::methods;
use aiuta_rpc::{
    Action, Connection, HandlerError, HostContext, LegacyAction, PageEnvironment, Rpc, RpcConfig,
    RpcError,
};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::app_url::{build_app_url, AppUrlError};
use super::iframe_lifecycle::{EnsuredIframe, IframeManager};
use crate::infrastructure::config::{AiutaConfiguration, ConfigError};
use crate::infrastructure::document::{Document, IframeError};

/// Version reported to the app in the handshake context.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Receives analytics events emitted by the app.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn track(&self, event: &Value);
}

/// Default sink: logs the event type.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn track(&self, event: &Value) {
        let kind = event.get("type").and_then(Value::as_str).unwrap_or("unknown");
        info!("analytics event: {kind}");
    }
}

/// One or more product ids to try on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductIds(Vec<String>);

impl ProductIds {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for ProductIds {
    fn from(id: &str) -> Self {
        Self(vec![id.to_string()])
    }
}

impl From<String> for ProductIds {
    fn from(id: String) -> Self {
        Self(vec![id])
    }
}

impl From<Vec<String>> for ProductIds {
    fn from(ids: Vec<String>) -> Self {
        Self(ids)
    }
}

impl From<Vec<&str>> for ProductIds {
    fn from(ids: Vec<&str>) -> Self {
        Self(ids.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ProductIds {
    fn from(ids: &[&str]) -> Self {
        Self(ids.iter().map(|id| (*id).to_string()).collect())
    }
}

#[derive(Debug, Error)]
pub enum AiutaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    AppUrl(#[from] AppUrlError),

    #[error(transparent)]
    Iframe(#[from] IframeError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("try_on needs at least one product id")]
    NoProducts,

    /// The iframe loads a document with an opaque origin, which cannot be trusted.
    #[error("iframe source {0:?} has no trustworthy origin")]
    UntrustedFrame(String),
}

/// The host-side widget.
pub struct Aiuta {
    configuration: AiutaConfiguration,
    document: Arc<dyn Document>,
    iframe: Arc<IframeManager>,
    sink: Arc<dyn EventSink>,
    rpc_config: RpcConfig,
    /// The connection inbound page events are routed to.
    current: Arc<Mutex<Option<Connection>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Aiuta {
    /// Prepares the widget for `page`.  Nothing is added to the document
    /// until the first [`try_on`](Self::try_on).
    ///
    /// # Errors
    ///
    /// [`AiutaError::Config`] for an invalid configuration,
    /// [`AiutaError::AppUrl`] if the iframe URL cannot be built.
    pub fn new(
        configuration: AiutaConfiguration,
        document: Arc<dyn Document>,
        page: &PageEnvironment,
    ) -> Result<Self, AiutaError> {
        configuration.validate()?;
        let src = build_app_url(
            &configuration.app_url,
            page,
            configuration.custom_css_url.as_deref(),
        )?;
        let iframe = Arc::new(IframeManager::new(
            document.clone(),
            configuration.iframe_id.clone(),
            src,
        ));

        Ok(Self {
            configuration,
            document,
            iframe,
            sink: Arc::new(TracingEventSink),
            rpc_config: RpcConfig::default(),
            current: Arc::new(Mutex::new(None)),
            listener: Mutex::new(None),
        })
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_rpc_config(mut self, rpc_config: RpcConfig) -> Self {
        self.rpc_config = rpc_config;
        self
    }

    /// Opens the try-on flow for `product_ids`.
    ///
    /// Creates the iframe and performs the handshake on first use.
    ///
    /// # Errors
    ///
    /// [`AiutaError::NoProducts`] for an empty list, otherwise whatever the
    /// iframe setup, handshake or call fails with.
    pub async fn try_on(&self, product_ids: impl Into<ProductIds>) -> Result<Value, AiutaError> {
        let product_ids = product_ids.into();
        if product_ids.is_empty() {
            return Err(AiutaError::NoProducts);
        }

        let conn = self.ensure_connection()?;
        let result = self.open_try_on(&conn, product_ids).await;
        if let Err(RpcError::Transport(e)) = &result {
            // The window behind this connection is gone for good.
            warn!("discarding connection to {}: {e}", conn.trusted_origin());
            self.discard(&conn);
        }
        Ok(result?)
    }

    async fn open_try_on(&self, conn: &Connection, product_ids: ProductIds) -> Result<Value, RpcError> {
        conn.connect().await?;
        self.iframe.mark_connected();

        info!("try-on requested for {} product(s)", product_ids.len());
        Rpc::connected(conn.clone())
            .app()
            .try_on(product_ids.into_vec())
            .await
    }

    /// Typed view of the app; the fallback until the handshake completes.
    pub fn rpc(&self) -> Rpc {
        match self.connection() {
            Some(conn) => Rpc::auto(&conn),
            None => Rpc::fallback(),
        }
    }

    pub fn connection(&self) -> Option<Connection> {
        lock(&self.current).clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection().map_or(false, |c| c.is_connected())
    }

    pub fn iframe(&self) -> &IframeManager {
        &self.iframe
    }

    pub fn configuration(&self) -> &AiutaConfiguration {
        &self.configuration
    }

    /// Destroys the connection and removes the iframe.  A later `try_on`
    /// starts over with a fresh iframe and handshake.
    pub fn destroy(&self) {
        if let Some(conn) = lock(&self.current).take() {
            conn.destroy();
        }
        self.iframe.remove_iframe();
    }

    fn ensure_connection(&self) -> Result<Connection, AiutaError> {
        let EnsuredIframe { window, created } = self.iframe.ensure_iframe()?;

        let mut current = lock(&self.current);
        if created {
            // The old connection is bound to the removed element's window.
            if let Some(stale) = current.take() {
                debug!("iframe was recreated, dropping connection to {}", stale.trusted_origin());
                stale.destroy();
            }
        }
        if let Some(conn) = current.as_ref().filter(|c| !c.is_destroyed()) {
            return Ok(conn.clone());
        }

        let app_origin = self
            .iframe
            .frame_origin()
            .ok_or_else(|| AiutaError::UntrustedFrame(self.iframe.src().to_string()))?;
        self.start_listener()?;

        let context = HostContext {
            config: self.configuration.to_value(),
            sdk_version: SDK_VERSION.to_string(),
        };
        let conn = Connection::new(window, app_origin, context.to_value(), self.rpc_config.clone());
        HostHandlers {
            iframe: self.iframe.clone(),
            sink: self.sink.clone(),
        }
        .register(&conn);

        debug!("host connection created for {}", conn.trusted_origin());
        *current = Some(conn.clone());
        Ok(conn)
    }

    /// Destroys `conn` and forgets it if it is still the current one.
    fn discard(&self, conn: &Connection) {
        conn.destroy();
        let mut current = lock(&self.current);
        if current.as_ref().map_or(false, Connection::is_destroyed) {
            *current = None;
        }
    }

    /// Routes the page's `message` events to whichever connection is current.
    fn start_listener(&self) -> Result<(), AiutaError> {
        let mut listener = lock(&self.listener);
        if listener.is_some() {
            return Ok(());
        }

        let mut events = self.document.message_events()?;
        let current = Arc::downgrade(&self.current);
        *listener = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(slot) = current.upgrade() else {
                    break;
                };
                let conn = lock(&slot).clone();
                if let Some(conn) = conn {
                    conn.handle_event(event);
                }
            }
        }));
        Ok(())
    }
}

impl Drop for Aiuta {
    fn drop(&mut self) {
        if let Some(listener) = lock(&self.listener).take() {
            listener.abort();
        }
        if let Some(conn) = lock(&self.current).take() {
            conn.destroy();
        }
    }
}

/// Handlers the page exposes to the app.
#[derive(Clone)]
struct HostHandlers {
    iframe: Arc<IframeManager>,
    sink: Arc<dyn EventSink>,
}

impl HostHandlers {
    fn actions() -> [&'static str; 5] {
        [
            methods::SDK_TRACK_EVENT,
            methods::SDK_SET_INTERACTIVE,
            LegacyAction::OpenAiutaFullScreenModal.as_str(),
            LegacyAction::CloseModal.as_str(),
            LegacyAction::IframeLoaded.as_str(),
        ]
    }

    fn register(self, conn: &Connection) {
        for name in Self::actions() {
            let handlers = self.clone();
            conn.register_handler(name, move |data| {
                let handlers = handlers.clone();
                async move { handlers.handle(Action::decode(name, data)?) }
            });
        }
    }

    fn handle(&self, action: Action) -> Result<Value, HandlerError> {
        match action {
            Action::TrackEvent { event } => {
                self.sink.track(&event);
                Ok(Value::Null)
            }
            Action::SetInteractive { interactive } => self.set_interactive(interactive),
            Action::Legacy { kind, .. } => match kind {
                LegacyAction::OpenAiutaFullScreenModal => self.set_interactive(true),
                LegacyAction::CloseModal => self.set_interactive(false),
                LegacyAction::IframeLoaded => {
                    info!("try-on app loaded");
                    Ok(Value::Null)
                }
                other => Err(HandlerError::new(format!(
                    "{} is not handled by the page",
                    other.as_str()
                ))),
            },
            other => Err(HandlerError::new(format!(
                "{} is not handled by the page",
                other.name()
            ))),
        }
    }

    fn set_interactive(&self, interactive: bool) -> Result<Value, HandlerError> {
        self.iframe
            .set_interactive(interactive)
            .map_err(|e| HandlerError::new(e.to_string()).with_code("iframe"))?;
        Ok(Value::Null)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
