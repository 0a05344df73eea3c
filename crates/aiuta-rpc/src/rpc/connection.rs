//! The symmetric RPC connection.
//!
//! The host page and the iframe each own one [`Connection`] pointed at the
//! other window.  Either side may call, and either side may answer; the only
//! asymmetry is which side starts the handshake (normally both do, and the
//! first exchange to complete wins).
//!
//! # Message flow
//!
//! ```text
//! call(name, args) ──▶ pending[id] ──▶ post request ──▶ remote handler
//!        ▲                                                  │
//!        └──── take(pending[id]) ◀── handle_event ◀── post response
//! ```
//!
//! All inbound traffic goes through [`Connection::handle_event`], normally
//! driven by [`Connection::spawn_listener`].  Requests are answered from
//! spawned Tokio tasks so a slow handler never blocks the listener, which
//! also means responses for concurrent calls arrive in any order.
//!
//! Must be used from within a Tokio runtime.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::error::RpcError;
use super::pending::PendingRequests;
use super::registry::{HandlerRegistry, HandlerResult};
use super::transport::{MessageEvent, MessageTarget};
use crate::protocol::codec::decode_inbound;
use crate::protocol::ids::MessageIdGenerator;
use crate::protocol::message::{Message, MessageType, RemoteError, HANDSHAKE_ACTION};

/// Default deadline for a single `call`.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default deadline for the handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default interval between handshake attempts.
pub const DEFAULT_HANDSHAKE_RETRY: Duration = Duration::from_millis(500);

/// Timing knobs for a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// How long `call` waits for the matching response.
    pub call_timeout: Duration,
    /// How long `connect` waits for the handshake to complete.
    pub connect_timeout: Duration,
    /// How often the handshake request is re-posted while unanswered.
    pub handshake_retry_interval: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_retry_interval: DEFAULT_HANDSHAKE_RETRY,
        }
    }
}

/// Handshake state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One end of the host ⇄ iframe channel.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    target: Arc<dyn MessageTarget>,
    trusted_origin: String,
    local_context: Value,
    config: RpcConfig,
    ids: MessageIdGenerator,
    handlers: HandlerRegistry,
    pending: PendingRequests,
    state: watch::Sender<ConnectionState>,
    /// Set once by the first handshake that carries a context.
    remote_context: OnceLock<Value>,
    /// Ids of handshake requests this side posted and has not seen answered.
    handshake_ids: Mutex<HashSet<String>>,
    closed: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(listener) = lock(&self.listener).take() {
            listener.abort();
        }
    }
}

impl Connection {
    /// Creates a disconnected connection that posts to `target` and only
    /// accepts traffic from `trusted_origin`.
    ///
    /// `local_context` is sent to the remote side during the handshake.
    pub fn new(
        target: Arc<dyn MessageTarget>,
        trusted_origin: impl Into<String>,
        local_context: Value,
        config: RpcConfig,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                target,
                trusted_origin: trusted_origin.into(),
                local_context,
                config,
                ids: MessageIdGenerator::new(),
                handlers: HandlerRegistry::new(),
                pending: PendingRequests::new(),
                state,
                remote_context: OnceLock::new(),
                handshake_ids: Mutex::new(HashSet::new()),
                closed: AtomicBool::new(false),
                listener: Mutex::new(None),
            }),
        }
    }

    // ── Handshake ────────────────────────────────────────────────────────────

    /// Performs the handshake.
    ///
    /// Returns immediately if already connected.  Concurrent callers all wait
    /// for the same exchange.  The handshake request is re-posted every
    /// `handshake_retry_interval` because the other document may not be
    /// listening yet.
    ///
    /// # Errors
    ///
    /// - [`RpcError::ConnectTimeout`] if no answer arrives within
    ///   `connect_timeout`.
    /// - [`RpcError::ConnectionClosed`] if the connection is destroyed meanwhile.
    /// - [`RpcError::Transport`] if the target window is gone.
    pub async fn connect(&self) -> Result<(), RpcError> {
        self.ensure_open()?;
        if self.is_connected() {
            return Ok(());
        }

        self.inner.state.send_if_modified(|s| {
            if *s == ConnectionState::Disconnected {
                *s = ConnectionState::Connecting;
                true
            } else {
                false
            }
        });

        let connect_timeout = self.inner.config.connect_timeout;
        let mut state_rx = self.inner.state.subscribe();
        match time::timeout(connect_timeout, self.handshake_until_connected(&mut state_rx)).await {
            Ok(result) => result,
            Err(_) => {
                lock(&self.inner.handshake_ids).clear();
                self.inner.state.send_if_modified(|s| {
                    if *s == ConnectionState::Connecting {
                        *s = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
                warn!(
                    "handshake with {} not answered within {connect_timeout:?}",
                    self.inner.trusted_origin
                );
                Err(RpcError::ConnectTimeout(connect_timeout))
            }
        }
    }

    async fn handshake_until_connected(
        &self,
        state_rx: &mut watch::Receiver<ConnectionState>,
    ) -> Result<(), RpcError> {
        let mut retry = time::interval(self.inner.config.handshake_retry_interval);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(RpcError::ConnectionClosed);
            }
            if *state_rx.borrow_and_update() == ConnectionState::Connected {
                return Ok(());
            }

            tokio::select! {
                _ = retry.tick() => self.post_handshake()?,
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return Err(RpcError::ConnectionClosed);
                    }
                }
            }
        }
    }

    fn post_handshake(&self) -> Result<(), RpcError> {
        let message = Message::request(
            &self.inner.ids,
            HANDSHAKE_ACTION,
            self.inner.local_context.clone(),
        );
        lock(&self.inner.handshake_ids).insert(message.id.clone());
        debug!("-> request {HANDSHAKE_ACTION} ({})", message.id);
        self.post(&message)
    }

    /// `true` once the handshake has completed in either direction.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// The context the remote side sent during the handshake, or
    /// `Value::Null` before any was received.
    pub fn context(&self) -> Value {
        self.inner
            .remote_context
            .get()
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// The context this side sends during the handshake.
    pub fn local_context(&self) -> &Value {
        &self.inner.local_context
    }

    pub fn trusted_origin(&self) -> &str {
        &self.inner.trusted_origin
    }

    pub fn config(&self) -> &RpcConfig {
        &self.inner.config
    }

    // ── Handlers ─────────────────────────────────────────────────────────────

    /// Registers the handler invoked when the remote side calls or emits
    /// `name`.  Replaces any earlier handler of that name.
    pub fn register_handler<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        let name = name.into();
        if self.inner.handlers.register(name.clone(), handler) {
            debug!("replaced handler for {name}");
        }
    }

    /// Removes the handler for `name`.  Returns `true` if one was registered.
    pub fn unregister_handler(&self, name: &str) -> bool {
        self.inner.handlers.unregister(name)
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.inner.handlers.contains(name)
    }

    // ── Outbound ─────────────────────────────────────────────────────────────

    /// Calls `name` on the remote side and waits for its response.
    ///
    /// `args` is the positional argument array.  Dropping the returned future
    /// forgets the call; a late response is then ignored.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] after `call_timeout`.  The call is not retried.
    /// - [`RpcError::Remote`] if the remote handler failed.
    /// - [`RpcError::ConnectionClosed`] if the connection is destroyed.
    /// - [`RpcError::Transport`] if the message could not be posted.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, RpcError> {
        self.ensure_open()?;

        let call_timeout = self.inner.config.call_timeout;
        let deadline = Instant::now() + call_timeout;
        let message = Message::request(&self.inner.ids, name, args);
        let rx = self.inner.pending.register(message.id.clone(), name, deadline);
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id: message.id.clone(),
        };

        debug!("-> request {name} ({})", message.id);
        self.post(&message)?;

        match time::timeout_at(deadline, rx).await {
            Ok(Ok(result)) => result,
            // The entry was dropped without being completed.
            Ok(Err(_)) => Err(RpcError::ConnectionClosed),
            Err(_) => {
                debug!("request {name} ({}) timed out after {call_timeout:?}", message.id);
                Err(RpcError::Timeout {
                    action: name.to_string(),
                    after: call_timeout,
                })
            }
        }
    }

    /// Posts a fire-and-forget `event`.
    ///
    /// # Errors
    ///
    /// [`RpcError::ConnectionClosed`] or [`RpcError::Transport`].
    pub fn emit(&self, name: &str, data: Value) -> Result<(), RpcError> {
        self.ensure_open()?;
        let message = Message::event(&self.inner.ids, name, data);
        debug!("-> event {name}");
        self.post(&message)
    }

    /// Number of calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.inner.pending.len()
    }

    fn post(&self, message: &Message) -> Result<(), RpcError> {
        self.inner
            .target
            .post_message(message.to_value(), &self.inner.trusted_origin)
            .map_err(RpcError::from)
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// Processes one inbound `message` event.
    ///
    /// Traffic from any origin or window other than the peer, and payloads
    /// that are not protocol messages, are dropped without a trace above the
    /// `trace` level.
    pub fn handle_event(&self, event: MessageEvent) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        if !self.is_from_peer(&event) {
            trace!("dropping message from untrusted origin {}", event.origin);
            return;
        }
        let Some(message) = decode_inbound(&event.data, &self.inner.ids) else {
            return;
        };

        self.inner.pending.expire(Instant::now());

        match message.kind {
            MessageType::Request => self.on_request(message),
            MessageType::Response => self.on_response(message),
            MessageType::Event => self.on_event(message),
        }
    }

    /// Feeds every event received on `inbox` into [`handle_event`](Self::handle_event)
    /// from a dedicated task.  Replaces any listener started earlier.
    pub fn spawn_listener(&self, mut inbox: mpsc::UnboundedReceiver<MessageEvent>) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(event) = inbox.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                Connection { inner }.handle_event(event);
            }
            trace!("message listener stopped");
        });

        if let Some(previous) = lock(&self.inner.listener).replace(handle) {
            previous.abort();
        }
    }

    fn is_from_peer(&self, event: &MessageEvent) -> bool {
        event.origin == self.inner.trusted_origin
            && event
                .source
                .map_or(true, |source| source == self.inner.target.window_id())
    }

    fn on_request(&self, message: Message) {
        let Some(action) = message.action else {
            trace!("dropping request {} without action", message.id);
            return;
        };
        let id = message.id;
        let data = message.data.unwrap_or(Value::Null);
        debug!("<- request {action} ({id})");

        if action == HANDSHAKE_ACTION {
            self.answer_handshake(id, data);
            return;
        }

        let Some(handler) = self.inner.handlers.get(&action) else {
            debug!("no handler registered for {action}; request {id} left unanswered");
            return;
        };

        let conn = self.clone();
        tokio::spawn(async move {
            // Running the handler as its own task turns a panic into a JoinError.
            let reply = match tokio::spawn(handler.call(data)).await {
                Ok(Ok(value)) => Message::response(id, value),
                Ok(Err(e)) => {
                    warn!("handler for {action} failed: {e}");
                    let code = e.code.unwrap_or_else(|| "handler_failed".to_string());
                    Message::error_response(id, RemoteError::new(e.message).with_code(code))
                }
                Err(_) => {
                    warn!("handler for {action} panicked");
                    Message::error_response(
                        id,
                        RemoteError::new(format!("handler for {action} panicked"))
                            .with_code("handler_panicked"),
                    )
                }
            }
            .for_action(Some(&action));

            if conn.inner.closed.load(Ordering::Acquire) {
                return;
            }
            debug!("-> response {action} ({})", reply.id);
            if let Err(e) = conn.post(&reply) {
                debug!("could not post response for {action}: {e}");
            }
        });
    }

    fn on_response(&self, message: Message) {
        let answers_handshake = lock(&self.inner.handshake_ids).remove(&message.id);
        if answers_handshake {
            debug!("<- response {HANDSHAKE_ACTION} ({})", message.id);
            if let Some(err) = message.error {
                warn!("handshake rejected by peer: {}", err.message);
                return;
            }
            self.store_remote_context(message.data.unwrap_or(Value::Null));
            self.mark_connected();
            return;
        }

        let Some(entry) = self.inner.pending.take(&message.id) else {
            trace!("dropping response {} for unknown or settled request", message.id);
            return;
        };

        debug!("<- response {} ({})", entry.action, message.id);
        let result = match message.error {
            Some(err) => Err(RpcError::Remote {
                action: entry.action.clone(),
                message: err.message,
                code: err.code,
            }),
            None => Ok(message.data.unwrap_or(Value::Null)),
        };
        entry.complete(result);
    }

    fn on_event(&self, message: Message) {
        let Some(action) = message.action else {
            return;
        };
        let Some(handler) = self.inner.handlers.get(&action) else {
            trace!("no handler for event {action}");
            return;
        };

        debug!("<- event {action}");
        let data = message.data.unwrap_or(Value::Null);
        tokio::spawn(async move {
            match tokio::spawn(handler.call(data)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("handler for event {action} failed: {e}"),
                Err(_) => warn!("handler for event {action} panicked"),
            }
        });
    }

    fn answer_handshake(&self, id: String, remote_context: Value) {
        self.store_remote_context(remote_context);
        let reply = Message::response(id, self.inner.local_context.clone())
            .for_action(Some(HANDSHAKE_ACTION));
        debug!("-> response {HANDSHAKE_ACTION} ({})", reply.id);
        match self.post(&reply) {
            Ok(()) => self.mark_connected(),
            Err(e) => warn!("could not answer handshake: {e}"),
        }
    }

    fn store_remote_context(&self, context: Value) {
        if context.is_null() {
            return;
        }
        if self.inner.remote_context.set(context).is_err() {
            trace!("remote context already received; keeping the first one");
        }
    }

    fn mark_connected(&self) {
        lock(&self.inner.handshake_ids).clear();
        let changed = self.inner.state.send_if_modified(|s| {
            if *s == ConnectionState::Connected {
                false
            } else {
                *s = ConnectionState::Connected;
                true
            }
        });
        if changed {
            info!("connected to {}", self.inner.trusted_origin);
        }
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Tears the connection down: rejects every pending call with
    /// [`RpcError::ConnectionClosed`], returns to `Disconnected` and stops the
    /// listener.  Later calls fail with `ConnectionClosed`.
    pub fn destroy(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let rejected = self.inner.pending.reject_all();
        lock(&self.inner.handshake_ids).clear();
        self.inner.state.send_replace(ConnectionState::Disconnected);
        if let Some(listener) = lock(&self.inner.listener).take() {
            listener.abort();
        }
        info!(
            "connection to {} destroyed, {rejected} pending call(s) rejected",
            self.inner.trusted_origin
        );
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<(), RpcError> {
        if self.is_destroyed() {
            Err(RpcError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("trusted_origin", &self.inner.trusted_origin)
            .field("state", &self.state())
            .field("pending", &self.inner.pending.len())
            .field("handlers", &self.inner.handlers.names())
            .finish()
    }
}

/// Removes the pending entry when `call` returns or its future is dropped.
struct PendingGuard<'a> {
    pending: &'a PendingRequests,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
