//! The window abstraction messages travel through.
//!
//! In a browser, sending is `otherWindow.postMessage(data, targetOrigin)` and
//! receiving is the `message` event on one's own window, which carries the
//! sender's `origin`, a `source` window reference, and the posted `data`.
//! [`MessageTarget`] and [`MessageEvent`] are those two halves.
//!
//! [`ChannelWindow`] is an in-process implementation backed by a Tokio
//! channel.  It mirrors the browser's delivery rules (a message posted with a
//! `targetOrigin` that does not match the receiving window is silently
//! discarded) and is what the playground binary and the tests run on.

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

/// Identity of a window, standing in for the `event.source` object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// One inbound `message` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// Origin of the document that posted the message, as reported by the browser.
    pub origin: String,
    /// The posting window, when known.
    pub source: Option<WindowId>,
    /// The posted payload.
    pub data: Value,
}

impl MessageEvent {
    pub fn new(origin: impl Into<String>, source: Option<WindowId>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            source,
            data,
        }
    }
}

/// Errors raised when a message cannot be handed to a window.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The target window no longer exists (iframe removed, tab closed).
    #[error("target window {0:?} is closed")]
    WindowClosed(WindowId),
}

/// A window that messages can be posted to.
pub trait MessageTarget: Send + Sync {
    /// Identity of the target window.
    fn window_id(&self) -> WindowId;

    /// Posts `message` to the window.
    ///
    /// `target_origin` is either `"*"` or the origin the receiving document
    /// must have; on mismatch the message is dropped without error, exactly
    /// like the browser does.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::WindowClosed`] if the window is gone.
    fn post_message(&self, message: Value, target_origin: &str) -> Result<(), TransportError>;
}

/// A reference to window *W* as held by window *P*, backed by W's inbox.
///
/// Posting through it delivers a [`MessageEvent`] into W's inbox stamped with
/// P's origin and id.
#[derive(Debug, Clone)]
pub struct ChannelWindow {
    target_id: WindowId,
    target_origin: String,
    poster_id: WindowId,
    poster_origin: String,
    inbox: mpsc::UnboundedSender<MessageEvent>,
}

impl ChannelWindow {
    /// Creates a handle to the window `target_id` (whose document has
    /// `target_origin`) as seen from the window `poster_id`.
    pub fn new(
        target_id: WindowId,
        target_origin: impl Into<String>,
        poster_id: WindowId,
        poster_origin: impl Into<String>,
        inbox: mpsc::UnboundedSender<MessageEvent>,
    ) -> Self {
        Self {
            target_id,
            target_origin: target_origin.into(),
            poster_id,
            poster_origin: poster_origin.into(),
            inbox,
        }
    }

    /// Builds two windows that can talk to each other.
    ///
    /// Returns, for each side, the handle to the *other* window plus this
    /// side's own inbox:
    /// `((host → app handle, host inbox), (app → host handle, app inbox))`.
    #[allow(clippy::type_complexity)]
    pub fn pair(
        host_origin: &str,
        app_origin: &str,
    ) -> (
        (ChannelWindow, mpsc::UnboundedReceiver<MessageEvent>),
        (ChannelWindow, mpsc::UnboundedReceiver<MessageEvent>),
    ) {
        let host_id = WindowId(1);
        let app_id = WindowId(2);
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let (app_tx, app_rx) = mpsc::unbounded_channel();

        let to_app = ChannelWindow::new(app_id, app_origin, host_id, host_origin, app_tx);
        let to_host = ChannelWindow::new(host_id, host_origin, app_id, app_origin, host_tx);
        ((to_app, host_rx), (to_host, app_rx))
    }

    /// Origin of the document in the target window.
    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }
}

impl MessageTarget for ChannelWindow {
    fn window_id(&self) -> WindowId {
        self.target_id
    }

    fn post_message(&self, message: Value, target_origin: &str) -> Result<(), TransportError> {
        if target_origin != "*" && target_origin != self.target_origin {
            trace!(
                "postMessage target origin {target_origin} does not match {}; dropped",
                self.target_origin
            );
            return Ok(());
        }

        let event = MessageEvent::new(self.poster_origin.clone(), Some(self.poster_id), message);
        self.inbox
            .send(event)
            .map_err(|_| TransportError::WindowClosed(self.target_id))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
