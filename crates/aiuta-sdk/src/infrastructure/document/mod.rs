//! The slice of the host page DOM the SDK touches.
//!
//! The SDK only ever looks up, appends, restyles and removes one `<iframe>`,
//! then posts messages to that iframe's content window and listens for
//! `message` events on its own window.  [`Document`] captures exactly that,
//! so the lifecycle logic can run against [`memory::MemoryDocument`] in tests
//! and in the playground binary.

use std::collections::BTreeMap;
use std::sync::Arc;

use aiuta_rpc::{MessageEvent, MessageTarget};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;

/// Errors raised by [`Document`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IframeError {
    /// No element with this id is attached to the document.
    #[error("no iframe with id {0:?} in the document")]
    NotFound(String),

    /// An element with this id is already attached.
    #[error("an element with id {0:?} already exists")]
    AlreadyExists(String),

    /// The iframe exists but has no browsing context yet.
    #[error("iframe {0:?} has no content window")]
    NoContentWindow(String),

    /// The window `message` event stream was already taken.
    #[error("message events of this window are already being consumed")]
    ListenerTaken,
}

/// The attributes of an `<iframe>` element the SDK reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IframeElement {
    pub id: String,
    pub src: String,
    /// Inline style, property → value.
    pub style: BTreeMap<String, String>,
}

impl IframeElement {
    pub fn new(id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            src: src.into(),
            style: BTreeMap::new(),
        }
    }

    /// Sets every `(property, value)` pair in `declarations`.
    pub fn with_style(mut self, declarations: &[(&str, &str)]) -> Self {
        for (property, value) in declarations {
            self.style.insert((*property).to_string(), (*value).to_string());
        }
        self
    }

    pub fn style_value(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    /// The inline style serialized as a `style` attribute value.
    pub fn css_text(&self) -> String {
        self.style
            .iter()
            .map(|(property, value)| format!("{property}: {value};"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// DOM operations used by the host SDK.
pub trait Document: Send + Sync {
    /// `document.getElementById(id)`, restricted to iframes.
    fn find_iframe(&self, id: &str) -> Option<IframeElement>;

    /// Creates the element and appends it to `document.body`.
    ///
    /// # Errors
    ///
    /// [`IframeError::AlreadyExists`] if an element with the same id exists.
    fn append_iframe(&self, element: IframeElement) -> Result<(), IframeError>;

    /// `element.style.setProperty(property, value)`.
    ///
    /// # Errors
    ///
    /// [`IframeError::NotFound`] if the element is not attached.
    fn set_style_property(&self, id: &str, property: &str, value: &str) -> Result<(), IframeError>;

    /// `element.remove()`.
    ///
    /// # Errors
    ///
    /// [`IframeError::NotFound`] if the element is not attached.
    fn remove_iframe(&self, id: &str) -> Result<(), IframeError>;

    /// `element.contentWindow`.
    ///
    /// # Errors
    ///
    /// [`IframeError::NotFound`] or [`IframeError::NoContentWindow`].
    fn content_window(&self, id: &str) -> Result<Arc<dyn MessageTarget>, IframeError>;

    /// `window.addEventListener("message", ...)` for the page's own window.
    ///
    /// # Errors
    ///
    /// [`IframeError::ListenerTaken`] if the stream was handed out already.
    fn message_events(&self) -> Result<mpsc::UnboundedReceiver<MessageEvent>, IframeError>;
}
