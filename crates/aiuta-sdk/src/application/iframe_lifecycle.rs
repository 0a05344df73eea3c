//! Iframe lifecycle on the host page.
//!
//! The iframe covers the whole viewport from the moment it is created, but it
//! starts inert (`pointer-events: none`) so the page stays usable underneath.
//! The app asks for interactivity when it opens its modal and gives it back
//! when the modal closes.
//!
//! # State machine
//!
//! ```text
//! Absent ──ensure_iframe──▶ Created ──mark_connected──▶ Connected(inert)
//!   ▲                          │                          │    ▲
//!   └──────remove_iframe───────┴──────────────────────────┘    │ set_interactive
//!                                                     Connected(interactive)
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use aiuta_rpc::MessageTarget;
use tracing::{debug, info};

use crate::infrastructure::document::{Document, IframeElement, IframeError};

/// Inline styles of the iframe: fixed, full-viewport, transparent, inert.
pub const IFRAME_STYLE: &[(&str, &str)] = &[
    ("position", "fixed"),
    ("inset", "0"),
    ("width", "100%"),
    ("height", "100%"),
    ("border", "none"),
    ("z-index", "9999"),
    ("background", "transparent"),
    ("pointer-events", "none"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IframeState {
    Absent,
    Created,
    Connected { interactive: bool },
}

/// The iframe's content window, as returned by
/// [`IframeManager::ensure_iframe`].
pub struct EnsuredIframe {
    pub window: Arc<dyn MessageTarget>,
    /// `true` when this call appended the element.
    pub created: bool,
}

/// Owns the single iframe element of the widget.
pub struct IframeManager {
    document: Arc<dyn Document>,
    iframe_id: String,
    src: String,
    state: Mutex<IframeState>,
}

impl IframeManager {
    /// Manages the iframe `iframe_id`, created with `src` when absent.
    pub fn new(document: Arc<dyn Document>, iframe_id: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            document,
            iframe_id: iframe_id.into(),
            src: src.into(),
            state: Mutex::new(IframeState::Absent),
        }
    }

    /// Makes sure the iframe exists and returns its content window.
    ///
    /// An element that already carries the configured id is adopted as-is.
    /// Calling this repeatedly never creates a second element.  The result
    /// says whether a new element was appended: anything bound to the
    /// previous window is stale in that case.
    ///
    /// # Errors
    ///
    /// Propagates [`IframeError`] from the document.
    pub fn ensure_iframe(&self) -> Result<EnsuredIframe, IframeError> {
        let created = {
            let mut state = self.lock_state();
            if self.document.find_iframe(&self.iframe_id).is_some() {
                if *state == IframeState::Absent {
                    debug!("adopting existing iframe #{}", self.iframe_id);
                    *state = IframeState::Created;
                }
                false
            } else {
                let element = IframeElement::new(&self.iframe_id, &self.src).with_style(IFRAME_STYLE);
                self.document.append_iframe(element)?;
                info!("created iframe #{}", self.iframe_id);
                *state = IframeState::Created;
                true
            }
        };
        let window = self.document.content_window(&self.iframe_id)?;
        Ok(EnsuredIframe { window, created })
    }

    /// Records a completed handshake.  The iframe stays inert.
    pub fn mark_connected(&self) {
        let mut state = self.lock_state();
        if *state == IframeState::Created {
            *state = IframeState::Connected { interactive: false };
        }
    }

    /// Lets pointer events reach the iframe (`true`) or pass through to the
    /// page (`false`).
    ///
    /// # Errors
    ///
    /// [`IframeError::NotFound`] if the iframe does not exist.
    pub fn set_interactive(&self, interactive: bool) -> Result<(), IframeError> {
        let value = if interactive { "auto" } else { "none" };
        self.document
            .set_style_property(&self.iframe_id, "pointer-events", value)?;

        let mut state = self.lock_state();
        if let IframeState::Connected { .. } = *state {
            *state = IframeState::Connected { interactive };
        }
        debug!("iframe #{} pointer-events: {value}", self.iframe_id);
        Ok(())
    }

    /// Removes the element and returns to `Absent`.  A missing element is
    /// not an error.
    pub fn remove_iframe(&self) {
        match self.document.remove_iframe(&self.iframe_id) {
            Ok(()) => info!("removed iframe #{}", self.iframe_id),
            Err(e) => debug!("nothing to remove: {e}"),
        }
        *self.lock_state() = IframeState::Absent;
    }

    /// Current `pointer-events` value of the element, if it exists.
    pub fn pointer_events(&self) -> Option<String> {
        self.document
            .find_iframe(&self.iframe_id)
            .and_then(|e| e.style_value("pointer-events").map(str::to_string))
    }

    /// Origin of the document the iframe actually loads, which differs from
    /// the configured one when an existing element was adopted.
    pub fn frame_origin(&self) -> Option<String> {
        self.document
            .find_iframe(&self.iframe_id)
            .and_then(|e| aiuta_rpc::origin_of(&e.src))
    }

    pub fn state(&self) -> IframeState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, IframeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn iframe_id(&self) -> &str {
        &self.iframe_id
    }

    pub fn src(&self) -> &str {
        &self.src
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document::memory::MemoryDocument;

    const PAGE: &str = "https://shop.example/p/1";
    const SRC: &str = "https://static.aiuta.com/sdk/v0/index.html?parentOrigin=x";

    fn manager() -> (IframeManager, Arc<MemoryDocument>) {
        let doc = Arc::new(MemoryDocument::new(PAGE));
        (IframeManager::new(doc.clone(), "aiuta-iframe", SRC), doc)
    }

    #[test]
    fn test_ensure_iframe_creates_styled_element_once() {
        // Arrange
        let (manager, doc) = manager();

        // Act
        let first = manager.ensure_iframe().unwrap();
        let second = manager.ensure_iframe().unwrap();

        // Assert
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(doc.iframe_count(), 1);
        let element = doc.find_iframe("aiuta-iframe").unwrap();
        assert_eq!(element.src, SRC);
        assert_eq!(element.style_value("position"), Some("fixed"));
        assert_eq!(element.style_value("z-index"), Some("9999"));
        assert_eq!(element.style_value("pointer-events"), Some("none"));
        assert_eq!(manager.state(), IframeState::Created);
    }

    #[test]
    fn test_existing_element_is_adopted() {
        let (manager, doc) = manager();
        doc.append_iframe(IframeElement::new("aiuta-iframe", "https://custom.example/app"))
            .unwrap();

        let ensured = manager.ensure_iframe().unwrap();

        assert!(!ensured.created);
        assert_eq!(doc.iframe_count(), 1);
        assert_eq!(doc.find_iframe("aiuta-iframe").unwrap().src, "https://custom.example/app");
        assert_eq!(manager.frame_origin().as_deref(), Some("https://custom.example"));
        assert_eq!(manager.state(), IframeState::Created);
    }

    #[test]
    fn test_interactivity_toggles_pointer_events() {
        let (manager, _doc) = manager();
        manager.ensure_iframe().unwrap();
        manager.mark_connected();
        assert_eq!(manager.state(), IframeState::Connected { interactive: false });

        manager.set_interactive(true).unwrap();
        assert_eq!(manager.pointer_events().as_deref(), Some("auto"));
        assert_eq!(manager.state(), IframeState::Connected { interactive: true });

        manager.set_interactive(false).unwrap();
        assert_eq!(manager.pointer_events().as_deref(), Some("none"));
        assert_eq!(manager.state(), IframeState::Connected { interactive: false });
    }

    #[test]
    fn test_set_interactive_without_iframe_fails() {
        let (manager, _doc) = manager();
        assert!(matches!(manager.set_interactive(true), Err(IframeError::NotFound(_))));
        assert_eq!(manager.state(), IframeState::Absent);
    }

    #[test]
    fn test_mark_connected_before_creation_is_ignored() {
        let (manager, _doc) = manager();
        manager.mark_connected();
        assert_eq!(manager.state(), IframeState::Absent);
    }

    #[test]
    fn test_remove_returns_to_absent_and_allows_recreation() {
        let (manager, doc) = manager();
        manager.ensure_iframe().unwrap();

        manager.remove_iframe();
        assert_eq!(doc.iframe_count(), 0);
        assert_eq!(manager.state(), IframeState::Absent);
        assert!(manager.pointer_events().is_none());

        assert!(manager.ensure_iframe().unwrap().created);
        assert_eq!(doc.iframe_count(), 1);
    }

    #[test]
    fn test_element_removed_by_the_page_is_recreated() {
        // Arrange
        let (manager, doc) = manager();
        manager.ensure_iframe().unwrap();
        manager.mark_connected();

        // Act: the page drops the element behind the manager's back.
        doc.remove_iframe("aiuta-iframe").unwrap();
        let ensured = manager.ensure_iframe().unwrap();

        // Assert
        assert!(ensured.created);
        assert_eq!(doc.iframe_count(), 1);
        assert_eq!(manager.state(), IframeState::Created);
    }
}
