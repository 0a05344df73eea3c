//! In-memory [`Document`] for tests and the playground.
//!
//! Every appended iframe gets a browsing context backed by
//! [`ChannelWindow`]s: messages the host posts to `content_window()` land in
//! the frame's inbox, and [`MemoryDocument::attach_frame`] hands the other end
//! to whoever plays the iframe document.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use aiuta_rpc::{origin_of, ChannelWindow, MessageEvent, MessageTarget, WindowId};
use tokio::sync::mpsc;

use super::{Document, IframeElement, IframeError};

/// Window id of the page itself; frames are numbered from 2.
pub const PAGE_WINDOW: WindowId = WindowId(1);

/// The iframe side of an attached frame.
#[derive(Debug)]
pub struct FrameEnd {
    /// `location.href` of the frame document.
    pub href: String,
    /// Origin of the frame document.
    pub origin: String,
    /// `window.parent`, stamped with the frame's origin.
    pub parent: ChannelWindow,
    /// `message` events delivered to the frame.
    pub inbox: mpsc::UnboundedReceiver<MessageEvent>,
}

struct Frame {
    element: IframeElement,
    window: ChannelWindow,
    /// Taken by `attach_frame`.
    inbox: Option<mpsc::UnboundedReceiver<MessageEvent>>,
    origin: String,
    window_id: WindowId,
}

/// A page with a body that can hold iframes.
pub struct MemoryDocument {
    origin: String,
    page_tx: mpsc::UnboundedSender<MessageEvent>,
    page_rx: Mutex<Option<mpsc::UnboundedReceiver<MessageEvent>>>,
    frames: Mutex<BTreeMap<String, Frame>>,
    next_window: AtomicU64,
}

impl MemoryDocument {
    /// A document loaded from `page_url`.
    pub fn new(page_url: &str) -> Self {
        let (page_tx, page_rx) = mpsc::unbounded_channel();
        Self {
            origin: origin_of(page_url).unwrap_or_else(|| "null".to_string()),
            page_tx,
            page_rx: Mutex::new(Some(page_rx)),
            frames: Mutex::new(BTreeMap::new()),
            next_window: AtomicU64::new(PAGE_WINDOW.0 + 1),
        }
    }

    /// Origin of the page document.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of iframes currently attached.
    pub fn iframe_count(&self) -> usize {
        self.frames().len()
    }

    /// Hands out the iframe document's view of the frame `id`: its parent
    /// window and its inbox.  Each frame can be attached once.
    ///
    /// # Errors
    ///
    /// [`IframeError::NotFound`], or [`IframeError::ListenerTaken`] on a
    /// second attach.
    pub fn attach_frame(&self, id: &str) -> Result<FrameEnd, IframeError> {
        let mut frames = self.frames();
        let frame = frames
            .get_mut(id)
            .ok_or_else(|| IframeError::NotFound(id.to_string()))?;
        let inbox = frame.inbox.take().ok_or(IframeError::ListenerTaken)?;

        let parent = ChannelWindow::new(
            PAGE_WINDOW,
            self.origin.clone(),
            frame.window_id,
            frame.origin.clone(),
            self.page_tx.clone(),
        );
        Ok(FrameEnd {
            href: frame.element.src.clone(),
            origin: frame.origin.clone(),
            parent,
            inbox,
        })
    }

    /// Posts into the page window as if sent by `origin`, from no known window.
    pub fn deliver(&self, origin: &str, data: serde_json::Value) {
        let _ = self.page_tx.send(MessageEvent::new(origin, None, data));
    }

    fn frames(&self) -> MutexGuard<'_, BTreeMap<String, Frame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Document for MemoryDocument {
    fn find_iframe(&self, id: &str) -> Option<IframeElement> {
        self.frames().get(id).map(|f| f.element.clone())
    }

    fn append_iframe(&self, element: IframeElement) -> Result<(), IframeError> {
        let mut frames = self.frames();
        if frames.contains_key(&element.id) {
            return Err(IframeError::AlreadyExists(element.id));
        }

        let window_id = WindowId(self.next_window.fetch_add(1, Ordering::Relaxed));
        let origin = origin_of(&element.src).unwrap_or_else(|| "null".to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        let window = ChannelWindow::new(window_id, origin.clone(), PAGE_WINDOW, self.origin.clone(), tx);

        frames.insert(
            element.id.clone(),
            Frame {
                element,
                window,
                inbox: Some(rx),
                origin,
                window_id,
            },
        );
        Ok(())
    }

    fn set_style_property(&self, id: &str, property: &str, value: &str) -> Result<(), IframeError> {
        let mut frames = self.frames();
        let frame = frames
            .get_mut(id)
            .ok_or_else(|| IframeError::NotFound(id.to_string()))?;
        frame
            .element
            .style
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    fn remove_iframe(&self, id: &str) -> Result<(), IframeError> {
        self.frames()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| IframeError::NotFound(id.to_string()))
    }

    fn content_window(&self, id: &str) -> Result<Arc<dyn MessageTarget>, IframeError> {
        let frames = self.frames();
        let frame = frames
            .get(id)
            .ok_or_else(|| IframeError::NotFound(id.to_string()))?;
        Ok(Arc::new(frame.window.clone()))
    }

    fn message_events(&self) -> Result<mpsc::UnboundedReceiver<MessageEvent>, IframeError> {
        self.page_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or(IframeError::ListenerTaken)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = "https://shop.example/product/42";
    const APP: &str = "https://static.aiuta.com/sdk/v0/index.html";

    #[test]
    fn test_append_then_find() {
        let doc = MemoryDocument::new(PAGE);
        doc.append_iframe(IframeElement::new("f", APP)).unwrap();

        assert_eq!(doc.find_iframe("f").unwrap().src, APP);
        assert_eq!(doc.iframe_count(), 1);
        assert!(doc.find_iframe("other").is_none());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let doc = MemoryDocument::new(PAGE);
        doc.append_iframe(IframeElement::new("f", APP)).unwrap();

        let err = doc.append_iframe(IframeElement::new("f", APP)).unwrap_err();

        assert_eq!(err, IframeError::AlreadyExists("f".to_string()));
    }

    #[test]
    fn test_content_window_delivers_to_attached_frame() {
        // Arrange
        let doc = MemoryDocument::new(PAGE);
        doc.append_iframe(IframeElement::new("f", APP)).unwrap();
        let mut frame = doc.attach_frame("f").unwrap();

        // Act
        doc.content_window("f")
            .unwrap()
            .post_message(json!({"ping": 1}), "https://static.aiuta.com")
            .unwrap();

        // Assert
        let event = frame.inbox.try_recv().unwrap();
        assert_eq!(event.origin, "https://shop.example");
        assert_eq!(event.source, Some(PAGE_WINDOW));
        assert_eq!(frame.origin, "https://static.aiuta.com");
    }

    #[test]
    fn test_frame_posts_reach_page_events_stamped_with_frame_origin() {
        let doc = MemoryDocument::new(PAGE);
        doc.append_iframe(IframeElement::new("f", APP)).unwrap();
        let frame = doc.attach_frame("f").unwrap();
        let mut events = doc.message_events().unwrap();

        frame
            .parent
            .post_message(json!("hi"), "https://shop.example")
            .unwrap();

        let event = events.try_recv().unwrap();
        assert_eq!(event.origin, "https://static.aiuta.com");
        assert_eq!(event.source, Some(WindowId(2)));
    }

    #[test]
    fn test_message_events_and_attach_are_single_use() {
        let doc = MemoryDocument::new(PAGE);
        doc.append_iframe(IframeElement::new("f", APP)).unwrap();

        assert!(doc.message_events().is_ok());
        assert_eq!(doc.message_events().unwrap_err(), IframeError::ListenerTaken);
        assert!(doc.attach_frame("f").is_ok());
        assert_eq!(doc.attach_frame("f").unwrap_err(), IframeError::ListenerTaken);
    }

    #[test]
    fn test_style_and_remove_on_missing_element_fail() {
        let doc = MemoryDocument::new(PAGE);
        assert!(matches!(
            doc.set_style_property("f", "pointer-events", "auto"),
            Err(IframeError::NotFound(_))
        ));
        assert!(matches!(doc.remove_iframe("f"), Err(IframeError::NotFound(_))));
    }
}
