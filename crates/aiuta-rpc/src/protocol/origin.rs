//! Trusted-origin resolution.
//!
//! Each end of the channel treats exactly one origin as authoritative.
//! Inbound `message` events from any other origin are ignored, and outbound
//! `postMessage` calls name that origin as the target so the browser refuses
//! delivery if the other window has navigated somewhere else.
//!
//! # Resolution order (iframe side)
//!
//! 1. `location.ancestorOrigins[0]` – set by the browser, cannot be forged by
//!    page content.  Not available in every browser.
//! 2. The `parentOrigin` query parameter the host SDK appends to the iframe URL.
//! 3. The origin of `document.referrer`.
//! 4. The page's own origin, as a last resort (same-origin embedding).
//!
//! Opaque origins (`"null"`, `about:blank`, `data:` URLs) are skipped at every
//! step: trusting `"null"` would accept messages from any sandboxed frame.

use url::Url;

/// The parts of `window.location` / `document` that origin resolution reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageEnvironment {
    /// `location.href` of the current document.
    pub href: String,
    /// `location.ancestorOrigins`, nearest ancestor first.
    pub ancestor_origins: Vec<String>,
    /// `document.referrer`, when non-empty.
    pub referrer: Option<String>,
    /// Origin hint passed through the iframe URL by the host.
    pub parent_origin_hint: Option<String>,
}

impl PageEnvironment {
    /// Creates an environment for a document loaded from `href`.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            ..Self::default()
        }
    }

    pub fn with_ancestor_origins(mut self, origins: Vec<String>) -> Self {
        self.ancestor_origins = origins;
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_parent_origin_hint(mut self, origin: impl Into<String>) -> Self {
        self.parent_origin_hint = Some(origin.into());
        self
    }

    /// The document's own origin, or `"null"` when it is opaque.
    pub fn own_origin(&self) -> String {
        origin_of(&self.href).unwrap_or_else(|| "null".to_string())
    }
}

/// Returns the serialized origin (`scheme://host[:port]`) of an absolute URL.
///
/// Returns `None` for relative URLs and for URLs with an opaque origin.
///
/// ```rust
/// use aiuta_rpc::origin_of;
///
/// assert_eq!(origin_of("https://shop.example/p/1?x=2").as_deref(), Some("https://shop.example"));
/// assert_eq!(origin_of("http://localhost:3000/").as_deref(), Some("http://localhost:3000"));
/// assert_eq!(origin_of("about:blank"), None);
/// ```
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

/// Resolves the single origin this document should trust as its peer.
pub fn resolve_trusted_origin(env: &PageEnvironment) -> String {
    env.ancestor_origins
        .first()
        .and_then(|o| origin_of(o))
        .or_else(|| env.parent_origin_hint.as_deref().and_then(origin_of))
        .or_else(|| {
            env.referrer
                .as_deref()
                .filter(|r| !r.is_empty())
                .and_then(origin_of)
        })
        .unwrap_or_else(|| env.own_origin())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const APP: &str = "https://static.aiuta.com/sdk/v0/index.html";

    #[test]
    fn test_prefers_first_ancestor_origin() {
        // Arrange
        let env = PageEnvironment::new(APP)
            .with_ancestor_origins(vec![
                "https://shop.example".to_string(),
                "https://outer.example".to_string(),
            ])
            .with_referrer("https://other.example/page");

        // Act
        let origin = resolve_trusted_origin(&env);

        // Assert
        assert_eq!(origin, "https://shop.example");
    }

    #[test]
    fn test_uses_parent_hint_when_ancestors_unavailable() {
        let env = PageEnvironment::new(APP)
            .with_parent_origin_hint("https://shop.example")
            .with_referrer("https://referrer.example/x");
        assert_eq!(resolve_trusted_origin(&env), "https://shop.example");
    }

    #[test]
    fn test_falls_back_to_referrer_origin() {
        let env = PageEnvironment::new(APP).with_referrer("https://shop.example:8443/cart?step=2");
        assert_eq!(resolve_trusted_origin(&env), "https://shop.example:8443");
    }

    #[test]
    fn test_falls_back_to_own_origin() {
        let env = PageEnvironment::new(APP);
        assert_eq!(resolve_trusted_origin(&env), "https://static.aiuta.com");
    }

    #[test]
    fn test_skips_opaque_ancestor_and_empty_referrer() {
        let env = PageEnvironment::new(APP)
            .with_ancestor_origins(vec!["null".to_string()])
            .with_referrer("");
        assert_eq!(resolve_trusted_origin(&env), "https://static.aiuta.com");
    }

    #[test]
    fn test_own_origin_of_opaque_document_is_null() {
        assert_eq!(PageEnvironment::new("about:blank").own_origin(), "null");
    }

    #[test]
    fn test_origin_of_drops_default_port() {
        assert_eq!(origin_of("https://shop.example:443/a").as_deref(), Some("https://shop.example"));
    }

    #[test]
    fn test_origin_of_relative_url_is_none() {
        assert_eq!(origin_of("/sdk/index.html"), None);
    }
}
