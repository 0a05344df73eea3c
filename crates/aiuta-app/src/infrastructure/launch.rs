//! Launch parameters carried by the iframe URL.

use thiserror::Error;
use url::Url;

/// Query parameter carrying the host page origin.
pub const PARENT_ORIGIN_PARAM: &str = "parentOrigin";
/// Query parameter carrying the absolute custom stylesheet URL.
pub const CUSTOM_CSS_PARAM: &str = "customCssUrl";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaunchError {
    #[error("iframe URL {0:?} is not absolute")]
    InvalidUrl(String),
}

/// What the host told the app through the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    /// Origin the host claims to have.  Only a hint: the browser-provided
    /// ancestor origin wins when available.
    pub parent_origin: Option<String>,
    /// Stylesheet to apply on top of the default theme.
    pub custom_css_url: Option<String>,
}

impl LaunchParams {
    /// Reads the parameters from the iframe's `location.href`.
    ///
    /// Blank values count as absent.  When a parameter repeats, the first
    /// occurrence wins.
    ///
    /// # Errors
    ///
    /// [`LaunchError::InvalidUrl`] if `href` cannot be parsed.
    pub fn from_href(href: &str) -> Result<Self, LaunchError> {
        let url = Url::parse(href).map_err(|_| LaunchError::InvalidUrl(href.to_string()))?;

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            if value.trim().is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                PARENT_ORIGIN_PARAM => &mut params.parent_origin,
                CUSTOM_CSS_PARAM => &mut params.custom_css_url,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        Ok(params)
    }
}
