//! Construction of the iframe `src`.
//!
//! The app needs two pieces of information before it can talk to the page:
//! which origin to trust (`parentOrigin`) and, optionally, which stylesheet
//! to load (`customCssUrl`).  Both travel as query parameters so they are
//! available before the handshake.

use aiuta_rpc::PageEnvironment;
use thiserror::Error;
use url::Url;

/// Query parameter carrying the host page origin.
pub const PARENT_ORIGIN_PARAM: &str = "parentOrigin";
/// Query parameter carrying the absolute custom stylesheet URL.
pub const CUSTOM_CSS_PARAM: &str = "customCssUrl";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppUrlError {
    /// `location.href` is not an absolute URL.
    #[error("page URL {0:?} is not absolute")]
    InvalidPageUrl(String),

    /// The page has an opaque origin (`about:blank`, `data:`), so there is
    /// nothing the iframe could trust.
    #[error("page at {0:?} has an opaque origin")]
    OpaqueOrigin(String),

    #[error("app URL {0:?} cannot be resolved")]
    InvalidAppUrl(String),

    #[error("custom CSS URL {0:?} cannot be resolved")]
    InvalidCssUrl(String),
}

/// Builds the iframe URL for `app_url` embedded in `page`.
///
/// - A relative `app_url` resolves against the page origin.
/// - `custom_css_url` is made absolute: absolute URLs are kept, root-relative
///   ones resolve against the page origin, others against the page URL.
///
/// ```rust
/// use aiuta_rpc::PageEnvironment;
/// use aiuta_sdk::application::app_url::build_app_url;
///
/// let page = PageEnvironment::new("https://shop.example/p/42");
/// let src = build_app_url("https://static.aiuta.com/sdk/v0/index.html", &page, None).unwrap();
/// assert_eq!(
///     src,
///     "https://static.aiuta.com/sdk/v0/index.html?parentOrigin=https%3A%2F%2Fshop.example"
/// );
/// ```
///
/// # Errors
///
/// See [`AppUrlError`].
pub fn build_app_url(
    app_url: &str,
    page: &PageEnvironment,
    custom_css_url: Option<&str>,
) -> Result<String, AppUrlError> {
    let page_url =
        Url::parse(&page.href).map_err(|_| AppUrlError::InvalidPageUrl(page.href.clone()))?;
    let origin = page_url.origin();
    if !origin.is_tuple() {
        return Err(AppUrlError::OpaqueOrigin(page.href.clone()));
    }
    let origin = origin.ascii_serialization();

    let origin_url =
        Url::parse(&origin).map_err(|_| AppUrlError::InvalidPageUrl(page.href.clone()))?;
    let mut src = origin_url
        .join(app_url)
        .map_err(|_| AppUrlError::InvalidAppUrl(app_url.to_string()))?;

    let css = custom_css_url
        .filter(|css| !css.trim().is_empty())
        .map(|css| {
            page_url
                .join(css)
                .map_err(|_| AppUrlError::InvalidCssUrl(css.to_string()))
        })
        .transpose()?;

    {
        let mut query = src.query_pairs_mut();
        query.append_pair(PARENT_ORIGIN_PARAM, &origin);
        if let Some(css) = &css {
            query.append_pair(CUSTOM_CSS_PARAM, css.as_str());
        }
    }
    Ok(src.to_string())
}
