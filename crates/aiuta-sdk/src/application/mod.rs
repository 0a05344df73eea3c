//! Use cases of the host SDK.
//!
//! Nothing in here touches a real DOM: the page is reached through the
//! [`Document`](crate::infrastructure::document::Document) trait and the
//! iframe through [`aiuta_rpc::MessageTarget`].
//!
//! # Sub-modules
//!
//! - **`aiuta`**            – The `Aiuta` facade: `try_on`, the handlers the
//!   page exposes to the app, and teardown.
//!
//! - **`app_url`**          – Builds the iframe `src` with the `parentOrigin`
//!   and `customCssUrl` query parameters.
//!
//! - **`iframe_lifecycle`** – Creates, adopts, restyles and removes the single
//!   iframe element.

pub mod aiuta;
pub mod app_url;
pub mod iframe_lifecycle;
