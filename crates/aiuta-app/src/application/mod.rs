//! Use cases of the iframe app.
//!
//! # Sub-modules
//!
//! - **`bootstrap`** – Resolves the trusted origin, opens the connection to
//!   the host and registers the `app.*` handlers.
//!
//! - **`try_on`**    – The [`TryOnHandler`](try_on::TryOnHandler) trait the
//!   app implements to serve `app.tryOn`.

pub mod bootstrap;
pub mod try_on;
