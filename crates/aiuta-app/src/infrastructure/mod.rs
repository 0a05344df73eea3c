//! Infrastructure for the iframe app.
//!
//! # Sub-modules
//!
//! - **`launch`** – Parses the iframe URL for the parameters the host SDK
//!   appended to it.

pub mod launch;
