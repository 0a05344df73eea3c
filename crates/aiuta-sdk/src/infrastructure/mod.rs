//! Infrastructure for the host SDK.
//!
//! # Sub-modules
//!
//! - **`config`**   – The embedding configuration: serde schema, defaults and
//!   loading from JSON or TOML.
//!
//! - **`document`** – The [`Document`](document::Document) trait over the few
//!   DOM operations the SDK needs, plus an in-memory implementation.

pub mod config;
pub mod document;
