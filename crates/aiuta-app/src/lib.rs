//! aiuta-app library entry point.
//!
//! The try-on app runs inside the iframe.  This crate holds the pieces it
//! needs to reach the host page: reading its launch parameters, picking the
//! origin to trust, and serving `app.tryOn`.

pub mod application;
pub mod infrastructure;

pub use application::bootstrap::{AppBootstrap, BootstrapError, APP_VERSION};
pub use application::try_on::TryOnHandler;
pub use infrastructure::launch::{LaunchError, LaunchParams};
