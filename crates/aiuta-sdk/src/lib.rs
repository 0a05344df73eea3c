//! aiuta-sdk library entry point.
//!
//! Re-exports the public modules so that integration tests in `tests/` and
//! the playground binary share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::aiuta::{Aiuta, AiutaError, EventSink, ProductIds, TracingEventSink, SDK_VERSION};
pub use infrastructure::config::{AiutaConfiguration, AuthConfig, ConfigError};
