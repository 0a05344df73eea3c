//! Named handlers the remote side can invoke.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::error::HandlerError;

/// What a handler resolves to: the response `data`, or a failure that is
/// sent back as an error response.
pub type HandlerResult = Result<Value, HandlerError>;

/// Boxed future returned by a [`Handler`].
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A handler for one action name.
///
/// Implemented for every `Fn(Value) -> impl Future<Output = HandlerResult>`
/// closure, so registration normally looks like:
///
/// ```rust
/// use aiuta_rpc::rpc::registry::HandlerRegistry;
/// use serde_json::json;
///
/// let registry = HandlerRegistry::new();
/// registry.register("sdk.trackEvent", |_data| async move { Ok(json!(null)) });
/// assert!(registry.contains("sdk.trackEvent"));
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler on the request's `data` (the positional argument array).
    fn call(&self, data: Value) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, data: Value) -> BoxFuture<HandlerResult> {
        Box::pin(self(data))
    }
}

/// Map of action name to handler, shared between the registering code and
/// the dispatch loop.
///
/// At most one handler exists per name; registering again replaces it.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<String, Arc<dyn Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `name`.  Returns `true` if an earlier handler
    /// was replaced.
    pub fn register<F, Fut>(&self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(name.into(), Arc::new(handler))
    }

    /// Registers an already type-erased handler.
    pub fn insert(&self, name: String, handler: Arc<dyn Handler>) -> bool {
        self.lock().insert(name, handler).is_some()
    }

    /// Removes the handler for `name`.  Returns `true` if one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }

    /// Returns a clone of the handler for `name`.
    ///
    /// The lock is released before the caller awaits the handler.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn Handler>>> {
        // A handler never runs while the lock is held, so a poisoned lock
        // still guards a consistent map.
        self.handlers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_registered_handler_is_invoked_with_data() {
        // Arrange
        let registry = HandlerRegistry::new();
        registry.register("echo", |data: Value| async move { Ok(data) });

        // Act
        let handler = registry.get("echo").expect("handler must be registered");
        let result = handler.call(json!([1, 2])).await.unwrap();

        // Assert
        assert_eq!(result, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_register_replaces_existing_handler() {
        let registry = HandlerRegistry::new();
        assert!(!registry.register("a", |_| async { Ok(json!("first")) }));
        assert!(registry.register("a", |_| async { Ok(json!("second")) }));

        let result = registry.get("a").unwrap().call(Value::Null).await.unwrap();
        assert_eq!(result, json!("second"));
        assert_eq!(registry.names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_unregister_removes_handler() {
        let registry = HandlerRegistry::new();
        registry.register("a", |_| async { Ok(Value::Null) });

        assert!(registry.unregister("a"));
        assert!(!registry.unregister("a"));
        assert!(registry.get("a").is_none());
    }

    #[tokio::test]
    async fn test_handler_error_is_returned() {
        let registry = HandlerRegistry::new();
        registry.register("fail", |_| async { Err(HandlerError::from("nope")) });

        let err = registry.get("fail").unwrap().call(Value::Null).await.unwrap_err();
        assert_eq!(err.message, "nope");
    }

    #[test]
    fn test_names_are_sorted() {
        let registry = HandlerRegistry::new();
        registry.register("sdk.trackEvent", |_| async { Ok(Value::Null) });
        registry.register("app.tryOn", |_| async { Ok(Value::Null) });
        assert_eq!(registry.names(), vec!["app.tryOn", "sdk.trackEvent"]);
    }
}
