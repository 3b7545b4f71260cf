//! Event dispatcher
//!
//! A registry mapping an event name to an ordered list of listeners, used to
//! decouple tree mutations from side-effecting observers. Dispatch is
//! synchronous on the calling thread, in registration order; there is no
//! isolation between listeners, so the first failing listener aborts the
//! remaining ones and its error reaches the dispatch call site.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ListenerError;

/// Payload handed to listeners.
#[derive(Debug, Clone)]
pub struct FsEvent {
    /// Absolute path the event concerns
    pub path: String,
    /// Free-form detail, event-specific
    pub detail: serde_json::Value,
}

impl FsEvent {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            detail: serde_json::Value::Null,
        }
    }

    pub fn with_detail(path: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            detail,
        }
    }
}

/// A listener bound to one event name.
pub trait EventListener: Send + Sync {
    /// The event name this listener is registered for
    fn event_name(&self) -> &str;

    fn handle(&self, event: &FsEvent) -> Result<(), ListenerError>;
}

/// Registry of listeners keyed by event name.
pub struct EventDispatcher {
    listeners: HashMap<String, Vec<Box<dyn EventListener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    /// Register a listener under its own event name, after any listener
    /// registered earlier for the same name.
    pub fn register(&mut self, listener: Box<dyn EventListener>) {
        let name = listener.event_name().to_string();
        debug!(event = %name, "registered event listener");
        self.listeners.entry(name).or_default().push(listener);
    }

    /// Invoke every listener for `name` in registration order.
    ///
    /// Dispatching an unregistered name is a no-op. A listener error aborts
    /// the remaining listeners and propagates to the caller.
    pub fn dispatch(&self, name: &str, event: &FsEvent) -> Result<(), ListenerError> {
        let Some(listeners) = self.listeners.get(name) else {
            return Ok(());
        };
        debug!(event = %name, path = %event.path, "dispatching event");
        for listener in listeners {
            listener.handle(event)?;
        }
        Ok(())
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
