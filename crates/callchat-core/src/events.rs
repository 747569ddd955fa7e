use std::sync::Arc;

use crate::session::{SessionKind, SessionState};

/// Events emitted by the core to native UI listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    SessionStateChanged { kind: SessionKind, state: SessionState },
    ActionEnabledChanged { kind: SessionKind, enabled: bool },
    CallViewVisibilityChanged(bool),
    ChatViewVisibilityChanged(bool),
    ChatLoadingChanged(bool),
}

/// Snapshot of everything the UI shell binds to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewState {
    pub call_action_enabled: bool,
    pub chat_action_enabled: bool,
    pub call_view_visible: bool,
    pub chat_view_visible: bool,
    pub chat_loading: bool,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait ClientEventListener: Send + Sync {
    fn on_event(&self, event: ClientEvent);
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<std::sync::RwLock<Vec<Arc<dyn ClientEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn ClientEventListener>) {
        match self.listeners.write() {
            Ok(mut listeners) => listeners.push(listener),
            Err(_) => tracing::error!("listener registry poisoned, listener dropped"),
        }
    }

    pub fn emit(&self, event: ClientEvent) {
        tracing::debug!("emit {event:?}");
        let Ok(listeners) = self.listeners.read() else {
            tracing::error!("listener registry poisoned, event dropped");
            return;
        };
        for listener in listeners.iter() {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
