use std::fmt;

use tokio::sync::mpsc;

use crate::credentials::Identity;
use crate::errors::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Calling,
    Chat,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Calling => f.write_str("calling"),
            SessionKind::Chat => f.write_str("chat"),
        }
    }
}

/// Lifecycle of one session manager as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    SessionRequested,
    SessionPresented,
}

/// Arguments for [`SessionManager::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub identifier: String,
    pub display_name: String,
    pub token: String,
    /// Service endpoint, only set for the chat manager.
    pub endpoint: Option<String>,
}

impl SessionParams {
    pub fn new(identity: &Identity, endpoint: Option<String>) -> Self {
        Self {
            identifier: identity.identifier.clone(),
            display_name: identity.display_name.clone(),
            token: identity.token.clone(),
            endpoint,
        }
    }
}

/// The remote party a session is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTarget {
    pub identifier: String,
    /// Only used by chat.
    pub display_name: Option<String>,
}

/// Completion events reported by session managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Ready(SessionKind),
    Presented(SessionKind),
    Dismissed(SessionKind),
}

/// Handle a session manager uses to report back to the orchestrator.
///
/// Cloneable and callable from any thread. Events are queued and applied
/// on the orchestrator's own event loop.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    kind: SessionKind,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionSignal {
    pub(crate) fn new(kind: SessionKind, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { kind, tx }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Initialization finished; the user action may be enabled.
    pub fn ready(&self) {
        self.send(SessionEvent::Ready(self.kind));
    }

    /// The requested session is ready to be shown.
    pub fn presented(&self) {
        self.send(SessionEvent::Presented(self.kind));
    }

    /// The session view was withdrawn by the manager.
    pub fn dismissed(&self) {
        self.send(SessionEvent::Dismissed(self.kind));
    }

    /// Initialization failed. Logged only: the action stays disabled.
    pub fn failed(&self, reason: &str) {
        let err = ClientError::SessionInit(reason.to_string());
        tracing::warn!("{} session manager reported: {err}", self.kind);
    }

    fn send(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("orchestrator gone, dropping {event:?}");
        }
    }
}

/// A session manager wrapping the external communication SDK.
///
/// Implementations must not block: both calls are fire-and-forget and
/// completion is reported through the [`SessionSignal`] given at init.
pub trait SessionManager: Send + Sync {
    fn kind(&self) -> SessionKind;
    fn initialize(&self, params: SessionParams, signal: SessionSignal);
    fn start_session(&self, target: SessionTarget);
}

/// Guards the per-manager state machine.
///
/// Each transition returns `false` and leaves the state untouched when it is
/// not valid from the current state.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    kind: SessionKind,
    state: SessionState,
}

impl SessionTracker {
    pub fn new(kind: SessionKind) -> Self {
        Self {
            kind,
            state: SessionState::Uninitialized,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the user may start a session. Not while one is presented:
    /// the session view covers the action until it is dismissed.
    pub fn is_action_enabled(&self) -> bool {
        matches!(self.state, SessionState::Ready | SessionState::SessionRequested)
    }

    pub fn begin_initialize(&mut self) -> bool {
        self.transition(SessionState::Initializing, |s| s == SessionState::Uninitialized)
    }

    pub fn mark_ready(&mut self) -> bool {
        self.transition(SessionState::Ready, |s| s == SessionState::Initializing)
    }

    /// Repeated requests before presentation are allowed; the manager
    /// decides what a second request means.
    pub fn request_session(&mut self) -> bool {
        if !self.is_action_enabled() {
            return false;
        }
        self.state = SessionState::SessionRequested;
        true
    }

    // Ready is accepted too: a manager may present a session it was not
    // asked for (incoming call).
    pub fn mark_presented(&mut self) -> bool {
        self.transition(SessionState::SessionPresented, |s| {
            matches!(s, SessionState::Ready | SessionState::SessionRequested)
        })
    }

    pub fn mark_dismissed(&mut self) -> bool {
        self.transition(SessionState::Ready, |s| s == SessionState::SessionPresented)
    }

    fn transition(&mut self, to: SessionState, allowed: impl Fn(SessionState) -> bool) -> bool {
        if allowed(self.state) {
            self.state = to;
            true
        } else {
            false
        }
    }
}
