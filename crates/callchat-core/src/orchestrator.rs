use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::credentials::{CredentialFetcher, CredentialSource, Identity};
use crate::errors::ClientError;
use crate::events::{ClientEvent, ClientEventListener, EventEmitter, ViewState};
use crate::session::{
    SessionEvent, SessionKind, SessionManager, SessionParams, SessionSignal, SessionState,
    SessionTarget, SessionTracker,
};
use crate::store::KeyValueStore;

struct FlowState {
    calling: SessionTracker,
    chat: SessionTracker,
    view: ViewState,
}

impl FlowState {
    fn tracker_mut(&mut self, kind: SessionKind) -> &mut SessionTracker {
        match kind {
            SessionKind::Calling => &mut self.calling,
            SessionKind::Chat => &mut self.chat,
        }
    }
}

/// Drives the bootstrap flow: credentials first, then both session
/// managers, then UI state from their signals.
///
/// Manager signals are queued on a channel and applied only by
/// [`Orchestrator::process_pending`] or [`Orchestrator::run`], so all state
/// changes happen on one context regardless of which thread signalled.
pub struct Orchestrator {
    config: ClientConfig,
    fetcher: CredentialFetcher,
    calling: Arc<dyn SessionManager>,
    chat: Arc<dyn SessionManager>,
    state: Mutex<FlowState>,
    emitter: EventEmitter,
    signal_tx: mpsc::UnboundedSender<SessionEvent>,
    signal_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<SessionEvent>>,
}

impl Orchestrator {
    pub fn new(
        config: ClientConfig,
        source: Arc<dyn CredentialSource>,
        store: Arc<dyn KeyValueStore>,
        calling: Arc<dyn SessionManager>,
        chat: Arc<dyn SessionManager>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        if calling.kind() != SessionKind::Calling || chat.kind() != SessionKind::Chat {
            return Err(ClientError::Config(format!(
                "session managers wired in the wrong slots: calling={}, chat={}",
                calling.kind(),
                chat.kind()
            )));
        }

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            fetcher: CredentialFetcher::new(source, store),
            calling,
            chat,
            state: Mutex::new(FlowState {
                calling: SessionTracker::new(SessionKind::Calling),
                chat: SessionTracker::new(SessionKind::Chat),
                view: ViewState::default(),
            }),
            emitter: EventEmitter::new(),
            signal_tx,
            signal_rx: tokio::sync::Mutex::new(signal_rx),
        })
    }

    /// Register a listener for view and session state changes.
    pub fn add_listener(&self, listener: Arc<dyn ClientEventListener>) {
        self.emitter.add_listener(listener);
    }

    pub fn view_state(&self) -> ViewState {
        self.lock_state().view
    }

    pub fn session_state(&self, kind: SessionKind) -> SessionState {
        self.lock_state().tracker_mut(kind).state()
    }

    /// Fetch credentials and hand the identity to both managers.
    ///
    /// Any fetch failure is logged and the flow halts with both actions
    /// disabled; the error is returned only for the caller's inspection.
    /// Not guarded against repeated calls: each call fetches again, but a
    /// manager is only ever initialized once.
    pub async fn activate(&self) -> Result<Identity, ClientError> {
        tracing::info!("activating, credential domain {}", self.config.domain);

        let identity = match self.fetcher.fetch_identity(&self.config).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!("error fetching credentials: {e}");
                return Err(e);
            }
        };

        self.initialize_manager(&self.calling, SessionParams::new(&identity, None));
        self.initialize_manager(
            &self.chat,
            SessionParams::new(&identity, Some(self.config.chat_endpoint.clone())),
        );

        Ok(identity)
    }

    /// Ask the calling manager to call the configured callee.
    pub fn start_call(&self) -> Result<(), ClientError> {
        self.update(|state, events| {
            if !state.calling.request_session() {
                return Err(ClientError::ActionDisabled(SessionKind::Calling));
            }
            events.push(state_changed(&state.calling));
            Ok(())
        })?;

        tracing::info!("starting call with {}", self.config.callee);
        self.calling.start_session(SessionTarget {
            identifier: self.config.callee.clone(),
            display_name: None,
        });
        Ok(())
    }

    /// Show the loading indicator and ask the chat manager to open a thread
    /// with the configured callee. The indicator stays until the chat
    /// manager reports the thread as presented.
    pub fn start_chat(&self) -> Result<(), ClientError> {
        self.update(|state, events| {
            if !state.chat.request_session() {
                return Err(ClientError::ActionDisabled(SessionKind::Chat));
            }
            if !state.view.chat_loading {
                state.view.chat_loading = true;
                events.push(ClientEvent::ChatLoadingChanged(true));
            }
            events.push(state_changed(&state.chat));
            Ok(())
        })?;

        tracing::info!("starting chat with {}", self.config.callee);
        self.chat.start_session(SessionTarget {
            identifier: self.config.callee.clone(),
            display_name: Some(self.config.callee_name.clone()),
        });
        Ok(())
    }

    /// Apply every queued manager signal. Returns how many were applied.
    ///
    /// Returns 0 without touching the queue while [`Orchestrator::run`] owns it.
    pub fn process_pending(&self) -> usize {
        let Ok(mut rx) = self.signal_rx.try_lock() else {
            return 0;
        };
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Apply manager signals as they arrive. Runs until the task is aborted.
    pub async fn run(&self) {
        let mut rx = self.signal_rx.lock().await;
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
    }

    fn handle_event(&self, event: SessionEvent) {
        tracing::debug!("session event {event:?}");
        self.update(|state, events| match event {
            SessionEvent::Ready(kind) => {
                if !state.tracker_mut(kind).mark_ready() {
                    return ignored(event, state.tracker_mut(kind));
                }
                match kind {
                    SessionKind::Calling => state.view.call_action_enabled = true,
                    SessionKind::Chat => state.view.chat_action_enabled = true,
                }
                events.push(state_changed(state.tracker_mut(kind)));
                events.push(ClientEvent::ActionEnabledChanged { kind, enabled: true });
            }
            SessionEvent::Presented(kind) => {
                if !state.tracker_mut(kind).mark_presented() {
                    return ignored(event, state.tracker_mut(kind));
                }
                events.push(state_changed(state.tracker_mut(kind)));
                match kind {
                    SessionKind::Calling => {
                        state.view.call_view_visible = true;
                        events.push(ClientEvent::CallViewVisibilityChanged(true));
                    }
                    SessionKind::Chat => {
                        state.view.chat_view_visible = true;
                        events.push(ClientEvent::ChatViewVisibilityChanged(true));
                        if state.view.chat_loading {
                            state.view.chat_loading = false;
                            events.push(ClientEvent::ChatLoadingChanged(false));
                        }
                    }
                }
            }
            SessionEvent::Dismissed(kind) => {
                if !state.tracker_mut(kind).mark_dismissed() {
                    return ignored(event, state.tracker_mut(kind));
                }
                events.push(state_changed(state.tracker_mut(kind)));
                match kind {
                    SessionKind::Calling => {
                        state.view.call_view_visible = false;
                        events.push(ClientEvent::CallViewVisibilityChanged(false));
                    }
                    SessionKind::Chat => {
                        state.view.chat_view_visible = false;
                        events.push(ClientEvent::ChatViewVisibilityChanged(false));
                    }
                }
            }
        });
    }

    fn initialize_manager(&self, manager: &Arc<dyn SessionManager>, params: SessionParams) {
        let kind = manager.kind();
        let started = self.update(|state, events| {
            let tracker = state.tracker_mut(kind);
            if !tracker.begin_initialize() {
                return false;
            }
            events.push(state_changed(tracker));
            true
        });

        if !started {
            tracing::debug!("{kind} session manager already initialized, skipping");
            return;
        }

        tracing::info!("initializing {kind} session manager");
        manager.initialize(params, SessionSignal::new(kind, self.signal_tx.clone()));
    }

    /// Mutate state under the lock, then emit the collected events after
    /// releasing it so listeners may call back into the orchestrator.
    fn update<R>(&self, f: impl FnOnce(&mut FlowState, &mut Vec<ClientEvent>) -> R) -> R {
        let mut events = Vec::new();
        let result = {
            let mut state = self.lock_state();
            f(&mut state, &mut events)
        };
        for event in events {
            self.emitter.emit(event);
        }
        result
    }

    fn lock_state(&self) -> MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn state_changed(tracker: &SessionTracker) -> ClientEvent {
    ClientEvent::SessionStateChanged {
        kind: tracker.kind(),
        state: tracker.state(),
    }
}

fn ignored(event: SessionEvent, tracker: &SessionTracker) {
    tracing::warn!("ignoring {event:?} in state {:?}", tracker.state());
}
