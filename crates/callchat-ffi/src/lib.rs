//! UniFFI bindings for callchat-core.
//!
//! Provides a CallChatClient object that wraps the Orchestrator, a file-backed
//! store and the HTTP credential source into a single FFI-safe interface. The
//! native shell implements the two session managers on top of its
//! communication SDK and receives UI state through a listener.

use std::sync::Arc;

use callchat_core::{
    self, ClientEvent as CoreClientEvent, SessionKind as CoreSessionKind,
    SessionState as CoreSessionState,
};

uniffi::include_scaffolding!("callchat");

const DEFAULT_LOG_FILTER: &str = "callchat_core=debug,callchat_ffi=debug";

// ── Namespace functions ──────────────────────────────────────────────

/// Initialize tracing/logging. Call once from the host before using CallChatClient.
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
            )
            .with_ansi(false)
            .init();
    });
}

/// Load a bundled JSON configuration document.
fn load_config(path: String) -> Result<ClientConfig, ClientError> {
    Ok(callchat_core::ClientConfig::load(&path)?.into())
}

// ── FFI-safe type conversions ──────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub domain: String,
    pub endpoint: String,
    pub query: String,
    pub api_key: String,
    pub chat_endpoint: String,
    pub callee: String,
    pub callee_name: String,
    pub display_name: String,
}

impl From<callchat_core::ClientConfig> for ClientConfig {
    fn from(c: callchat_core::ClientConfig) -> Self {
        Self {
            domain: c.domain,
            endpoint: c.endpoint,
            query: c.query,
            api_key: c.api_key,
            chat_endpoint: c.chat_endpoint,
            callee: c.callee,
            callee_name: c.callee_name,
            display_name: c.display_name,
        }
    }
}

impl From<ClientConfig> for callchat_core::ClientConfig {
    fn from(c: ClientConfig) -> Self {
        Self {
            domain: c.domain,
            endpoint: c.endpoint,
            query: c.query,
            api_key: c.api_key,
            chat_endpoint: c.chat_endpoint,
            callee: c.callee,
            callee_name: c.callee_name,
            display_name: c.display_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Calling,
    Chat,
}

impl From<CoreSessionKind> for SessionKind {
    fn from(k: CoreSessionKind) -> Self {
        match k {
            CoreSessionKind::Calling => Self::Calling,
            CoreSessionKind::Chat => Self::Chat,
        }
    }
}

impl From<SessionKind> for CoreSessionKind {
    fn from(k: SessionKind) -> Self {
        match k {
            SessionKind::Calling => Self::Calling,
            SessionKind::Chat => Self::Chat,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    SessionRequested,
    SessionPresented,
}

impl From<CoreSessionState> for SessionState {
    fn from(s: CoreSessionState) -> Self {
        match s {
            CoreSessionState::Uninitialized => Self::Uninitialized,
            CoreSessionState::Initializing => Self::Initializing,
            CoreSessionState::Ready => Self::Ready,
            CoreSessionState::SessionRequested => Self::SessionRequested,
            CoreSessionState::SessionPresented => Self::SessionPresented,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub identifier: String,
    pub display_name: String,
    pub token: String,
    pub endpoint: Option<String>,
}

impl From<callchat_core::SessionParams> for SessionParams {
    fn from(p: callchat_core::SessionParams) -> Self {
        Self {
            identifier: p.identifier,
            display_name: p.display_name,
            token: p.token,
            endpoint: p.endpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionTarget {
    pub identifier: String,
    pub display_name: Option<String>,
}

impl From<callchat_core::SessionTarget> for SessionTarget {
    fn from(t: callchat_core::SessionTarget) -> Self {
        Self {
            identifier: t.identifier,
            display_name: t.display_name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewState {
    pub call_action_enabled: bool,
    pub chat_action_enabled: bool,
    pub call_view_visible: bool,
    pub chat_view_visible: bool,
    pub chat_loading: bool,
}

impl From<callchat_core::ViewState> for ViewState {
    fn from(v: callchat_core::ViewState) -> Self {
        Self {
            call_action_enabled: v.call_action_enabled,
            chat_action_enabled: v.chat_action_enabled,
            call_view_visible: v.call_view_visible,
            chat_view_visible: v.chat_view_visible,
            chat_loading: v.chat_loading,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    SessionStateChanged { kind: SessionKind, state: SessionState },
    ActionEnabledChanged { kind: SessionKind, enabled: bool },
    CallViewVisibilityChanged { visible: bool },
    ChatViewVisibilityChanged { visible: bool },
    ChatLoadingChanged { loading: bool },
}

impl From<CoreClientEvent> for ClientEvent {
    fn from(e: CoreClientEvent) -> Self {
        match e {
            CoreClientEvent::SessionStateChanged { kind, state } => Self::SessionStateChanged {
                kind: kind.into(),
                state: state.into(),
            },
            CoreClientEvent::ActionEnabledChanged { kind, enabled } => {
                Self::ActionEnabledChanged { kind: kind.into(), enabled }
            }
            CoreClientEvent::CallViewVisibilityChanged(visible) => {
                Self::CallViewVisibilityChanged { visible }
            }
            CoreClientEvent::ChatViewVisibilityChanged(visible) => {
                Self::ChatViewVisibilityChanged { visible }
            }
            CoreClientEvent::ChatLoadingChanged(loading) => Self::ChatLoadingChanged { loading },
        }
    }
}

// ── Error conversion ──────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {msg}")]
    Network { msg: String },
    #[error("Unexpected status code: {status}")]
    HttpStatus { status: u16 },
    #[error("Decode error: {msg}")]
    Decode { msg: String },
    #[error("Session init error: {msg}")]
    SessionInit { msg: String },
    #[error("Config error: {msg}")]
    Config { msg: String },
    #[error("Storage error: {msg}")]
    Storage { msg: String },
    #[error("Action disabled: {kind:?}")]
    ActionDisabled { kind: SessionKind },
}

impl From<callchat_core::ClientError> for ClientError {
    fn from(e: callchat_core::ClientError) -> Self {
        tracing::error!("ClientError: {e}");
        match e {
            callchat_core::ClientError::Network(msg) => Self::Network { msg },
            callchat_core::ClientError::HttpStatus(status) => Self::HttpStatus { status },
            callchat_core::ClientError::Decode(msg) => Self::Decode { msg },
            callchat_core::ClientError::SessionInit(msg) => Self::SessionInit { msg },
            callchat_core::ClientError::Config(msg) => Self::Config { msg },
            callchat_core::ClientError::Storage(msg) => Self::Storage { msg },
            callchat_core::ClientError::ActionDisabled(kind) => {
                Self::ActionDisabled { kind: kind.into() }
            }
        }
    }
}

// ── Callback interfaces ───────────────────────────────────────────────

pub trait ClientEventListener: Send + Sync {
    fn on_event(&self, event: ClientEvent);
}

/// Session manager implemented by the native shell on top of its SDK.
pub trait SessionManager: Send + Sync {
    fn initialize(&self, params: SessionParams, signal: Arc<SessionSignal>);
    fn start_session(&self, target: SessionTarget);
}

/// Handed to the native session manager so it can report completions.
pub struct SessionSignal {
    inner: callchat_core::SessionSignal,
}

impl SessionSignal {
    pub fn kind(&self) -> SessionKind {
        self.inner.kind().into()
    }

    pub fn ready(&self) {
        self.inner.ready();
    }

    pub fn presented(&self) {
        self.inner.presented();
    }

    pub fn dismissed(&self) {
        self.inner.dismissed();
    }

    pub fn failed(&self, reason: String) {
        self.inner.failed(&reason);
    }
}

// ── Bridges: FFI callback → core trait ────────────────────────────────

struct BridgeListener {
    ffi_listener: Arc<dyn ClientEventListener>,
}

impl callchat_core::ClientEventListener for BridgeListener {
    fn on_event(&self, event: CoreClientEvent) {
        self.ffi_listener.on_event(event.into());
    }
}

struct BridgeSessionManager {
    kind: CoreSessionKind,
    ffi_manager: Box<dyn SessionManager>,
}

impl callchat_core::SessionManager for BridgeSessionManager {
    fn kind(&self) -> CoreSessionKind {
        self.kind
    }

    fn initialize(&self, params: callchat_core::SessionParams, signal: callchat_core::SessionSignal) {
        self.ffi_manager
            .initialize(params.into(), Arc::new(SessionSignal { inner: signal }));
    }

    fn start_session(&self, target: callchat_core::SessionTarget) {
        self.ffi_manager.start_session(target.into());
    }
}

// ── CallChatClient: main FFI object ──────────────────────────────────

pub struct CallChatClient {
    orchestrator: Arc<callchat_core::Orchestrator>,
    event_loop: tokio::task::JoinHandle<()>,
    rt: tokio::runtime::Runtime,
}

impl CallChatClient {
    pub fn new(
        config: ClientConfig,
        data_dir: String,
        calling: Box<dyn SessionManager>,
        chat: Box<dyn SessionManager>,
    ) -> Result<Self, ClientError> {
        tracing::info!("CallChatClient::new() data_dir={data_dir}");
        let rt = tokio::runtime::Runtime::new().map_err(|e| ClientError::Config {
            msg: format!("failed to create tokio runtime: {e}"),
        })?;

        let orchestrator = Arc::new(callchat_core::Orchestrator::new(
            config.into(),
            Arc::new(callchat_core::HttpCredentialSource::new()),
            Arc::new(callchat_core::FileStore::new(&data_dir)),
            Arc::new(BridgeSessionManager {
                kind: CoreSessionKind::Calling,
                ffi_manager: calling,
            }),
            Arc::new(BridgeSessionManager {
                kind: CoreSessionKind::Chat,
                ffi_manager: chat,
            }),
        )?);

        let event_loop = {
            let orchestrator = orchestrator.clone();
            rt.spawn(async move { orchestrator.run().await })
        };

        Ok(Self {
            orchestrator,
            event_loop,
            rt,
        })
    }

    /// Start the bootstrap flow in the background. Failures are logged by the
    /// core and leave both actions disabled.
    pub fn activate(&self) {
        let orchestrator = self.orchestrator.clone();
        self.rt.spawn(async move {
            if orchestrator.activate().await.is_err() {
                tracing::debug!("activation halted");
            }
        });
    }

    pub fn start_call(&self) -> Result<(), ClientError> {
        self.orchestrator.start_call().map_err(ClientError::from)
    }

    pub fn start_chat(&self) -> Result<(), ClientError> {
        self.orchestrator.start_chat().map_err(ClientError::from)
    }

    pub fn view_state(&self) -> ViewState {
        self.orchestrator.view_state().into()
    }

    pub fn session_state(&self, kind: SessionKind) -> SessionState {
        self.orchestrator.session_state(kind.into()).into()
    }

    pub fn add_listener(&self, listener: Box<dyn ClientEventListener>) {
        let bridge = Arc::new(BridgeListener {
            ffi_listener: Arc::from(listener),
        });
        self.orchestrator.add_listener(bridge);
    }
}

impl Drop for CallChatClient {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct NoopManager;

    impl SessionManager for NoopManager {
        fn initialize(&self, _params: SessionParams, _signal: Arc<SessionSignal>) {}
        fn start_session(&self, _target: SessionTarget) {}
    }

    /// Reports ready as soon as it is initialized.
    struct EagerManager {
        params: Arc<Mutex<Vec<SessionParams>>>,
    }

    impl SessionManager for EagerManager {
        fn initialize(&self, params: SessionParams, signal: Arc<SessionSignal>) {
            self.params.lock().unwrap().push(params);
            signal.ready();
        }

        fn start_session(&self, _target: SessionTarget) {}
    }

    struct Recorder(Arc<Mutex<Vec<ClientEvent>>>);

    impl ClientEventListener for Recorder {
        fn on_event(&self, event: ClientEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    fn config() -> ClientConfig {
        ClientConfig {
            domain: "http://127.0.0.1:1".into(),
            endpoint: "/api/token".into(),
            query: "?identifier=".into(),
            api_key: "secret".into(),
            chat_endpoint: "https://chat.example.com".into(),
            callee: "8:acs:callee".into(),
            callee_name: "Support".into(),
            display_name: "Alice".into(),
        }
    }

    #[test]
    fn error_conversion_keeps_details() {
        let e: ClientError = callchat_core::ClientError::HttpStatus(404).into();
        assert!(matches!(e, ClientError::HttpStatus { status: 404 }));

        let e: ClientError =
            callchat_core::ClientError::ActionDisabled(CoreSessionKind::Chat).into();
        assert!(matches!(e, ClientError::ActionDisabled { kind: SessionKind::Chat }));

        let e: ClientError = callchat_core::ClientError::Decode("missing 'token'".into()).into();
        assert_eq!(e.to_string(), "Decode error: missing 'token'");
    }

    #[test]
    fn event_conversion() {
        let e: ClientEvent = CoreClientEvent::SessionStateChanged {
            kind: CoreSessionKind::Calling,
            state: CoreSessionState::Ready,
        }
        .into();
        assert_eq!(
            e,
            ClientEvent::SessionStateChanged {
                kind: SessionKind::Calling,
                state: SessionState::Ready,
            }
        );

        let e: ClientEvent = CoreClientEvent::ChatLoadingChanged(true).into();
        assert_eq!(e, ClientEvent::ChatLoadingChanged { loading: true });
    }

    #[test]
    fn config_round_trips_through_core() {
        let core: callchat_core::ClientConfig = config().into();
        assert_eq!(core.callee_name, "Support");
        assert_eq!(ClientConfig::from(core), config());
    }

    #[test]
    fn load_config_reads_bundled_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"DOMAIN":"https://t.example.com","ENDPOINT":"/token","API_KEY":"k",
                "ACSENDPOINT":"https://chat.example.com","CALLEE":"c"}"#,
        )
        .unwrap();

        let config = load_config(path.to_string_lossy().into_owned()).unwrap();
        assert_eq!(config.chat_endpoint, "https://chat.example.com");
        assert!(matches!(
            load_config(dir.path().join("nope.json").to_string_lossy().into_owned()),
            Err(ClientError::Config { .. })
        ));
    }

    #[test]
    fn client_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = config();
        bad.api_key.clear();
        let result = CallChatClient::new(
            bad,
            dir.path().to_string_lossy().into_owned(),
            Box::new(NoopManager),
            Box::new(NoopManager),
        );
        assert!(matches!(result, Err(ClientError::Config { .. })));
    }

    #[test]
    fn actions_start_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let client = CallChatClient::new(
            config(),
            dir.path().to_string_lossy().into_owned(),
            Box::new(NoopManager),
            Box::new(NoopManager),
        )
        .unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        client.add_listener(Box::new(Recorder(events.clone())));

        assert_eq!(
            client.view_state(),
            ViewState {
                call_action_enabled: false,
                chat_action_enabled: false,
                call_view_visible: false,
                chat_view_visible: false,
                chat_loading: false,
            }
        );
        assert_eq!(client.session_state(SessionKind::Calling), SessionState::Uninitialized);
        assert!(matches!(
            client.start_call(),
            Err(ClientError::ActionDisabled { kind: SessionKind::Calling })
        ));
        assert!(matches!(
            client.start_chat(),
            Err(ClientError::ActionDisabled { kind: SessionKind::Chat })
        ));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn activate_enables_actions_through_foreign_managers() {
        let server_rt = tokio::runtime::Runtime::new().unwrap();
        let server = server_rt.block_on(async {
            let server = wiremock::MockServer::start().await;
            wiremock::Mock::given(wiremock::matchers::method("GET"))
                .and(wiremock::matchers::path("/api/token"))
                .and(wiremock::matchers::header("API-Key", "secret"))
                .respond_with(
                    wiremock::ResponseTemplate::new(200)
                        .set_body_string(r#"{"token":"T","identifier":"I"}"#),
                )
                .mount(&server)
                .await;
            server
        });

        let dir = tempfile::tempdir().unwrap();
        let calling_params = Arc::new(Mutex::new(Vec::new()));
        let chat_params = Arc::new(Mutex::new(Vec::new()));
        let mut cfg = config();
        cfg.domain = server.uri();
        let client = CallChatClient::new(
            cfg,
            dir.path().to_string_lossy().into_owned(),
            Box::new(EagerManager { params: calling_params.clone() }),
            Box::new(EagerManager { params: chat_params.clone() }),
        )
        .unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        client.add_listener(Box::new(Recorder(events.clone())));

        client.activate();

        for _ in 0..200 {
            let view = client.view_state();
            if view.call_action_enabled && view.chat_action_enabled {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }

        let view = client.view_state();
        assert!(view.call_action_enabled);
        assert!(view.chat_action_enabled);
        assert_eq!(client.session_state(SessionKind::Chat), SessionState::Ready);
        assert_eq!(calling_params.lock().unwrap()[0].token, "T");
        assert_eq!(
            chat_params.lock().unwrap()[0].endpoint.as_deref(),
            Some("https://chat.example.com")
        );
        assert!(events.lock().unwrap().contains(&ClientEvent::ActionEnabledChanged {
            kind: SessionKind::Calling,
            enabled: true,
        }));

        drop(client);
        drop(server);
    }
}
