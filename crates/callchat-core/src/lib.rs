//! Call/chat client core.
//!
//! Fetches a user identity from the credential service, hands it to the
//! calling and chat session managers, and turns their readiness signals into
//! UI state. Pure Rust, consumed by native UI shells via UniFFI bindings.

pub mod config;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod session;
pub mod store;

pub use config::ClientConfig;
pub use credentials::{
    CredentialFetcher, CredentialRequest, CredentialResponse, CredentialSource,
    HttpCredentialSource, Identity,
};
pub use errors::ClientError;
pub use events::{ClientEvent, ClientEventListener, EventEmitter, ViewState};
pub use orchestrator::Orchestrator;
pub use session::{
    SessionEvent, SessionKind, SessionManager, SessionParams, SessionSignal, SessionState,
    SessionTarget, SessionTracker,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, IDENTIFIER_KEY};
