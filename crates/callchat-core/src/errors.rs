use thiserror::Error;

use crate::session::SessionKind;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("could not decode credentials: {0}")]
    Decode(String),
    #[error("session initialization failed: {0}")]
    SessionInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{0} action is not enabled")]
    ActionDisabled(SessionKind),
}
