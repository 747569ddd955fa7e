use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ClientError;

/// Static client configuration.
///
/// Keys mirror the property-list names used by the native shells, so the
/// same document can be bundled with the app and loaded here.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ClientConfig {
    /// Base URL of the credential service, e.g. `https://tokens.example.com`
    pub domain: String,
    /// Path of the token endpoint, appended to `domain`
    pub endpoint: String,
    /// Query prefix placed before a cached identifier, e.g. `?identifier=`
    #[serde(default)]
    pub query: String,
    /// Value sent in the `API-Key` header
    pub api_key: String,
    /// Service endpoint handed to the chat session manager
    #[serde(alias = "ACSENDPOINT")]
    pub chat_endpoint: String,
    /// Identifier of the fixed remote party
    pub callee: String,
    #[serde(default)]
    pub callee_name: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

fn default_display_name() -> String {
    "Test Client".to_string()
}

impl ClientConfig {
    pub fn from_json(json: &str) -> Result<Self, ClientError> {
        let config: ClientConfig = serde_json::from_str(json)
            .map_err(|e| ClientError::Config(format!("invalid config document: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json(&contents)
    }

    /// Reject configurations that could never produce a working session.
    pub fn validate(&self) -> Result<(), ClientError> {
        let required = [
            ("DOMAIN", &self.domain),
            ("ENDPOINT", &self.endpoint),
            ("API_KEY", &self.api_key),
            ("CHAT_ENDPOINT", &self.chat_endpoint),
            ("CALLEE", &self.callee),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ClientError::Config(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }
}
