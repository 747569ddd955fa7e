use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::store::{IDENTIFIER_KEY, KeyValueStore};

/// Header carrying the static API key.
pub const API_KEY_HEADER: &str = "API-Key";

/// Token and identifier returned by the credential service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CredentialResponse {
    pub token: String,
    pub identifier: String,
}

/// The user identity handed to both session managers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub identifier: String,
    pub display_name: String,
    pub token: String,
}

impl Identity {
    pub fn from_credentials(credentials: CredentialResponse, display_name: &str) -> Self {
        Self {
            identifier: credentials.identifier,
            display_name: display_name.to_string(),
            token: credentials.token,
        }
    }
}

/// A fully built credential request.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRequest {
    pub url: Url,
    pub api_key: String,
}

impl CredentialRequest {
    /// Build `{domain}{endpoint}[{query}{identifier}]`.
    ///
    /// With a cached identifier the service refreshes the token for that
    /// identity instead of issuing a new one.
    pub fn build(
        config: &ClientConfig,
        cached_identifier: Option<&str>,
    ) -> Result<Self, ClientError> {
        let mut raw = format!("{}{}", config.domain, config.endpoint);
        if let Some(identifier) = cached_identifier {
            raw.push_str(&config.query);
            raw.push_str(identifier);
        }

        let url = Url::parse(&raw)
            .map_err(|e| ClientError::Config(format!("invalid credential url '{raw}': {e}")))?;

        Ok(Self {
            url,
            api_key: config.api_key.clone(),
        })
    }
}

/// Decode a credential response.
///
/// The body must be a JSON object of string values that contains both
/// `token` and `identifier`.
pub fn decode_credentials(status: u16, body: &[u8]) -> Result<CredentialResponse, ClientError> {
    if !(200..=299).contains(&status) {
        return Err(ClientError::HttpStatus(status));
    }

    let mut fields: HashMap<String, String> = serde_json::from_slice(body)
        .map_err(|e| ClientError::Decode(format!("expected an object of strings: {e}")))?;

    let token = fields
        .remove("token")
        .ok_or_else(|| ClientError::Decode("missing 'token'".into()))?;
    let identifier = fields
        .remove("identifier")
        .ok_or_else(|| ClientError::Decode("missing 'identifier'".into()))?;

    Ok(CredentialResponse { token, identifier })
}

/// Source of credentials. The HTTP implementation is the production one;
/// tests substitute canned responses.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn fetch(&self, request: &CredentialRequest) -> Result<CredentialResponse, ClientError>;
}

/// Fetches credentials over HTTP with a single GET and no retry.
pub struct HttpCredentialSource {
    client: reqwest::Client,
}

impl HttpCredentialSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpCredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialSource {
    async fn fetch(&self, request: &CredentialRequest) -> Result<CredentialResponse, ClientError> {
        tracing::info!("requesting credentials from {}", request.url);

        let resp = self
            .client
            .get(request.url.clone())
            .header(API_KEY_HEADER, &request.api_key)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Network(format!("reading body: {e}")))?;

        decode_credentials(status, &body)
    }
}

/// Resolves an [`Identity`], reusing and persisting the cached identifier.
pub struct CredentialFetcher {
    source: Arc<dyn CredentialSource>,
    store: Arc<dyn KeyValueStore>,
}

impl CredentialFetcher {
    pub fn new(source: Arc<dyn CredentialSource>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { source, store }
    }

    pub async fn fetch_identity(&self, config: &ClientConfig) -> Result<Identity, ClientError> {
        let cached = self.store.get(IDENTIFIER_KEY);
        if cached.is_some() {
            tracing::debug!("refreshing token for cached identifier");
        }

        let request = CredentialRequest::build(config, cached.as_deref())?;
        let credentials = self.source.fetch(&request).await?;

        if let Err(e) = self.store.set(IDENTIFIER_KEY, &credentials.identifier) {
            tracing::warn!("could not persist identifier: {e}");
        }

        Ok(Identity::from_credentials(credentials, &config.display_name))
    }
}
