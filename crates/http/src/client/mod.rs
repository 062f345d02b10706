//! AMS HTTP client

pub mod auth;
pub mod catalog;
pub mod clients;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod users;

use credentials::{CredentialStore, Credentials, MemoryCredentialStore};
use error::ClientError;
use gateway::{AuthGateway, SessionExpiredHook};
use reqwest::{ClientBuilder, Response};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// AMS dashboard API client
///
/// Cheap to clone; clones share one gateway, so they share the stored
/// session and a single in-flight token refresh.
#[derive(Clone)]
pub struct AmsClient {
    gateway: Arc<AuthGateway>,
}

impl AmsClient {
    /// Create a new client with default configuration and in-memory credentials
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> AmsClientBuilder {
        AmsClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.gateway.base_url()
    }

    /// The gateway all requests go through
    pub fn gateway(&self) -> &AuthGateway {
        &self.gateway
    }

    /// The credential store backing this client's session
    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        self.gateway.store()
    }

    /// Currently stored session
    pub async fn credentials(&self) -> Result<Credentials, ClientError> {
        Ok(self.gateway.store().load().await?)
    }

    /// Whether an access token is stored
    pub async fn is_authenticated(&self) -> Result<bool, ClientError> {
        Ok(self.credentials().await?.access_token.is_some())
    }

    /// Username of the logged-in user, if any
    pub async fn current_username(&self) -> Result<Option<String>, ClientError> {
        Ok(self.credentials().await?.username)
    }

    /// Create a request builder; the gateway adds authentication on send
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url(), path);
        self.gateway.http().request(method, url)
    }

    /// Execute a request through the refresh protocol and decode the body
    pub async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.gateway.send(build(request)?).await?;
        decode(response).await
    }

    /// Execute a request through the refresh protocol, discarding the body
    pub async fn execute_empty(&self, request: reqwest::RequestBuilder) -> Result<(), ClientError> {
        let response = self.gateway.send(build(request)?).await?;
        check(response).await.map(|_| ())
    }

    /// Execute a request without the refresh protocol
    ///
    /// Used where a 401 means the submitted credentials are wrong rather than
    /// that the session expired.
    pub async fn execute_public<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.gateway.send_unguarded(build(request)?).await?;
        decode(response).await
    }
}

fn build(request: reqwest::RequestBuilder) -> Result<reqwest::Request, ClientError> {
    request
        .build()
        .map_err(|e| ClientError::Configuration(format!("invalid request: {e}")))
}

/// Map non-success statuses to errors carrying the server's body unchanged
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        debug!(status = %status, "Request failed");
        Err(ClientError::from_status(status, message))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    check(response)
        .await?
        .json()
        .await
        .map_err(ClientError::Decode)
}

/// Builder for AmsClient
#[derive(Default)]
pub struct AmsClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    user_agent: Option<String>,
    credential_store: Option<Arc<dyn CredentialStore>>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl AmsClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the upper bound on a token refresh exchange
    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Persist the session in `store` instead of memory
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Callback run when the session expires and credentials are cleared
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<AmsClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is empty".into()));
        }

        let http = ClientBuilder::new()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| format!("ams-client/{}", env!("CARGO_PKG_VERSION"))),
            )
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        let store = self
            .credential_store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));

        let mut gateway = AuthGateway::new(http, base_url, store);
        if let Some(timeout) = self.refresh_timeout {
            gateway = gateway.with_refresh_timeout(timeout);
        }
        if let Some(hook) = self.on_session_expired {
            gateway = gateway.with_session_expired_hook(hook);
        }

        Ok(AmsClient {
            gateway: Arc::new(gateway),
        })
    }
}
