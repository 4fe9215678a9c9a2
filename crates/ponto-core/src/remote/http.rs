use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{
    extract_error_message, Credentials, RemoteAuthority, RemoteError, SyncRequest, SyncResponse,
    WireRecord, REGISTER_ENDPOINT, SYNC_ENDPOINT,
};
use crate::config::Config;

/// `RemoteAuthority` over HTTP/JSON
pub struct HttpRemoteAuthority {
    client: Client,
    base_url: String,
    credentials: Arc<Credentials>,
}

impl HttpRemoteAuthority {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<Credentials>,
    ) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ponto/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Build a client from configuration, sharing the given credential store
    pub fn from_config(config: &Config, credentials: Arc<Credentials>) -> Result<Self, RemoteError> {
        Self::new(&config.api_url, config.request_timeout(), credentials)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R, RemoteError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = self.credentials.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            debug!(url = %url, error = %e, "Request did not reach the server");
            RemoteError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %url, "Credentials rejected; clearing session");
            if let Err(e) = self.credentials.clear() {
                warn!(error = %e, "Failed to clear stored credentials");
            }
            return Err(RemoteError::CredentialRejected);
        }

        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message =
                extract_error_message(&text).unwrap_or_else(|| "Request failed".to_string());
            return Err(RemoteError::Server {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RemoteAuthority for HttpRemoteAuthority {
    async fn sync_batch(&self, records: &[WireRecord]) -> Result<SyncResponse, RemoteError> {
        let body = SyncRequest {
            records: records.to_vec(),
        };
        debug!(count = records.len(), "Sending sync batch");
        self.post(SYNC_ENDPOINT, &body).await
    }

    async fn register(&self, record: &WireRecord) -> Result<(), RemoteError> {
        debug!(clock_type = %record.clock_type, "Registering event");
        let _: serde_json::Value = self.post(REGISTER_ENDPOINT, record).await?;
        Ok(())
    }
}
