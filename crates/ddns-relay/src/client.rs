// # Relay Client
//
// Update client that forwards its address state to a relay server instead of
// talking to the provider. It holds no provider credential; the server owns
// it and runs the reconciliation pass.

use crate::wire::{UpdateQuery, UpdateResponse};
use async_trait::async_trait;
use ddns_core::traits::UpdateClient;
use ddns_core::{AddressState, Error, Result};
use std::fmt;
use std::time::Duration;

/// Timeout of one relay request, covering the server's whole pass
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Update client relaying through a server
pub struct RelayClient {
    data: AddressState,

    /// Relay server URL
    endpoint: String,

    /// Shared secret sent as `token`
    secret: Option<String>,

    client: reqwest::Client,
}

impl fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("data", &self.data)
            .field("endpoint", &self.endpoint)
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl RelayClient {
    /// Create a relay client with an empty address state
    ///
    /// # Errors
    ///
    /// - `Error::Config` if `endpoint` is empty or the HTTP client cannot be
    ///   built
    pub fn new(endpoint: impl Into<String>, proxied: bool) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(Error::config("relay endpoint cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            data: AddressState::new(proxied),
            endpoint,
            secret: None,
            client,
        })
    }

    /// Present `secret` to the server
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Relay server URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl UpdateClient for RelayClient {
    fn data(&self) -> &AddressState {
        &self.data
    }

    fn data_mut(&mut self) -> &mut AddressState {
        &mut self.data
    }

    async fn update(&self) -> Result<()> {
        self.data.check()?;

        let query = UpdateQuery::from_state(&self.data, self.secret.clone());
        let response = self
            .client
            .get(&self.endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::transient(format!("relay request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transient(format!("failed to read relay response: {e}")))?;

        match serde_json::from_str::<UpdateResponse>(&body) {
            Ok(reply) if status.is_success() && reply.success => {
                tracing::debug!("Relay accepted update: {}", reply.msg);
                Ok(())
            }
            Ok(reply) => Err(Error::relay(format!("{status}: {}", reply.msg))),
            Err(_) => Err(Error::relay(format!("{status}: unexpected response {body:?}"))),
        }
    }

    fn client_name(&self) -> &'static str {
        "relay"
    }
}
