// # Direct Client
//
// Update client that owns an address state and reconciles it against a DNS
// provider in-process. The relay client in `ddns-relay` is the other
// implementation of the same contract.

use crate::engine::{PassReport, Reconciler};
use crate::error::Result;
use crate::state::AddressState;
use crate::traits::{ChangeObserver, DnsProvider, UpdateClient};
use async_trait::async_trait;
use std::sync::Arc;

/// Update client talking to the DNS provider directly
pub struct DirectClient {
    data: AddressState,
    reconciler: Reconciler,
}

impl DirectClient {
    /// Create a client for `provider` with an empty address state
    pub fn new(provider: Arc<dyn DnsProvider>, proxied: bool) -> Self {
        Self {
            data: AddressState::new(proxied),
            reconciler: Reconciler::new(provider),
        }
    }

    /// Replace the change observer
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.reconciler = self.reconciler.with_observer(observer);
        self
    }

    /// Run one pass and return what it did
    pub async fn reconcile(&self) -> Result<PassReport> {
        self.reconciler.reconcile(&self.data).await
    }
}

#[async_trait]
impl UpdateClient for DirectClient {
    fn data(&self) -> &AddressState {
        &self.data
    }

    fn data_mut(&mut self) -> &mut AddressState {
        &mut self.data
    }

    async fn update(&self) -> Result<()> {
        self.reconcile().await.map(|_| ())
    }

    fn client_name(&self) -> &'static str {
        self.reconciler.provider_name()
    }
}
