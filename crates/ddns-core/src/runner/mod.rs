//! Periodic runner
//!
//! Drives an [`UpdateClient`] on a fixed interval:
//!
//! ```text
//!   start ──▶ tick ──▶ sleep(interval) ──▶ tick ──▶ sleep ──▶ ...
//!                          │                            │
//!                          └──────── shutdown ◀─────────┘
//! ```
//!
//! - The first tick runs immediately
//! - A failed tick is logged and the loop keeps going
//! - Shutdown is observed between ticks or while sleeping, never inside a
//!   pass, so a pass is never cut off halfway
//! - With an [`IpSource`], tracked versions are refreshed before each tick

use crate::error::Result;
use crate::traits::{IpSource, IpVersion, UpdateClient};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runs update passes until shutdown
pub struct Runner {
    /// Client performing the passes
    client: Box<dyn UpdateClient>,

    /// Delay between the end of one pass and the start of the next
    interval: Duration,

    /// Optional public address lookup, consulted before each tick
    ip_source: Option<Box<dyn IpSource>>,

    /// Versions refreshed from the IP source
    versions: Vec<IpVersion>,
}

impl Runner {
    /// Create a runner for `client`
    ///
    /// The interval is taken as given; the configuration layer enforces its
    /// minimum.
    pub fn new(client: Box<dyn UpdateClient>, interval: Duration) -> Self {
        Self {
            client,
            interval,
            ip_source: None,
            versions: Vec::new(),
        }
    }

    /// Refresh `versions` from `source` before every tick
    pub fn with_ip_source(mut self, source: Box<dyn IpSource>, versions: &[IpVersion]) -> Self {
        self.ip_source = Some(source);
        self.versions = versions.to_vec();
        self
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The driven client
    pub fn client(&self) -> &dyn UpdateClient {
        self.client.as_ref()
    }

    /// Mutable access to the driven client's state between ticks
    pub fn client_mut(&mut self) -> &mut dyn UpdateClient {
        self.client.as_mut()
    }

    /// Refresh addresses, then run one update pass
    pub async fn tick(&mut self) -> Result<()> {
        self.refresh_addresses().await;
        self.client.update().await
    }

    /// Run until Ctrl+C
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` completes
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown; tick failures never end the loop
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        info!(
            "Starting {} runner (interval: {}s)",
            self.client.client_name(),
            self.interval.as_secs()
        );

        tokio::pin!(shutdown);
        loop {
            match self.tick().await {
                Ok(()) => debug!("Update pass completed"),
                Err(e) if e.is_invalid_data() => error!("Update pass rejected: {}", e),
                Err(e) if e.is_retryable() => warn!("Update pass failed, will retry: {}", e),
                Err(e) => error!("Update pass failed: {}", e),
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Runner stopped");
        Ok(())
    }

    async fn refresh_addresses(&mut self) {
        let Some(source) = &self.ip_source else {
            return;
        };

        for version in &self.versions {
            match source.current(*version).await {
                Ok(addr) if IpVersion::of(&addr) == *version => {
                    debug!("{} reported {} address {}", source.source_name(), version, addr);
                    self.client.data_mut().set_address(addr);
                }
                Ok(addr) => {
                    warn!("{} returned {} for {} lookup", source.source_name(), addr, version);
                    self.client.data_mut().clear(*version);
                }
                Err(e) => {
                    warn!("Failed to look up public {} address: {}", version, e);
                    self.client.data_mut().clear(*version);
                }
            }
        }
    }
}
