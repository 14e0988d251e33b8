//! Reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Validating the desired address state
//! - Resolving the zone of every configured domain
//! - Diffing existing records against the desired addresses
//! - Issuing the minimal set of creates and updates
//! - Notifying the change observer
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────┐
//!  AddressState ────▶ │  Reconciler  │
//!                     └──────────────┘
//!                            │
//!          ┌─────────────────┼──────────────────┐
//!          ▼                 ▼                  ▼
//!  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐
//!  │ resolve_zone │  │ list_records │  │ ChangeObserver │
//!  │ (per domain) │  │ write_record │  │ (per version)  │
//!  └──────────────┘  └──────────────┘  └────────────────┘
//!          DnsProvider
//! ```
//!
//! ## Pass Flow
//!
//! 1. Reject invalid state before any request
//! 2. For each domain, in order: resolve its zone
//! 3. For each set version (IPv4 → A, IPv6 → AAAA): list, diff, write
//! 4. Notify the observer once per version that changed
//!
//! A pass is strictly sequential. The first error aborts it; writes that
//! already succeeded stay applied and the next pass converges the rest.

use crate::error::Result;
use crate::state::AddressState;
use crate::traits::{ChangeObserver, DnsProvider, IpVersion, NoopObserver, Record, RecordType};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// What a pass does for one (domain, version) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// No record exists yet
    Create,
    /// A record exists with different content
    Update {
        /// ID of the record to overwrite
        id: String,
        /// Content currently stored at the provider
        previous: String,
    },
    /// The record already holds the desired address
    Unchanged,
}

/// Decide the action for the existing record of one (domain, version) pair
///
/// Contents are compared as addresses when they parse, so `fd69:0::dead`
/// and `fd69::dead` are equal.
pub fn plan_action(existing: Option<&Record>, desired: IpAddr) -> RecordAction {
    let Some(record) = existing else {
        return RecordAction::Create;
    };

    let matches = match record.content.trim().parse::<IpAddr>() {
        Ok(current) => current == desired,
        Err(_) => record.content == desired.to_string(),
    };

    match (&record.id, matches) {
        (_, true) => RecordAction::Unchanged,
        (Some(id), false) if !id.is_empty() => RecordAction::Update {
            id: id.clone(),
            previous: record.content.clone(),
        },
        _ => RecordAction::Create,
    }
}

/// Outcome of a successful pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Records created
    pub created: usize,
    /// Records updated
    pub updated: usize,
    /// (domain, version) pairs that already matched
    pub unchanged: usize,
    /// Versions with at least one create or update
    pub changed: Vec<IpVersion>,
}

impl PassReport {
    /// Number of writes issued
    pub fn writes(&self) -> usize {
        self.created + self.updated
    }

    fn mark_changed(&mut self, version: IpVersion) {
        if !self.changed.contains(&version) {
            self.changed.push(version);
        }
    }
}

/// Reconciler driving a [`DnsProvider`] towards an [`AddressState`]
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Optionally attach an observer with [`Reconciler::with_observer()`]
/// 3. Call [`Reconciler::reconcile()`] once per pass
///
/// The reconciler holds no state between passes.
pub struct Reconciler {
    /// DNS provider for reading and writing records
    provider: Arc<dyn DnsProvider>,

    /// Collaborator told about changed versions
    observer: Arc<dyn ChangeObserver>,
}

impl Reconciler {
    /// Create a reconciler with a no-op observer
    pub fn new(provider: Arc<dyn DnsProvider>) -> Self {
        Self {
            provider,
            observer: Arc::new(NoopObserver),
        }
    }

    /// Replace the change observer
    pub fn with_observer(mut self, observer: Arc<dyn ChangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassReport)`: Every (domain, version) pair matches `state`
    /// - `Err(Error)`: The first failure; data-invalid errors are raised
    ///   before any provider call
    pub async fn reconcile(&self, state: &AddressState) -> Result<PassReport> {
        state.check()?;

        let mut report = PassReport::default();
        let result = self.apply(state, &mut report).await;

        // Writes before a failure still happened, so they are still reported
        for version in &report.changed {
            self.observer.notify_changed(*version, state.domains());
        }

        result.map(|()| report)
    }

    async fn apply(&self, state: &AddressState, report: &mut PassReport) -> Result<()> {
        for domain in state.domains() {
            let zone_id = self.provider.resolve_zone(domain).await?;
            debug!("Resolved zone {} for {}", zone_id, domain);

            for version in state.versions() {
                let Some(desired) = state.address(version) else {
                    continue;
                };
                let record_type = RecordType::for_version(version);

                let existing = self
                    .provider
                    .list_records(&zone_id, domain, Some(record_type))
                    .await?;
                // First match wins; duplicates are left alone
                let current = existing.iter().find(|r| r.record_type == record_type);

                let mut record =
                    Record::new(record_type, domain.as_str(), desired.to_string(), state.proxied());

                match plan_action(current, desired) {
                    RecordAction::Unchanged => {
                        debug!("{} {} already points to {}", domain, record_type, desired);
                        report.unchanged += 1;
                        continue;
                    }
                    RecordAction::Create => {
                        self.provider.write_record(&zone_id, &record).await?;
                        info!("Created {} record {} -> {}", record_type, domain, desired);
                        report.created += 1;
                    }
                    RecordAction::Update { id, previous } => {
                        record.id = Some(id);
                        self.provider.write_record(&zone_id, &record).await?;
                        info!(
                            "Updated {} record {} -> {} (was: {})",
                            record_type, domain, desired, previous
                        );
                        report.updated += 1;
                    }
                }
                report.mark_changed(version);
            }
        }

        Ok(())
    }
}
