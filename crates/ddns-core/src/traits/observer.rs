// # Change Observer Trait
//
// The hook a reconciliation pass calls after it changed records, so metrics
// or audit collaborators can count address changes. It is passed to the
// `Reconciler` at construction; [`NoopObserver`] is used when nothing
// listens.

use crate::traits::IpVersion;
use std::collections::HashMap;
use std::sync::Mutex;

/// Trait for change observer implementations
///
/// Called at most once per address version per pass, and only if at least
/// one record of that version was created or updated.
pub trait ChangeObserver: Send + Sync {
    /// Records of `version` changed for the domain set `domains`
    fn notify_changed(&self, version: IpVersion, domains: &[String]);
}

/// Observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ChangeObserver for NoopObserver {
    fn notify_changed(&self, _version: IpVersion, _domains: &[String]) {}
}

/// Observer counting notifications per version and domain set
///
/// Domain sets are keyed by their `;`-joined form, e.g.
/// `"foo.example.org;bar.example.org"`.
#[derive(Debug, Default)]
pub struct CountingObserver {
    counts: Mutex<HashMap<(IpVersion, String), u64>>,
}

impl CountingObserver {
    /// Create a new observer with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications for `version` and exactly `domains`
    pub fn count(&self, version: IpVersion, domains: &[String]) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts
            .get(&(version, domains_label(domains)))
            .copied()
            .unwrap_or(0)
    }

    /// Number of notifications for `version` across all domain sets
    pub fn total(&self, version: IpVersion) -> u64 {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts
            .iter()
            .filter(|((v, _), _)| *v == version)
            .map(|(_, n)| n)
            .sum()
    }
}

impl ChangeObserver for CountingObserver {
    fn notify_changed(&self, version: IpVersion, domains: &[String]) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry((version, domains_label(domains))).or_insert(0) += 1;
    }
}

/// Join a domain list into a single label value
pub fn domains_label(domains: &[String]) -> String {
    domains.join(";")
}
