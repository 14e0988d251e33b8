// # Memory Provider
//
// In-memory implementation of DnsProvider.
//
// ## Purpose
//
// Holds zones and records in a map instead of talking to an API. Useful for
// tests, for embedding the reconciler without credentials, and as the
// backend of a relay server under test.
//
// ## Behavior
//
// - Zones match a domain when the domain equals the zone name or ends with
//   `.<zone name>`
// - Record IDs are assigned sequentially on create
// - Every write is appended to a log that tests can inspect

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::{DnsProvider, Record, RecordType, Zone};

#[derive(Debug, Default)]
struct Inner {
    zones: Vec<Zone>,
    /// (zone ID, record)
    records: Vec<(String, Record)>,
    writes: Vec<Record>,
    next_id: u64,
}

/// In-memory DNS provider
///
/// Clones share the same storage, so a test can keep one handle while the
/// reconciler owns another.
///
/// # Example
///
/// ```rust
/// use ddns_core::memory::MemoryProvider;
/// use ddns_core::traits::{DnsProvider, Record, RecordType};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = MemoryProvider::new();
///     provider.add_zone("44a6dc905d4ff61b", "example.org").await;
///
///     let zone_id = provider.resolve_zone("foo.example.org").await?;
///     assert_eq!(zone_id, "44a6dc905d4ff61b");
///
///     let record = Record::new(RecordType::A, "foo.example.org", "100.100.100.100", true);
///     provider.write_record(&zone_id, &record).await?;
///     assert_eq!(provider.writes().await.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    inner: Arc<RwLock<Inner>>,
    requests: Arc<AtomicUsize>,
}

impl MemoryProvider {
    /// Create a provider without zones
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active zone
    pub async fn add_zone(&self, id: impl Into<String>, name: impl Into<String>) {
        let mut guard = self.inner.write().await;
        guard.zones.push(Zone {
            id: id.into(),
            name: name.into(),
        });
    }

    /// Seed an existing record without logging a write
    ///
    /// A record without ID gets one assigned.
    pub async fn insert_record(&self, zone_id: impl Into<String>, record: Record) {
        let mut guard = self.inner.write().await;
        let record = if record.is_new() {
            let id = guard.assign_id();
            record.with_id(id)
        } else {
            record
        };
        guard.records.push((zone_id.into(), record));
    }

    /// All records currently stored for `name`, across zones
    pub async fn records(&self, name: &str) -> Vec<Record> {
        let guard = self.inner.read().await;
        guard
            .records
            .iter()
            .filter(|(_, r)| r.name == name)
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Every record passed to `write_record`, in call order
    pub async fn writes(&self) -> Vec<Record> {
        self.inner.read().await.writes.clone()
    }

    /// Number of provider calls of any kind
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Inner {
    fn assign_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:016x}", self.next_id)
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    async fn resolve_zone(&self, domain: &str) -> Result<String, Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.read().await;

        let matches: Vec<&Zone> = guard
            .zones
            .iter()
            .filter(|zone| {
                domain == zone.name || domain.ends_with(&format!(".{}", zone.name))
            })
            .collect();

        match matches.as_slice() {
            [] => Err(Error::zone_not_found(domain)),
            [zone] => Ok(zone.id.clone()),
            many => Err(Error::AmbiguousZone {
                zone: domain.to_string(),
                matches: many.len(),
            }),
        }
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>, Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let guard = self.inner.read().await;

        Ok(guard
            .records
            .iter()
            .filter(|(zone, r)| {
                zone == zone_id
                    && r.name == name
                    && record_type.is_none_or(|t| r.record_type == t)
            })
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn write_record(&self, zone_id: &str, record: &Record) -> Result<(), Error> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.inner.write().await;

        if !guard.zones.iter().any(|z| z.id == zone_id) {
            return Err(Error::not_found(format!("zone {zone_id}")));
        }

        if record.is_new() {
            let id = guard.assign_id();
            guard
                .records
                .push((zone_id.to_string(), record.clone().with_id(id)));
        } else {
            let stored = guard
                .records
                .iter_mut()
                .find(|(zone, r)| zone == zone_id && r.id == record.id)
                .ok_or_else(|| Error::not_found(format!("record {record}")))?;
            stored.1.content = record.content.clone();
            stored.1.proxied = record.proxied;
            stored.1.ttl = record.ttl;
        }

        guard.writes.push(record.clone());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}
