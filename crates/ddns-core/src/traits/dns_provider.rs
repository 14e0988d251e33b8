// # DNS Provider Trait
//
// Defines the record model and the interface for reading and writing DNS
// records via a provider API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
// - In-memory: [`crate::memory::MemoryProvider`]
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{DnsProvider, Record, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone_id = provider.resolve_zone("foo.example.org").await?;
//     let records = provider
//         .list_records(&zone_id, "foo.example.org", Some(RecordType::A))
//         .await?;
//
//     let record = Record::new(RecordType::A, "foo.example.org", "100.100.100.100", true);
//     provider.write_record(&zone_id, &record).await?;
//
//     Ok(())
// }
// ```

use crate::traits::IpVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TTL value providers interpret as "automatic"
pub const AUTOMATIC_TTL: u32 = 1;

/// DNS record type managed by the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Record type carrying addresses of the given version
    pub fn for_version(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordType::A,
            IpVersion::V6 => RecordType::Aaaa,
        }
    }

    /// Address version this record type carries
    pub fn version(self) -> IpVersion {
        match self {
            RecordType::A => IpVersion::V4,
            RecordType::Aaaa => IpVersion::V6,
        }
    }

    /// Wire name of the type
    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(crate::Error::provider(
                "record",
                format!("unsupported record type: {other}"),
            )),
        }
    }
}

/// A provider zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Provider-specific zone ID
    pub id: String,
    /// Zone name (e.g., "example.org")
    pub name: String,
}

/// A DNS record, as fetched from or written to a provider
///
/// Values are transient: they are read at the start of a pass and dropped at
/// its end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Provider record ID, `None` if the record does not exist yet
    pub id: Option<String>,
    /// Record type
    pub record_type: RecordType,
    /// Fully-qualified record name
    pub name: String,
    /// Record content (the address)
    pub content: String,
    /// Whether traffic is proxied through the provider
    pub proxied: bool,
    /// Time-to-live
    pub ttl: u32,
}

impl Record {
    /// Create a record that does not exist at the provider yet
    pub fn new(
        record_type: RecordType,
        name: impl Into<String>,
        content: impl Into<String>,
        proxied: bool,
    ) -> Self {
        Self {
            id: None,
            record_type,
            name: name.into(),
            content: content.into(),
            proxied,
            ttl: AUTOMATIC_TTL,
        }
    }

    /// Attach a provider ID
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Whether writing this record creates it
    pub fn is_new(&self) -> bool {
        self.id.as_deref().is_none_or(str::is_empty)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.record_type, self.content)
    }
}

/// Trait for DNS provider implementations
///
/// This trait is the strategy object the reconciler drives. Each method
/// maps to a single provider request.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Rules for implementations
///
/// - One request per call: no retry, no backoff, no sleeping
/// - No caching beyond a single call
/// - Never decide whether a write is needed (owned by the `Reconciler`)
/// - Never log the API credential
///
/// Failures are reported through the error classes of [`crate::Error`]:
/// `Authentication`, `NotFound`, `Transient` or `Provider`.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the ID of the active zone containing `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The zone ID
    /// - `Err(Error::ZoneNotFound)`: No active zone matches
    /// - `Err(Error::AmbiguousZone)`: More than one zone matches
    async fn resolve_zone(&self, domain: &str) -> Result<String, crate::Error>;

    /// List records attached to exactly `name` within the zone
    ///
    /// When `record_type` is `Some`, only records of that type are returned.
    /// An empty vector means no record exists yet.
    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>, crate::Error>;

    /// Create or update a single record
    ///
    /// If `record.id` is set the record is updated in place (ID, type and
    /// name preserved); otherwise it is created.
    async fn write_record(&self, zone_id: &str, record: &Record) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
