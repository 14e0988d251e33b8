//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`DnsProvider`]: Read and write DNS records via provider APIs
//! - [`UpdateClient`]: Converge DNS towards an address state (direct or relayed)
//! - [`ChangeObserver`]: Observe record changes made by a pass
//! - [`IpSource`]: Look up the current public address

pub mod dns_provider;
pub mod ip_source;
pub mod observer;
pub mod update_client;

pub use dns_provider::{AUTOMATIC_TTL, DnsProvider, Record, RecordType, Zone};
pub use ip_source::{IpSource, IpVersion};
pub use observer::{ChangeObserver, CountingObserver, NoopObserver};
pub use update_client::UpdateClient;
