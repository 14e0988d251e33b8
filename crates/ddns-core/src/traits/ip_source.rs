// # IP Source Trait
//
// Defines the interface for looking up the host's current public address.
//
// ## Implementations
//
// - HTTP plain-text lookup: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{IpSource, IpVersion};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let ipv4 = source.current(IpVersion::V4).await?;
//     println!("public IPv4: {ipv4}");
//
//     Ok(())
// }
// ```
//
// The reconciliation core never calls an IP source. Only the `Runner`
// consults one, between passes, to refresh the address state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// IP version (v4 or v6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Both versions, in the order a pass visits them
    pub const ALL: [IpVersion; 2] = [IpVersion::V4, IpVersion::V6];

    /// Version of the given address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for public IP lookup implementations
///
/// Implementations must be thread-safe and usable across async tasks.
/// A lookup is a single request: no caching, no retry, no background task.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public address of the given version
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: An address whose version equals `version`
    /// - `Err(Error)`: If the address could not be determined
    async fn current(&self, version: IpVersion) -> Result<IpAddr, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
