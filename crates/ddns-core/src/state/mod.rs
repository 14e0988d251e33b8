// # Address State
//
// The desired state of one update client: which domains to keep in sync,
// which addresses they should point to, and whether the records are proxied.
//
// The state is owned by its client. Resolvers populate it between ticks; the
// reconciler only reads it.

use crate::error::{Error, Result};
use crate::traits::IpVersion;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Desired DNS state for one update client
///
/// # Example
///
/// ```rust
/// use ddns_core::AddressState;
///
/// let mut state = AddressState::new(true);
/// state.set_domains(["foo.example.org", "bar.example.org"]);
/// state.set_ipv4("100.100.100.100").unwrap();
///
/// // an IPv6 address is rejected for the IPv4 field
/// assert!(state.set_ipv4("fd69::dead").is_err());
/// assert!(state.check().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressState {
    domains: Vec<String>,
    ipv4: Option<Ipv4Addr>,
    ipv6: Option<Ipv6Addr>,
    proxied: bool,
}

impl AddressState {
    /// Create an empty state
    pub fn new(proxied: bool) -> Self {
        Self {
            proxied,
            ..Self::default()
        }
    }

    /// Domains in insertion order
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Replace the domain list
    ///
    /// Names are trimmed; empty names and duplicates are dropped, first
    /// occurrence wins.
    pub fn set_domains<I, S>(&mut self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.domains.clear();
        for domain in domains {
            self.add_domain(domain.as_ref());
        }
    }

    /// Append a domain unless it is already present
    pub fn add_domain(&mut self, domain: &str) {
        let domain = domain.trim();
        if domain.is_empty() || self.domains.iter().any(|d| d == domain) {
            return;
        }
        self.domains.push(domain.to_string());
    }

    /// Desired IPv4 address
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.ipv4
    }

    /// Desired IPv6 address
    pub fn ipv6(&self) -> Option<Ipv6Addr> {
        self.ipv6
    }

    /// Desired address of the given version
    pub fn address(&self, version: IpVersion) -> Option<IpAddr> {
        match version {
            IpVersion::V4 => self.ipv4.map(IpAddr::V4),
            IpVersion::V6 => self.ipv6.map(IpAddr::V6),
        }
    }

    /// Parse and set the IPv4 address
    ///
    /// # Errors
    ///
    /// - `Error::InvalidAddress` if `addr` is not an IP address
    /// - `Error::WrongVersion` if `addr` is an IPv6 address
    pub fn set_ipv4(&mut self, addr: &str) -> Result<()> {
        match parse_address(addr)? {
            IpAddr::V4(v4) => {
                self.ipv4 = Some(v4);
                Ok(())
            }
            other => Err(Error::WrongVersion {
                address: other,
                expected: IpVersion::V4,
            }),
        }
    }

    /// Parse and set the IPv6 address
    ///
    /// # Errors
    ///
    /// - `Error::InvalidAddress` if `addr` is not an IP address
    /// - `Error::WrongVersion` if `addr` is an IPv4 address
    pub fn set_ipv6(&mut self, addr: &str) -> Result<()> {
        match parse_address(addr)? {
            IpAddr::V6(v6) => {
                self.ipv6 = Some(v6);
                Ok(())
            }
            other => Err(Error::WrongVersion {
                address: other,
                expected: IpVersion::V6,
            }),
        }
    }

    /// Set the address field matching the address's own version
    pub fn set_address(&mut self, addr: IpAddr) {
        match addr {
            IpAddr::V4(v4) => self.ipv4 = Some(v4),
            IpAddr::V6(v6) => self.ipv6 = Some(v6),
        }
    }

    /// Unset the address of the given version
    pub fn clear(&mut self, version: IpVersion) {
        match version {
            IpVersion::V4 => self.ipv4 = None,
            IpVersion::V6 => self.ipv6 = None,
        }
    }

    /// Versions with an address set, IPv4 first
    pub fn versions(&self) -> impl Iterator<Item = IpVersion> + '_ {
        IpVersion::ALL
            .into_iter()
            .filter(|version| self.address(*version).is_some())
    }

    /// Whether records are proxied
    pub fn proxied(&self) -> bool {
        self.proxied
    }

    /// Set whether records are proxied
    pub fn set_proxied(&mut self, proxied: bool) {
        self.proxied = proxied;
    }

    /// Verify the state can be reconciled
    ///
    /// # Errors
    ///
    /// - `Error::NoDomains` if no domain is configured
    /// - `Error::NoAddress` if neither address is set
    pub fn check(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::NoDomains);
        }
        if self.ipv4.is_none() && self.ipv6.is_none() {
            return Err(Error::NoAddress);
        }
        Ok(())
    }
}

fn parse_address(addr: &str) -> Result<IpAddr> {
    let addr = addr.trim();
    addr.parse()
        .map_err(|_| Error::invalid_address(format!("'{addr}'")))
}
