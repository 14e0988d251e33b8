//! Configuration types for the DDNS system
//!
//! This module defines the configuration structures the daemon builds before
//! any client or server is constructed. Nothing here performs I/O; the
//! daemon fills the structs from the environment and calls `validate()`.

use crate::error::{Error, Result};
use crate::traits::IpVersion;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Shortest allowed interval between update passes
pub const MIN_INTERVAL_SECS: u64 = 30;

/// Interval used when none is configured
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

/// Port the relay server listens on by default
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Port the metrics endpoint listens on by default
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Operating mode of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Reconcile directly against the provider
    #[default]
    Client,
    /// Forward the address state to a relay server
    Relay,
    /// Serve relay requests
    Server,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Client => f.write_str("client"),
            Mode::Relay => f.write_str("relay"),
            Mode::Server => f.write_str("server"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "client" => Ok(Mode::Client),
            "relay" => Ok(Mode::Relay),
            "server" => Ok(Mode::Server),
            other => Err(Error::config(format!(
                "mode '{other}' is not supported. Supported modes: client, relay, server"
            ))),
        }
    }
}

/// Configuration of an update client (`client` and `relay` modes)
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Provider API token, required in client mode
    #[serde(default)]
    pub token: Option<String>,

    /// Whether records are proxied
    #[serde(default = "default_proxied")]
    pub proxied: bool,

    /// Domains to keep in sync
    pub domains: Vec<String>,

    /// Seconds between update passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Track the IPv4 address
    #[serde(default = "default_true")]
    pub ipv4: bool,

    /// Track the IPv6 address
    #[serde(default)]
    pub ipv6: bool,

    /// Override for the IPv4 lookup URL
    #[serde(default)]
    pub ipv4_url: Option<String>,

    /// Override for the IPv6 lookup URL
    #[serde(default)]
    pub ipv6_url: Option<String>,

    /// Relay server URL, required in relay mode
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Shared secret presented to the relay server
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            token: None,
            proxied: default_proxied(),
            domains: Vec::new(),
            interval_secs: default_interval_secs(),
            ipv4: true,
            ipv6: false,
            ipv4_url: None,
            ipv6_url: None,
            endpoint: None,
            secret: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("proxied", &self.proxied)
            .field("domains", &self.domains)
            .field("interval_secs", &self.interval_secs)
            .field("ipv4", &self.ipv4)
            .field("ipv6", &self.ipv6)
            .field("ipv4_url", &self.ipv4_url)
            .field("ipv6_url", &self.ipv6_url)
            .field("endpoint", &self.endpoint)
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ClientConfig {
    /// Validate the configuration for `mode`
    ///
    /// # Errors
    ///
    /// - `Error::MissingToken` in client mode without a token
    /// - `Error::NoDomains` without domains
    /// - `Error::Config` for every other violation
    pub fn validate(&self, mode: Mode) -> Result<()> {
        match mode {
            Mode::Client => {
                if self.token.as_deref().is_none_or(|t| t.trim().is_empty()) {
                    return Err(Error::MissingToken);
                }
            }
            Mode::Relay => {
                let endpoint = self.endpoint.as_deref().unwrap_or_default();
                if endpoint.is_empty() {
                    return Err(Error::config("relay mode requires an endpoint"));
                }
                validate_url(endpoint)?;
            }
            Mode::Server => {
                return Err(Error::config("server mode uses ServerConfig"));
            }
        }

        if self.domains.is_empty() {
            return Err(Error::NoDomains);
        }
        for domain in &self.domains {
            validate_domain_name(domain)?;
        }

        if self.interval_secs < MIN_INTERVAL_SECS {
            return Err(Error::config(format!(
                "interval must be at least {MIN_INTERVAL_SECS} seconds. Got: {}",
                self.interval_secs
            )));
        }

        if !self.ipv4 && !self.ipv6 {
            return Err(Error::config("at least one of IPv4 and IPv6 must be tracked"));
        }

        for url in [&self.ipv4_url, &self.ipv6_url].into_iter().flatten() {
            validate_url(url)?;
        }

        Ok(())
    }

    /// Interval between update passes
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Address versions to look up before each pass, IPv4 first
    pub fn versions(&self) -> Vec<IpVersion> {
        IpVersion::ALL
            .into_iter()
            .filter(|version| match version {
                IpVersion::V4 => self.ipv4,
                IpVersion::V6 => self.ipv6,
            })
            .collect()
    }
}

/// Configuration of the relay server (`server` mode)
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Provider API token used for every pass
    pub token: String,

    /// Domains callers may update; empty allows any
    #[serde(default)]
    pub domains: Vec<String>,

    /// Secret callers must present as `token`; `None` disables the check
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: String::new(),
            domains: Vec::new(),
            secret: None,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind", &self.bind)
            .field("token", &"<REDACTED>")
            .field("domains", &self.domains)
            .field("secret", &self.secret.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.token.trim().is_empty() {
            return Err(Error::MissingToken);
        }

        for domain in &self.domains {
            validate_domain_name(domain)?;
        }

        if self.secret.as_deref().is_some_and(str::is_empty) {
            return Err(Error::config("server secret cannot be empty when set"));
        }

        Ok(())
    }
}

/// Configuration of the Prometheus endpoint
///
/// When enabled, counters are served on `GET /metrics` from their own
/// listener, separate from the relay server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Collect and serve metrics
    #[serde(default)]
    pub enabled: bool,

    /// Port of the metrics listener
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: DEFAULT_METRICS_PORT,
        }
    }
}

impl MetricsConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.port == 0 {
            return Err(Error::config("metrics port cannot be 0"));
        }
        Ok(())
    }

    /// Listen address of the metrics endpoint
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
///
/// A leading `*` label names a wildcard record (`*.example.org`); `*` is
/// rejected anywhere else.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    let name = match domain.strip_prefix("*.") {
        Some(rest) if !rest.is_empty() => rest,
        _ => domain,
    };

    for label in name.split('.') {
        if label.is_empty() {
            return Err(Error::config(format!(
                "Domain name has empty label: '{domain}'"
            )));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{label}'. \
                Valid: alphanumeric and hyphen only."
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{label}'"
            )));
        }
    }

    Ok(())
}

fn validate_url(url: &str) -> Result<()> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(Error::config(format!(
            "URL must use HTTP or HTTPS scheme. Got: {url}"
        )));
    }
    Ok(())
}

fn default_proxied() -> bool {
    true
}

fn default_true() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_SERVER_PORT))
}
