// # HTTP IP Source
//
// This crate provides an HTTP-based public IP lookup for the DDNS system.
//
// ## Architecture
//
// Fetches the current address from a plain-text "what is my IP" service,
// one URL per address family. Each lookup is a single request: no caching,
// no polling task. The `Runner` calls it before every pass.

use async_trait::async_trait;
use ddns_core::traits::{IpSource, IpVersion};
use ddns_core::{Error, Result};
use std::net::IpAddr;
use std::time::Duration;

/// Default IPv4 lookup service (plain text)
pub const DEFAULT_IPV4_URL: &str = "https://api.ipify.org";

/// Default IPv6 lookup service (plain text)
pub const DEFAULT_IPV6_URL: &str = "https://api6.ipify.org";

/// Timeout of a single lookup
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-based public IP source
#[derive(Debug, Clone)]
pub struct HttpIpSource {
    /// URL answering with the IPv4 address
    v4_url: String,

    /// URL answering with the IPv6 address
    v6_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl Default for HttpIpSource {
    fn default() -> Self {
        Self::new(DEFAULT_IPV4_URL, DEFAULT_IPV6_URL)
    }
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `v4_url`: URL returning the IPv4 address (e.g., "https://api.ipify.org")
    /// - `v6_url`: URL returning the IPv6 address (e.g., "https://api6.ipify.org")
    pub fn new(v4_url: impl Into<String>, v6_url: impl Into<String>) -> Self {
        Self {
            v4_url: v4_url.into(),
            v6_url: v6_url.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// URL used for `version`
    pub fn url(&self, version: IpVersion) -> &str {
        match version {
            IpVersion::V4 => &self.v4_url,
            IpVersion::V6 => &self.v6_url,
        }
    }

    /// Fetch the address text from the service
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "HTTP error from {url}: {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {e}")))
    }
}

/// Parse a service response and check its family
pub fn parse_response(body: &str, version: IpVersion) -> Result<IpAddr> {
    let text = body.trim();
    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::invalid_address(format!("'{text}'")))?;

    if IpVersion::of(&ip) != version {
        return Err(Error::WrongVersion {
            address: ip,
            expected: version,
        });
    }
    Ok(ip)
}

#[async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self, version: IpVersion) -> Result<IpAddr> {
        let url = self.url(version);
        let body = self.fetch(url).await?;
        let ip = parse_response(&body, version)?;

        tracing::debug!("Public {} address from {}: {}", version, url, ip);
        Ok(ip)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
