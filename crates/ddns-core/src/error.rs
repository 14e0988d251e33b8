//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the workspace.
//!
//! Errors fall into four classes:
//! - **Data-invalid**: detected before any network call, never retryable
//!   (see [`Error::is_invalid_data`])
//! - **Resolution**: the zone for a domain could not be determined
//! - **Provider**: the DNS provider rejected or failed a request
//! - **Relay**: the relay server was unreachable or refused the update

use crate::traits::IpVersion;
use std::net::IpAddr;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// No provider API token was supplied
    #[error("missing API token")]
    MissingToken,

    /// The address state has no domains to update
    #[error("no domains configured")]
    NoDomains,

    /// Neither an IPv4 nor an IPv6 address is set
    #[error("neither an IPv4 nor an IPv6 address is set")]
    NoAddress,

    /// An address could not be parsed
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// An address of the wrong family was assigned
    #[error("{address} is not an {expected} address")]
    WrongVersion {
        /// The rejected address
        address: IpAddr,
        /// The family the target field holds
        expected: IpVersion,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No active zone matches the domain
    #[error("Zone not found: {0}")]
    ZoneNotFound(String),

    /// More than one active zone matches the domain
    #[error("Ambiguous zone {zone}: {matches} matches")]
    AmbiguousZone {
        /// The zone name that was looked up
        zone: String,
        /// How many zones matched
        matches: usize,
    },

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Record or zone vanished
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failures, rate limits and 5xx responses
    #[error("Transient error: {0}")]
    Transient(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// The relay server refused the update
    #[error("Relay error: {0}")]
    Relay(String),

    /// Public IP lookup errors
    #[error("IP source error: {0}")]
    IpSource(String),

    /// I/O errors
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(zone: impl Into<String>) -> Self {
        Self::ZoneNotFound(zone.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a transient error
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a relay error
    pub fn relay(msg: impl Into<String>) -> Self {
        Self::Relay(msg.into())
    }

    /// Create an IP source error
    pub fn ip_source(msg: impl Into<String>) -> Self {
        Self::IpSource(msg.into())
    }

    /// Whether the error was raised by validation before any network call
    pub fn is_invalid_data(&self) -> bool {
        matches!(
            self,
            Self::MissingToken
                | Self::NoDomains
                | Self::NoAddress
                | Self::InvalidAddress(_)
                | Self::WrongVersion { .. }
                | Self::Config(_)
        )
    }

    /// Whether a later pass may succeed without any change on our side
    ///
    /// Nothing retries inside a pass; this only steers log severity and
    /// relay status codes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Network(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
