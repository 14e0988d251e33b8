// # Relay Wire Model
//
// Query string and response body exchanged between relay client and server:
//
// ```text
// GET /?token=<secret>&domains=foo.example.org,bar.example.org&ipv4=100.100.100.100&ipv6=fd69::dead&proxy=true
//
// {"success": true, "msg": "..."}
// ```
//
// The query form stays compatible with router-style DynDNS callers, which
// can only fill placeholders into a URL.

use ddns_core::{AddressState, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query parameters of an update request
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateQuery {
    /// Shared secret, if the server requires one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Comma-separated domain list
    #[serde(default)]
    pub domains: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<String>,

    /// Proxy flag; the server assumes `true` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<bool>,
}

impl fmt::Debug for UpdateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateQuery")
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .field("domains", &self.domains)
            .field("ipv4", &self.ipv4)
            .field("ipv6", &self.ipv6)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl UpdateQuery {
    /// Encode an address state
    pub fn from_state(state: &AddressState, token: Option<String>) -> Self {
        Self {
            token,
            domains: state.domains().join(","),
            ipv4: state.ipv4().map(|ip| ip.to_string()),
            ipv6: state.ipv6().map(|ip| ip.to_string()),
            proxy: Some(state.proxied()),
        }
    }

    /// Decode into an address state
    ///
    /// Empty address parameters count as unset, since router templates often
    /// leave a placeholder blank.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidAddress` / `Error::WrongVersion` for bad addresses
    pub fn to_state(&self) -> Result<AddressState> {
        let mut state = AddressState::new(self.proxy.unwrap_or(true));
        state.set_domains(self.domains.split(','));

        if let Some(ipv4) = self.ipv4.as_deref().filter(|s| !s.trim().is_empty()) {
            state.set_ipv4(ipv4)?;
        }
        if let Some(ipv6) = self.ipv6.as_deref().filter(|s| !s.trim().is_empty()) {
            state.set_ipv6(ipv6)?;
        }

        Ok(state)
    }
}

/// Response body of an update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub msg: String,
}

impl UpdateResponse {
    pub fn ok(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            msg: msg.into(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
        }
    }
}
