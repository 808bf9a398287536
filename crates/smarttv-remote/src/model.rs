//! Records published by discovery and consumed by the connection manager.

use serde::{Deserialize, Serialize};

/// A TV found on the local network.
///
/// Within one discovery session no two published records share an `id` or
/// an `ip_address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredTv {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    /// Bare host, or a service URI for SDK-found TVs.
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

impl DiscoveredTv {
    /// Host name to open the control channel against.
    ///
    /// SDK-found TVs carry a URI such as `http://192.168.1.9:8001/api/v2/`;
    /// subnet-probed TVs carry a bare address.
    pub fn control_host(&self) -> Option<String> {
        control_host(&self.ip_address)
    }
}

/// Extract the host part of an address that may be a bare IP/hostname or a URI.
pub fn control_host(address: &str) -> Option<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        return reqwest::Url::parse(trimmed)
            .ok()
            .and_then(|url| url.host_str().map(|h| h.trim_matches(['[', ']']).to_string()));
    }
    let host = match trimmed.rsplit_once(':') {
        // host:port, but leave bare IPv6 literals alone
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => trimmed,
    };
    Some(host.to_string())
}

/// Result of fingerprinting one HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedTv {
    pub manufacturer: String,
    pub name: String,
    pub model: String,
    pub ip: String,
    pub port: u16,
}

/// Opaque handle of a service found by the vendor SDK browser, retained so
/// that applications can later be launched through it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub id: String,
    pub name: String,
    pub uri: String,
}
