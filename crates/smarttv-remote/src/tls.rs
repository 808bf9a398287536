//! TLS trust policy for the control channel.
//!
//! TVs serve a self-signed certificate on their secure WebSocket port, so
//! chain and hostname validation are relaxed for hosts on the local network
//! (RFC1918, loopback, `localhost`). Every other host gets normal validation
//! unless the caller opts out explicitly.

use std::net::IpAddr;

use native_tls::TlsConnector;
use tokio_tungstenite::Connector;

use crate::error::RemoteResult;

/// Returns `true` for hosts that live on the local network.
pub fn is_local_network_host(host: &str) -> bool {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => ip.is_private() || ip.is_loopback(),
        Ok(IpAddr::V6(ip)) => ip.is_loopback(),
        Err(_) => false,
    }
}

/// Build the WebSocket TLS connector for `host`.
///
/// # Errors
/// Returns [`RemoteError::Tls`](crate::RemoteError::Tls) if the native TLS
/// backend cannot be initialised.
pub fn connector_for(host: &str, allow_insecure: bool) -> RemoteResult<Connector> {
    let relaxed = allow_insecure || is_local_network_host(host);
    if relaxed {
        tracing::debug!(host, "Accepting self-signed TV certificate");
    }
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(relaxed)
        .danger_accept_invalid_hostnames(relaxed)
        .build()?;
    Ok(Connector::NativeTls(connector))
}
