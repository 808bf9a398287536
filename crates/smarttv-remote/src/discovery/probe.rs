//! Active subnet probing over HTTP.
//!
//! Each host is examined in two phases: UPnP description paths first, then a
//! plain `GET /` on common TV control ports. The requests of a phase are in
//! flight together and their replies are judged in configured order, so one
//! host takes at most two probe timeouts. Any transport error, timeout or
//! unexpected status means "nothing here" and moves on.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesOrdered;
use ipnet::Ipv4Net;

use super::upnp;
use crate::classifier;
use crate::config::DiscoveryConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::model::DiscoveredTv;

/// Upper bound on the body bytes kept for fingerprinting.
const BODY_SAMPLE_LIMIT: usize = 64 * 1024;

/// A completed HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Minimal HTTP GET used by the subnet probe.
pub trait HttpProber: Send + Sync {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, RemoteResult<HttpReply>>;
}

/// [`HttpProber`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestProber {
    http: reqwest::Client,
}

impl ReqwestProber {
    /// # Errors
    /// Returns [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new() -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { http })
    }

    async fn fetch(&self, url: &str, timeout: Duration) -> RemoteResult<HttpReply> {
        let mut response = self.http.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let mut sample = Vec::new();
        while sample.len() < BODY_SAMPLE_LIMIT {
            match response.chunk().await? {
                Some(chunk) => sample.extend_from_slice(&chunk),
                None => break,
            }
        }
        sample.truncate(BODY_SAMPLE_LIMIT);

        Ok(HttpReply {
            status,
            headers,
            body: String::from_utf8_lossy(&sample).into_owned(),
        })
    }
}

impl HttpProber for ReqwestProber {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, RemoteResult<HttpReply>> {
        Box::pin(self.fetch(url, timeout))
    }
}

/// The /24 (or configured CIDR) around the local IPv4 address.
///
/// # Errors
/// Returns [`RemoteError::ConfigError`] if the configured subnet does not
/// parse or no non-loopback IPv4 interface exists.
pub fn resolve_subnet(config: &DiscoveryConfig) -> RemoteResult<Ipv4Net> {
    if let Some(subnet) = &config.subnet {
        let net: Ipv4Net = subnet.parse().map_err(|e| RemoteError::ConfigError {
            reason: format!("invalid discovery subnet '{subnet}': {e}"),
        })?;
        return Ok(net.trunc());
    }

    let local = local_ipv4()?;
    let net = Ipv4Net::new(local, 24).map_err(|e| RemoteError::ConfigError {
        reason: format!("cannot derive /24 from {local}: {e}"),
    })?;
    Ok(net.trunc())
}

fn local_ipv4() -> RemoteResult<Ipv4Addr> {
    let interfaces = if_addrs::get_if_addrs()?;
    interfaces
        .iter()
        .filter(|iface| !iface.is_loopback())
        .find_map(|iface| match iface.ip() {
            IpAddr::V4(ip) if !ip.is_link_local() => Some(ip),
            _ => None,
        })
        .ok_or_else(|| RemoteError::ConfigError {
            reason: "no non-loopback IPv4 interface found; set discovery.subnet".into(),
        })
}

/// Host addresses inside `net` at offsets `first_host..=last_host`.
pub fn host_window(net: Ipv4Net, first_host: u8, last_host: u8) -> Vec<Ipv4Addr> {
    let base = u32::from(net.network());
    (first_host..=last_host)
        .filter_map(|offset| base.checked_add(u32::from(offset)).map(Ipv4Addr::from))
        .filter(|ip| net.contains(ip) && *ip != net.broadcast())
        .collect()
}

/// Probe one host. Returns the TV found there, if any.
pub async fn probe_host(
    prober: &dyn HttpProber,
    ip: Ipv4Addr,
    config: &DiscoveryConfig,
    timeout: Duration,
) -> Option<DiscoveredTv> {
    if let Some(tv) = probe_upnp(prober, ip, config, timeout).await {
        return Some(tv);
    }
    probe_ports(prober, ip, config, timeout).await
}

async fn probe_upnp(
    prober: &dyn HttpProber,
    ip: Ipv4Addr,
    config: &DiscoveryConfig,
    timeout: Duration,
) -> Option<DiscoveredTv> {
    let urls: Vec<String> = config
        .upnp_ports
        .iter()
        .flat_map(move |port| {
            config
                .upnp_paths
                .iter()
                .map(move |path| format!("http://{ip}:{port}{path}"))
        })
        .collect();
    let mut replies: FuturesOrdered<_> = urls
        .iter()
        .map(move |url| async move { (url, prober.get(url, timeout).await) })
        .collect();

    while let Some((url, reply)) = replies.next().await {
        let Ok(reply) = reply else {
            continue;
        };
        if !(200..300).contains(&reply.status) {
            continue;
        }
        let Some(device) = upnp::parse_description(&reply.body) else {
            continue;
        };
        if !device.looks_like_tv() {
            tracing::trace!(%ip, url = %url, "UPnP device is not a TV");
            continue;
        }

        tracing::debug!(%ip, url = %url, name = ?device.friendly_name, "UPnP TV found");
        return Some(DiscoveredTv {
            id: device.udn.unwrap_or_else(|| format!("upnp:{ip}")),
            name: device
                .friendly_name
                .unwrap_or_else(|| format!("TV at {ip}")),
            manufacturer: device.manufacturer.unwrap_or_else(|| "Unknown".into()),
            ip_address: ip.to_string(),
            model_name: device.model_name,
            mac_address: None,
        });
    }
    None
}

async fn probe_ports(
    prober: &dyn HttpProber,
    ip: Ipv4Addr,
    config: &DiscoveryConfig,
    timeout: Duration,
) -> Option<DiscoveredTv> {
    let host = ip.to_string();
    let mut replies: FuturesOrdered<_> = config
        .probe_ports
        .iter()
        .map(move |&port| async move {
            let url = format!("http://{ip}:{port}/");
            (port, prober.get(&url, timeout).await)
        })
        .collect();

    while let Some((port, reply)) = replies.next().await {
        let Ok(reply) = reply else {
            continue;
        };
        if !is_fingerprintable(reply.status) {
            continue;
        }

        let detected = classifier::classify(&host, port, reply.status, &reply.headers, &reply.body);
        if detected.manufacturer == "Unknown" {
            tracing::trace!(%ip, port, "Responder not recognized as a TV");
            return None;
        }

        tracing::debug!(%ip, port, manufacturer = %detected.manufacturer, "TV fingerprinted");
        return Some(DiscoveredTv {
            id: format!("{ip}:{port}"),
            name: format!("{} ({ip})", detected.name),
            manufacturer: detected.manufacturer,
            ip_address: host,
            model_name: Some(detected.model),
            mac_address: None,
        });
    }
    None
}

fn is_fingerprintable(status: u16) -> bool {
    (200..300).contains(&status) || status == 401 || status == 404
}
