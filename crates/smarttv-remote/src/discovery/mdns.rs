//! Vendor service discovery over mDNS.
//!
//! Samsung TVs advertise the multiscreen service `_samsungmsf._tcp`. Each
//! TXT record carries the service id (`id`), the friendly name (`fn`) and the
//! REST endpoint (`se`) that answers device-info queries.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::BoxFuture;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{RemoteError, RemoteResult};
use crate::model::ServiceHandle;

/// mDNS service type of the Samsung multiscreen API.
pub const SAMSUNG_SERVICE_TYPE: &str = "_samsungmsf._tcp.local.";

/// REST port that serves `/api/v2/` on Samsung TVs.
const SAMSUNG_REST_PORT: u16 = 8001;

/// Found/lost notifications from a [`ServiceBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseEvent {
    Found(ServiceHandle),
    Lost(ServiceHandle),
}

/// Extended device details fetched after a service is found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    pub mac_address: Option<String>,
    pub name: Option<String>,
    pub model_name: Option<String>,
}

/// Pluggable vendor discovery backend.
pub trait ServiceBrowser: Send + Sync {
    /// Begin browsing. Events arrive on the returned channel until
    /// [`stop`](Self::stop) is called.
    fn start(&self) -> RemoteResult<mpsc::Receiver<BrowseEvent>>;

    /// Stop browsing. Idempotent.
    fn stop(&self);

    fn device_info<'a>(
        &'a self,
        service: &'a ServiceHandle,
        timeout: Duration,
    ) -> BoxFuture<'a, RemoteResult<DeviceInfo>>;
}

#[derive(Deserialize)]
struct DeviceInfoResponse {
    device: Option<DeviceSection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceSection {
    wifi_mac: Option<String>,
    name: Option<String>,
    model_name: Option<String>,
}

struct Running {
    daemon: ServiceDaemon,
    cancel: CancellationToken,
}

/// [`ServiceBrowser`] backed by `mdns-sd`.
pub struct MdnsBrowser {
    http: reqwest::Client,
    running: Mutex<Option<Running>>,
}

impl MdnsBrowser {
    /// # Errors
    /// Returns [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new() -> RemoteResult<Self> {
        let http = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            http,
            running: Mutex::new(None),
        })
    }

    async fn fetch_device_info(&self, uri: &str, timeout: Duration) -> RemoteResult<DeviceInfo> {
        let response: DeviceInfoResponse = self
            .http
            .get(uri)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let device = response.device.ok_or_else(|| RemoteError::ProtocolError {
            reason: format!("device info at {uri} has no 'device' section"),
        })?;
        Ok(DeviceInfo {
            mac_address: device.wifi_mac.filter(|m| !m.is_empty()),
            name: device.name,
            model_name: device.model_name,
        })
    }

    fn shutdown(running: Running) {
        running.cancel.cancel();
        if let Err(e) = running.daemon.stop_browse(SAMSUNG_SERVICE_TYPE) {
            tracing::debug!(error = %e, "mDNS stop_browse failed");
        }
        if let Err(e) = running.daemon.shutdown() {
            tracing::debug!(error = %e, "mDNS daemon shutdown failed");
        }
    }
}

impl ServiceBrowser for MdnsBrowser {
    fn start(&self) -> RemoteResult<mpsc::Receiver<BrowseEvent>> {
        let mut guard = self.running.lock().map_err(|_| RemoteError::ProtocolError {
            reason: "mDNS browser state poisoned".into(),
        })?;
        if let Some(previous) = guard.take() {
            Self::shutdown(previous);
        }

        let daemon = ServiceDaemon::new().map_err(|e| RemoteError::ProtocolError {
            reason: format!("failed to start mDNS daemon: {e}"),
        })?;
        let receiver = daemon
            .browse(SAMSUNG_SERVICE_TYPE)
            .map_err(|e| RemoteError::ProtocolError {
                reason: format!("failed to browse {SAMSUNG_SERVICE_TYPE}: {e}"),
            })?;

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run_browse_loop(receiver, tx, cancel.clone()));

        tracing::info!(service_type = SAMSUNG_SERVICE_TYPE, "mDNS browse started");
        *guard = Some(Running { daemon, cancel });
        Ok(rx)
    }

    fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(running) = running {
            Self::shutdown(running);
            tracing::info!("mDNS browse stopped");
        }
    }

    fn device_info<'a>(
        &'a self,
        service: &'a ServiceHandle,
        timeout: Duration,
    ) -> BoxFuture<'a, RemoteResult<DeviceInfo>> {
        Box::pin(self.fetch_device_info(&service.uri, timeout))
    }
}

impl Drop for MdnsBrowser {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_browse_loop(
    receiver: flume::Receiver<ServiceEvent>,
    tx: mpsc::Sender<BrowseEvent>,
    cancel: CancellationToken,
) {
    let mut known: HashMap<String, ServiceHandle> = HashMap::new();

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = receiver.recv_async() => event,
        };

        let browse_event = match event {
            Ok(ServiceEvent::ServiceResolved(info)) => {
                let Some(handle) = service_handle(&info) else {
                    tracing::debug!(fullname = info.get_fullname(), "Skipping service without address");
                    continue;
                };
                tracing::debug!(id = %handle.id, name = %handle.name, "mDNS service resolved");
                known.insert(info.get_fullname().to_string(), handle.clone());
                BrowseEvent::Found(handle)
            }
            Ok(ServiceEvent::ServiceRemoved(_ty, fullname)) => {
                let handle = known.remove(&fullname).unwrap_or_else(|| ServiceHandle {
                    id: fullname.clone(),
                    name: instance_name(&fullname).to_string(),
                    uri: String::new(),
                });
                tracing::debug!(fullname, "mDNS service removed");
                BrowseEvent::Lost(handle)
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "mDNS receiver closed");
                break;
            }
        };

        if tx.send(browse_event).await.is_err() {
            break;
        }
    }
}

fn service_handle(info: &ServiceInfo) -> Option<ServiceHandle> {
    let fullname = info.get_fullname();
    let uri = info
        .get_property_val_str("se")
        .filter(|se| !se.is_empty())
        .map(str::to_string)
        .or_else(|| {
            info.get_addresses().iter().find_map(|addr| match addr {
                IpAddr::V4(ip) => Some(format!("http://{ip}:{SAMSUNG_REST_PORT}/api/v2/")),
                IpAddr::V6(_) => None,
            })
        })?;

    let id = info
        .get_property_val_str("id")
        .filter(|id| !id.is_empty())
        .unwrap_or(fullname)
        .to_string();
    let name = info
        .get_property_val_str("fn")
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| instance_name(fullname))
        .to_string();

    Some(ServiceHandle { id, name, uri })
}

/// `Living Room._samsungmsf._tcp.local.` → `Living Room`
fn instance_name(fullname: &str) -> &str {
    fullname
        .strip_suffix(SAMSUNG_SERVICE_TYPE)
        .map_or(fullname, |name| name.trim_end_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_name() {
        assert_eq!(instance_name("Living Room._samsungmsf._tcp.local."), "Living Room");
        assert_eq!(instance_name("odd-name"), "odd-name");
    }

    #[test]
    fn test_service_handle_from_txt_records() {
        let props = [
            ("id", "uuid:9f3c"),
            ("fn", "[TV] Bedroom"),
            ("se", "http://192.168.1.9:8001/api/v2/"),
        ];
        let info = ServiceInfo::new(
            SAMSUNG_SERVICE_TYPE,
            "Bedroom",
            "bedroom.local.",
            "192.168.1.9",
            8001,
            &props[..],
        )
        .unwrap();
        let handle = service_handle(&info).unwrap();
        assert_eq!(handle.id, "uuid:9f3c");
        assert_eq!(handle.name, "[TV] Bedroom");
        assert_eq!(handle.uri, "http://192.168.1.9:8001/api/v2/");
    }

    #[test]
    fn test_service_handle_falls_back_to_address() {
        let info = ServiceInfo::new(
            SAMSUNG_SERVICE_TYPE,
            "Kitchen",
            "kitchen.local.",
            "10.0.0.4",
            8001,
            None::<HashMap<String, String>>,
        )
        .unwrap();
        let handle = service_handle(&info).unwrap();
        assert_eq!(handle.name, "Kitchen");
        assert_eq!(handle.uri, "http://10.0.0.4:8001/api/v2/");
        assert_eq!(handle.id, info.get_fullname());
    }

    #[test]
    fn test_device_info_response_shape() {
        let body = r#"{"device":{"wifiMac":"a0:b1:c2:d3:e4:f5","name":"[TV] Bedroom","modelName":"UE55"},"name":"x"}"#;
        let parsed: DeviceInfoResponse = serde_json::from_str(body).unwrap();
        let device = parsed.device.unwrap();
        assert_eq!(device.wifi_mac.as_deref(), Some("a0:b1:c2:d3:e4:f5"));
        assert_eq!(device.model_name.as_deref(), Some("UE55"));
    }
}
