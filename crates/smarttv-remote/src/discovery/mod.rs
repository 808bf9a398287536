//! # Network Discovery
//!
//! Finds TVs on the local network with two strategies running side by side:
//!
//! - **SDK-driven**: a [`ServiceBrowser`] reports vendor services; each new
//!   service gets a device-info fetch (for the MAC address) before it is
//!   published.
//! - **Active subnet probe**: every host in the local /24 is probed over
//!   HTTP through an [`HttpProber`] (see [`probe`]).
//!
//! ## Architecture
//!
//! ```text
//!  subnet task ──┐
//!                ├─► mpsc<Candidate> ─► collector ─► watch<DiscoveryState>
//!  sdk task ─────┘                      (single writer, dedup)
//! ```
//!
//! A scan ends at the earlier of: both strategies finished, or the scan
//! budget elapsed. [`DiscoveryService::stop_discovery`] ends it early and
//! keeps what was found; [`DiscoveryService::start_discovery`] during a scan
//! restarts from an empty list.

pub mod mdns;
pub mod probe;
pub mod upnp;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::RemoteConfig;
use crate::model::{DiscoveredTv, ServiceHandle, control_host};

pub use mdns::{BrowseEvent, DeviceInfo, MdnsBrowser, ServiceBrowser};
pub use probe::{HttpProber, HttpReply, ReqwestProber};

/// Published discovery results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryState {
    pub tvs: Vec<DiscoveredTv>,
    pub scanning: bool,
}

/// Work item handed from a strategy to the collector.
#[derive(Debug)]
enum Candidate {
    Found(DiscoveredTv, Option<ServiceHandle>),
    Lost(ServiceHandle),
}

type ServiceMap = Arc<Mutex<HashMap<String, ServiceHandle>>>;

/// Discovers TVs and publishes a de-duplicated list.
pub struct DiscoveryService {
    config: Arc<RemoteConfig>,
    prober: Option<Arc<dyn HttpProber>>,
    browser: Option<Arc<dyn ServiceBrowser>>,
    state_tx: watch::Sender<DiscoveryState>,
    services: ServiceMap,
    scan: Mutex<Option<CancellationToken>>,
}

impl DiscoveryService {
    /// Build a discovery service. Either strategy may be absent; each is
    /// also gated by the `[discovery]` config switches.
    pub fn new(
        config: Arc<RemoteConfig>,
        prober: Option<Arc<dyn HttpProber>>,
        browser: Option<Arc<dyn ServiceBrowser>>,
    ) -> Self {
        let (state_tx, _) = watch::channel(DiscoveryState::default());
        Self {
            config,
            prober,
            browser,
            state_tx,
            services: Arc::new(Mutex::new(HashMap::new())),
            scan: Mutex::new(None),
        }
    }

    /// Start a scan, restarting from scratch if one is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_discovery(&self) {
        self.cancel_scan();
        if let Some(browser) = &self.browser {
            browser.stop();
        }

        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.state_tx.send_replace(DiscoveryState {
            tvs: Vec::new(),
            scanning: true,
        });

        let session = CancellationToken::new();
        let work = session.child_token();
        let (tx, rx) = mpsc::channel(64);

        let mut strategies = 0;
        if self.config.discovery.subnet_probe {
            if let Some(prober) = &self.prober {
                tokio::spawn(run_subnet_probe(
                    Arc::clone(&self.config),
                    Arc::clone(prober),
                    tx.clone(),
                    work.clone(),
                ));
                strategies += 1;
            }
        }
        if self.config.discovery.mdns {
            if let Some(browser) = &self.browser {
                match browser.start() {
                    Ok(events) => {
                        tokio::spawn(run_sdk_browse(
                            Arc::clone(&self.config),
                            Arc::clone(browser),
                            events,
                            self.state_tx.subscribe(),
                            tx.clone(),
                            work.clone(),
                        ));
                        strategies += 1;
                    }
                    Err(e) => tracing::warn!(error = %e, "Service browser failed to start"),
                }
            }
        }
        drop(tx);

        let budget = self.config.timeouts.scan_budget();
        {
            let work = work.clone();
            tokio::spawn(async move {
                tokio::select! {
                    () = tokio::time::sleep(budget) => {
                        tracing::debug!(budget_secs = budget.as_secs(), "Scan budget elapsed");
                        work.cancel();
                    }
                    () = work.cancelled() => {}
                }
            });
        }

        tokio::spawn(run_collector(
            rx,
            self.state_tx.clone(),
            Arc::clone(&self.services),
            self.browser.clone(),
            session.clone(),
            work,
        ));

        tracing::info!(strategies, "Discovery started");
        *self.scan.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    /// Stop the current scan, keeping published results. Idempotent.
    pub fn stop_discovery(&self) {
        let was_running = self.cancel_scan();
        if let Some(browser) = &self.browser {
            browser.stop();
        }
        self.state_tx.send_if_modified(|state| {
            let changed = state.scanning;
            state.scanning = false;
            changed
        });
        if was_running {
            tracing::info!("Discovery stopped");
        }
    }

    /// Snapshot of the published list.
    pub fn discovered(&self) -> Vec<DiscoveredTv> {
        self.state_tx.borrow().tvs.clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.state_tx.borrow().scanning
    }

    /// Watch the published state.
    pub fn subscribe(&self) -> watch::Receiver<DiscoveryState> {
        self.state_tx.subscribe()
    }

    /// The vendor service handle behind an SDK-found TV.
    pub fn service_for(&self, tv: &DiscoveredTv) -> Option<ServiceHandle> {
        self.services
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tv.id)
            .cloned()
    }

    fn cancel_scan(&self) -> bool {
        let previous = self
            .scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match previous {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.cancel_scan();
        if let Some(browser) = &self.browser {
            browser.stop();
        }
    }
}

/// Two records describe the same TV when ids match or hosts match.
fn same_tv(a: &DiscoveredTv, b: &DiscoveredTv) -> bool {
    if a.id == b.id {
        return true;
    }
    match (control_host(&a.ip_address), control_host(&b.ip_address)) {
        (Some(x), Some(y)) => x == y,
        _ => a.ip_address == b.ip_address,
    }
}

/// Sole writer of the published list while a scan runs.
async fn run_collector(
    mut rx: mpsc::Receiver<Candidate>,
    state_tx: watch::Sender<DiscoveryState>,
    services: ServiceMap,
    browser: Option<Arc<dyn ServiceBrowser>>,
    session: CancellationToken,
    work: CancellationToken,
) {
    loop {
        let candidate = tokio::select! {
            () = session.cancelled() => return,
            candidate = rx.recv() => candidate,
        };
        let Some(candidate) = candidate else {
            break;
        };

        match candidate {
            Candidate::Found(tv, handle) => {
                state_tx.send_if_modified(|state| {
                    if session.is_cancelled() || state.tvs.iter().any(|t| same_tv(t, &tv)) {
                        return false;
                    }
                    if let Some(handle) = handle {
                        services
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(tv.id.clone(), handle);
                    }
                    tracing::info!(id = %tv.id, name = %tv.name, ip = %tv.ip_address, "TV discovered");
                    state.tvs.push(tv);
                    true
                });
            }
            Candidate::Lost(handle) => {
                state_tx.send_if_modified(|state| {
                    if session.is_cancelled() {
                        return false;
                    }
                    let mut map = services.lock().unwrap_or_else(PoisonError::into_inner);
                    // Name matches only count for entries that came from the browser.
                    let before = state.tvs.len();
                    state.tvs.retain(|t| {
                        let lost = t.id == handle.id || (t.name == handle.name && map.contains_key(&t.id));
                        !lost
                    });
                    let removed = state.tvs.len() != before;
                    if removed {
                        map.retain(|id, h| *id != handle.id && h.name != handle.name);
                        tracing::info!(id = %handle.id, name = %handle.name, "TV lost");
                    }
                    removed
                });
            }
        }
    }

    // Every strategy has finished or the budget cancelled them.
    work.cancel();
    if session.is_cancelled() {
        return;
    }
    if let Some(browser) = browser {
        browser.stop();
    }
    state_tx.send_if_modified(|state| {
        if session.is_cancelled() {
            return false;
        }
        let changed = state.scanning;
        state.scanning = false;
        changed
    });
    tracing::info!(found = state_tx.borrow().tvs.len(), "Discovery finished");
}

async fn run_subnet_probe(
    config: Arc<RemoteConfig>,
    prober: Arc<dyn HttpProber>,
    tx: mpsc::Sender<Candidate>,
    work: CancellationToken,
) {
    let discovery = &config.discovery;
    let net = match probe::resolve_subnet(discovery) {
        Ok(net) => net,
        Err(e) => {
            tracing::warn!(error = %e, "Subnet probe skipped");
            return;
        }
    };
    let hosts = probe::host_window(net, discovery.first_host, discovery.last_host);
    tracing::debug!(subnet = %net, hosts = hosts.len(), "Probing subnet");

    let semaphore = Arc::new(Semaphore::new(discovery.max_concurrent_probes.max(1)));
    let timeout = config.timeouts.probe_timeout();

    let mut join_set = JoinSet::new();
    for ip in hosts {
        let semaphore = Arc::clone(&semaphore);
        let prober = Arc::clone(&prober);
        let config = Arc::clone(&config);
        let work = work.clone();
        join_set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            tokio::select! {
                () = work.cancelled() => None,
                tv = probe::probe_host(prober.as_ref(), ip, &config.discovery, timeout) => tv,
            }
        });
    }

    loop {
        let joined = tokio::select! {
            () = work.cancelled() => break,
            joined = join_set.join_next() => joined,
        };
        let Some(joined) = joined else {
            break;
        };
        match joined {
            Ok(Some(tv)) => {
                if tx.send(Candidate::Found(tv, None)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(error = %e, "Probe task failed"),
        }
    }
    join_set.abort_all();
}

async fn run_sdk_browse(
    config: Arc<RemoteConfig>,
    browser: Arc<dyn ServiceBrowser>,
    mut events: mpsc::Receiver<BrowseEvent>,
    published: watch::Receiver<DiscoveryState>,
    tx: mpsc::Sender<Candidate>,
    work: CancellationToken,
) {
    let timeout = config.timeouts.device_info_timeout();
    let mut in_flight: HashSet<String> = HashSet::new();
    let mut lookups = JoinSet::new();

    loop {
        tokio::select! {
            () = work.cancelled() => break,
            Some(done) = lookups.join_next(), if !lookups.is_empty() => {
                if let Ok(id) = done {
                    in_flight.remove(&id);
                }
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    BrowseEvent::Found(handle) => {
                        let host = control_host(&handle.uri);
                        let already = published.borrow().tvs.iter().any(|t| {
                            t.id == handle.id || (host.is_some() && t.control_host() == host)
                        });
                        if already || !in_flight.insert(handle.id.clone()) {
                            tracing::debug!(name = %handle.name, "Service already listed");
                            continue;
                        }
                        lookups.spawn(publish_with_device_info(
                            Arc::clone(&browser),
                            handle,
                            timeout,
                            tx.clone(),
                        ));
                    }
                    BrowseEvent::Lost(handle) => {
                        in_flight.remove(&handle.id);
                        if tx.send(Candidate::Lost(handle)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    lookups.abort_all();
}

/// Fetch device info, then publish. A failed fetch still publishes the
/// service, just without a MAC address. Returns the service id.
async fn publish_with_device_info(
    browser: Arc<dyn ServiceBrowser>,
    handle: ServiceHandle,
    timeout: std::time::Duration,
    tx: mpsc::Sender<Candidate>,
) -> String {
    let info = match tokio::time::timeout(timeout, browser.device_info(&handle, timeout)).await {
        Ok(Ok(info)) => info,
        Ok(Err(e)) => {
            tracing::warn!(name = %handle.name, error = %e, "Device info fetch failed");
            DeviceInfo::default()
        }
        Err(_) => {
            tracing::warn!(name = %handle.name, timeout_secs = timeout.as_secs(), "Device info fetch timed out");
            DeviceInfo::default()
        }
    };

    let tv = DiscoveredTv {
        id: handle.id.clone(),
        name: handle.name.clone(),
        manufacturer: "Samsung".to_string(),
        ip_address: handle.uri.clone(),
        model_name: info.model_name.or_else(|| Some("Samsung".to_string())),
        mac_address: info.mac_address,
    };
    let id = handle.id.clone();
    let _ = tx.send(Candidate::Found(tv, Some(handle))).await;
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv(id: &str, ip: &str) -> DiscoveredTv {
        DiscoveredTv {
            id: id.into(),
            name: format!("TV {id}"),
            manufacturer: "Samsung".into(),
            ip_address: ip.into(),
            model_name: None,
            mac_address: None,
        }
    }

    #[test]
    fn test_same_tv_by_id_or_host() {
        assert!(same_tv(&tv("a", "10.0.0.1"), &tv("a", "10.0.0.2")));
        assert!(same_tv(
            &tv("a", "10.0.0.1"),
            &tv("b", "http://10.0.0.1:8001/api/v2/")
        ));
        assert!(!same_tv(&tv("a", "10.0.0.1"), &tv("b", "10.0.0.11")));
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let service = DiscoveryService::new(Arc::new(RemoteConfig::default()), None, None);
        service.stop_discovery();
        service.stop_discovery();
        assert!(!service.is_scanning());
        assert!(service.discovered().is_empty());
    }

    #[tokio::test]
    async fn test_scan_without_strategies_finishes_immediately() {
        let service = DiscoveryService::new(Arc::new(RemoteConfig::default()), None, None);
        let mut rx = service.subscribe();
        service.start_discovery();
        let state = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            rx.wait_for(|s| !s.scanning),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert!(state.tvs.is_empty());
    }
}
