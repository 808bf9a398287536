//! # Connection Manager
//!
//! Owns the [`TvSession`] and publishes a [`ConnectionSnapshot`] that UIs and
//! the dispatch facade read.
//!
//! A pump task consumes [`SessionEvent`]s and is the only place that moves
//! the snapshot to `Connected` or `Failed` after a connect call returns.
//! Events from superseded attempts are ignored by generation.
//!
//! ## Reconnection Behavior
//!
//! When `[reconnect] enabled = true` and an established session drops, the
//! manager:
//! 1. Publishes `Disconnected` with the reason
//! 2. Waits `base_delay_secs`, then reconnects with exponential backoff
//! 3. Stops after `max_attempts` tries, or as soon as the caller connects
//!    or disconnects explicitly
//!
//! Pairing rejections are never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::app_launch::{self, AppLauncher, HeldApps};
use crate::command::TvCommand;
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::model::{DiscoveredTv, ServiceHandle};
use crate::retry::{RetryPolicy, with_retry};
use crate::session::{SessionEvent, SessionState, TvSession};
use crate::token_store::TokenStore;

/// Connection status as seen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Published manager state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    /// The paired TV, set only while `Connected`.
    pub connected_tv: Option<DiscoveredTv>,
    /// The TV of the most recent connect attempt.
    pub candidate: Option<DiscoveredTv>,
    pub last_error: Option<String>,
}

impl ConnectionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// The connected TV, else the last candidate.
    pub fn current_tv(&self) -> Option<&DiscoveredTv> {
        self.connected_tv.as_ref().or(self.candidate.as_ref())
    }
}

struct Core {
    config: Arc<RemoteConfig>,
    session: tokio::sync::Mutex<TvSession>,
    /// Generation whose events the pump accepts.
    expected: AtomicU64,
    state_tx: watch::Sender<ConnectionSnapshot>,
    service: Mutex<Option<ServiceHandle>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
}

impl Core {
    async fn open(&self, tv: &DiscoveredTv) -> RemoteResult<()> {
        let host = tv.control_host().ok_or_else(|| RemoteError::InvalidHost {
            host: tv.ip_address.clone(),
        })?;

        self.state_tx.send_modify(|s| {
            s.status = ConnectionStatus::Connecting;
            s.candidate = Some(tv.clone());
            s.connected_tv = None;
            s.last_error = None;
        });

        let mut session = self.session.lock().await;
        let generation = session.generation() + 1;
        self.expected.store(generation, Ordering::SeqCst);
        tracing::info!(name = %tv.name, host, generation, "Connecting to TV");
        let result = session.connect(&host).await;
        drop(session);

        if let Err(e) = &result {
            self.state_tx.send_if_modified(|s| {
                if self.expected.load(Ordering::SeqCst) != generation
                    || s.status != ConnectionStatus::Connecting
                {
                    return false;
                }
                s.status = ConnectionStatus::Failed;
                s.last_error = Some(e.to_string());
                true
            });
        }
        result
    }

    /// Wait for the pending attempt to pair or fail.
    async fn wait_for_pairing(&self) -> RemoteResult<()> {
        let limit = Duration::from_secs(
            self.config.timeouts.handshake_timeout_secs + self.config.timeouts.connect_timeout_secs + 1,
        );
        let mut rx = self.state_tx.subscribe();
        let settled = tokio::time::timeout(limit, rx.wait_for(|s| s.status != ConnectionStatus::Connecting))
            .await
            .map_err(|_| RemoteError::Timeout {
                seconds: limit.as_secs(),
            })?
            .map_err(|_| RemoteError::NotConnected)?
            .clone();

        match settled.status {
            ConnectionStatus::Connected => Ok(()),
            _ => Err(RemoteError::HandshakeFailed {
                reason: settled
                    .last_error
                    .unwrap_or_else(|| "connection closed during pairing".into()),
            }),
        }
    }

    fn abort_reconnect(&self) {
        let handle = self
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Auto-reconnect cancelled");
        }
    }

    fn apply(self: &Arc<Self>, event: SessionEvent) {
        if event.generation() != self.expected.load(Ordering::SeqCst) {
            tracing::trace!(?event, "Ignoring event from a superseded attempt");
            return;
        }

        let mut lost_tv = None;
        self.state_tx.send_modify(|s| match event {
            SessionEvent::Connected { .. } => {
                s.status = ConnectionStatus::Connected;
                s.connected_tv = s.candidate.clone();
                s.last_error = None;
            }
            SessionEvent::Failed { reason, .. } => {
                s.status = ConnectionStatus::Failed;
                s.connected_tv = None;
                s.last_error = Some(reason);
            }
            SessionEvent::Disconnected { reason, .. } => {
                if s.status == ConnectionStatus::Connecting {
                    s.status = ConnectionStatus::Failed;
                } else {
                    lost_tv = s.connected_tv.take();
                    s.status = ConnectionStatus::Disconnected;
                }
                s.connected_tv = None;
                s.last_error = Some(reason);
            }
        });

        if let Some(tv) = lost_tv {
            tracing::warn!(name = %tv.name, "Connection to TV lost");
            if self.config.reconnect.enabled {
                self.spawn_reconnect(tv);
            }
        }
    }

    fn spawn_reconnect(self: &Arc<Self>, tv: DiscoveredTv) {
        let core = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let policy = RetryPolicy::from(&core.config.reconnect);
            tokio::time::sleep(Duration::from_secs(core.config.reconnect.base_delay_secs)).await;
            let result = with_retry(&policy, || {
                let core = &core;
                let tv = &tv;
                async move {
                    core.open(tv).await?;
                    core.wait_for_pairing().await
                }
            })
            .await;
            match result {
                Ok(()) => tracing::info!(name = %tv.name, "Reconnected to TV"),
                Err(e) => tracing::warn!(name = %tv.name, error = %e, "Auto-reconnect gave up"),
            }
        });
        let previous = self
            .reconnect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

/// Connects to one TV at a time and tracks the connection.
pub struct ConnectionManager {
    core: Arc<Core>,
    launcher: Option<Arc<dyn AppLauncher>>,
    held_apps: HeldApps,
    pump: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create the manager and its session. Must be called from within a
    /// Tokio runtime.
    pub fn new(config: Arc<RemoteConfig>, tokens: Arc<dyn TokenStore>) -> Self {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let session = TvSession::new(Arc::clone(&config), tokens, events_tx);
        let (state_tx, _) = watch::channel(ConnectionSnapshot::default());

        let core = Arc::new(Core {
            config,
            session: tokio::sync::Mutex::new(session),
            expected: AtomicU64::new(0),
            state_tx,
            service: Mutex::new(None),
            reconnect: Mutex::new(None),
        });

        let pump = {
            let core = Arc::clone(&core);
            tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    core.apply(event);
                }
                tracing::debug!("Session event pump exiting");
            })
        };

        Self {
            core,
            launcher: None,
            held_apps: HeldApps::new(),
            pump,
        }
    }

    /// Attach the application launcher used by [`launch_app`](Self::launch_app).
    #[must_use]
    pub fn with_app_launcher(mut self, launcher: Arc<dyn AppLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Begin connecting to `tv`. Returns once the transport is open; the
    /// snapshot turns `Connected` when the TV acknowledges pairing.
    ///
    /// `service` is the vendor handle from discovery, retained for app launch.
    ///
    /// # Errors
    /// [`RemoteError::InvalidHost`] if the TV record has no usable address,
    /// otherwise whatever [`TvSession::connect`] returns.
    pub async fn connect_to_tv(
        &self,
        tv: &DiscoveredTv,
        service: Option<ServiceHandle>,
    ) -> RemoteResult<()> {
        self.core.abort_reconnect();
        *self
            .core
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = service;
        self.core.open(tv).await
    }

    /// Wait until the pending connect attempt pairs or fails.
    ///
    /// # Errors
    /// [`RemoteError::HandshakeFailed`] if the attempt failed,
    /// [`RemoteError::Timeout`] if it never settled.
    pub async fn wait_for_pairing(&self) -> RemoteResult<()> {
        self.core.wait_for_pairing().await
    }

    /// Disconnect from the current TV, releasing any application channels
    /// still held. Idempotent.
    pub async fn disconnect_from_tv(&self) {
        self.core.abort_reconnect();
        if let Some(launcher) = &self.launcher {
            app_launch::release_all(launcher.as_ref(), &self.held_apps).await;
        }
        {
            let mut session = self.core.session.lock().await;
            session.disconnect().await;
            self.core
                .expected
                .store(session.generation(), Ordering::SeqCst);
        }
        self.core
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let was = self.core.state_tx.borrow().status;
        self.core.state_tx.send_if_modified(|s| {
            let next = ConnectionSnapshot::default();
            let changed = *s != next;
            *s = next;
            changed
        });
        if was != ConnectionStatus::Disconnected {
            tracing::info!("Disconnected from TV");
        }
    }

    /// # Errors
    /// [`RemoteError::NotConnected`] unless connected.
    pub async fn send_command(&self, command: TvCommand) -> RemoteResult<()> {
        self.ensure_connected("command", command.name())?;
        self.core.session.lock().await.send_command(command)
    }

    /// # Errors
    /// [`RemoteError::NotConnected`] unless connected.
    pub async fn send_text(&self, text: &str) -> RemoteResult<()> {
        self.ensure_connected("text", "")?;
        self.core.session.lock().await.send_text(text)
    }

    /// Launch an app by catalog name, catalog id, or raw app id.
    ///
    /// # Errors
    /// [`RemoteError::CapabilityUnavailable`] without a launcher or a
    /// retained service handle, [`RemoteError::AppLaunchFailed`] otherwise.
    pub async fn launch_app(&self, app: &str) -> RemoteResult<()> {
        let (launcher, service) = self.app_target()?;
        app_launch::launch_app(launcher, &service, app, &self.held_apps).await
    }

    /// Open the TV's install page for an app.
    ///
    /// # Errors
    /// Same as [`launch_app`](Self::launch_app).
    pub async fn install_app(&self, app: &str) -> RemoteResult<()> {
        let (launcher, service) = self.app_target()?;
        app_launch::install_app(launcher.as_ref(), &service, app).await
    }

    /// Application channels launched and not yet released.
    pub fn held_apps(&self) -> &HeldApps {
        &self.held_apps
    }

    pub fn has_app_launcher(&self) -> bool {
        self.launcher.is_some()
    }

    /// The vendor service handle retained from the last connect.
    pub fn service(&self) -> Option<ServiceHandle> {
        self.core
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.core.state_tx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.core.state_tx.borrow().is_connected()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.core.state_tx.subscribe()
    }

    pub async fn session_state(&self) -> SessionState {
        self.core.session.lock().await.state()
    }

    fn app_target(&self) -> RemoteResult<(Arc<dyn AppLauncher>, ServiceHandle)> {
        let unavailable = || RemoteError::CapabilityUnavailable {
            capability: "app-launch",
        };
        let launcher = self.launcher.clone().ok_or_else(unavailable)?;
        let service = self.service().ok_or_else(unavailable)?;
        Ok((launcher, service))
    }

    fn ensure_connected(&self, what: &'static str, detail: &str) -> RemoteResult<()> {
        if self.is_connected() {
            return Ok(());
        }
        tracing::warn!(what, detail, "Not connected to a TV, nothing sent");
        Err(RemoteError::NotConnected)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.core.abort_reconnect();
        self.pump.abort();
    }
}
