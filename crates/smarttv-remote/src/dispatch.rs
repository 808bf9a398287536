//! Command dispatch facade.
//!
//! [`RemoteControl`] is the one entry point a UI needs: it turns a
//! [`RemoteAction`] into the right manager call and refuses actions whose
//! capability is currently unavailable.

use std::sync::Arc;

use crate::command::TvCommand;
use crate::error::{RemoteError, RemoteResult};
use crate::manager::ConnectionManager;
use crate::wol::{self, MacAddress};

/// Something the user asked the remote to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAction {
    Key(TvCommand),
    Text(String),
    /// Catalog name, catalog id, or raw app id.
    LaunchApp(String),
    /// Open the install page for an app.
    InstallApp(String),
    WakeOnLan,
}

impl RemoteAction {
    fn capability(&self) -> &'static str {
        match self {
            RemoteAction::Key(_) => "keys",
            RemoteAction::Text(_) => "text",
            RemoteAction::LaunchApp(_) | RemoteAction::InstallApp(_) => "app-launch",
            RemoteAction::WakeOnLan => "wake-on-lan",
        }
    }
}

/// Which actions are usable right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub keys: bool,
    pub text: bool,
    pub app_launch: bool,
    pub wake_on_lan: bool,
}

impl Capabilities {
    pub fn allows(&self, action: &RemoteAction) -> bool {
        match action {
            RemoteAction::Key(_) => self.keys,
            RemoteAction::Text(_) => self.text,
            RemoteAction::LaunchApp(_) | RemoteAction::InstallApp(_) => self.app_launch,
            RemoteAction::WakeOnLan => self.wake_on_lan,
        }
    }
}

/// Remote-control facade over a [`ConnectionManager`].
#[derive(Clone)]
pub struct RemoteControl {
    manager: Arc<ConnectionManager>,
}

impl RemoteControl {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    pub fn capabilities(&self) -> Capabilities {
        let snapshot = self.manager.snapshot();
        let connected = snapshot.is_connected();
        Capabilities {
            keys: connected,
            text: connected,
            app_launch: self.manager.has_app_launcher() && self.manager.service().is_some(),
            wake_on_lan: self.wake_target().is_some(),
        }
    }

    /// Perform `action`.
    ///
    /// # Errors
    /// [`RemoteError::NotConnected`] for keys or text while disconnected,
    /// [`RemoteError::CapabilityUnavailable`] for app launch or wake-on-LAN
    /// without the needed handle or MAC, otherwise the underlying failure.
    pub async fn dispatch(&self, action: RemoteAction) -> RemoteResult<()> {
        let capabilities = self.capabilities();
        if !capabilities.allows(&action) {
            tracing::warn!(capability = action.capability(), ?action, "Action unavailable");
            return Err(match action {
                RemoteAction::Key(_) | RemoteAction::Text(_) => RemoteError::NotConnected,
                other => RemoteError::CapabilityUnavailable {
                    capability: other.capability(),
                },
            });
        }

        match action {
            RemoteAction::Key(command) => self.manager.send_command(command).await,
            RemoteAction::Text(text) => self.manager.send_text(&text).await,
            RemoteAction::LaunchApp(app) => self.manager.launch_app(&app).await,
            RemoteAction::InstallApp(app) => self.manager.install_app(&app).await,
            RemoteAction::WakeOnLan => {
                let mac = self.wake_target().ok_or(RemoteError::CapabilityUnavailable {
                    capability: "wake-on-lan",
                })?;
                wol::wake_on_lan(mac, None).await
            }
        }
    }

    fn wake_target(&self) -> Option<MacAddress> {
        let snapshot = self.manager.snapshot();
        let raw = snapshot.current_tv()?.mac_address.as_deref()?;
        match MacAddress::parse(raw) {
            Ok(mac) => Some(mac),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring unusable MAC address");
                None
            }
        }
    }
}
