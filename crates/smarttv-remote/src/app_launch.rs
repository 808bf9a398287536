//! # App Launch
//!
//! Starts applications on a Samsung TV through a vendor service handle
//! obtained during SDK discovery.
//!
//! The flow mirrors the multiscreen application API: create an application
//! handle for `(app id, channel URI)`, connect it (which launches the app),
//! then release the application channel shortly after so the app keeps
//! running on its own. Channels not yet released are tracked in
//! [`HeldApps`] and can be released together with [`release_all`].
//!
//! [`install_app`] opens the TV's store page for an application instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::{RemoteError, RemoteResult};
use crate::model::{ServiceHandle, control_host};

/// How long a launch may take before it is reported as failed.
pub const LAUNCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before the application channel is released after a launch.
pub const RELEASE_DELAY: Duration = Duration::from_secs(2);

/// REST port of the application API.
const APPLICATIONS_PORT: u16 = 8001;

/// A TV application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TvApp {
    pub id: &'static str,
    pub name: &'static str,
}

impl TvApp {
    /// `com.samsung.multiscreen.tvapp.<lowercased name>`
    pub fn channel_uri(&self) -> String {
        channel_uri_for(self.name)
    }
}

fn channel_uri_for(name: &str) -> String {
    format!("com.samsung.multiscreen.tvapp.{}", name.to_lowercase())
}

/// Well-known Samsung app ids.
pub const KNOWN_APPS: &[TvApp] = &[
    TvApp { id: "111299001912", name: "YouTube" },
    TvApp { id: "3201907018807", name: "Netflix" },
    TvApp { id: "3201901017640", name: "Disney+" },
    TvApp { id: "3201512006785", name: "Amazon Prime Video" },
    TvApp { id: "3201601007625", name: "Hulu" },
    TvApp { id: "3201601007230", name: "HBO Max" },
    TvApp { id: "3201506003488", name: "Twitch" },
    TvApp { id: "111012010001", name: "Samsung Internet" },
    TvApp { id: "org.tizen.browser", name: "Web Browser" },
];

/// Look an app up by id or by (case-insensitive) name.
pub fn find_app(query: &str) -> Option<&'static TvApp> {
    let query = query.trim();
    KNOWN_APPS
        .iter()
        .find(|app| app.id == query || app.name.eq_ignore_ascii_case(query))
}

/// A created, not necessarily connected, application on a TV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub app_id: String,
    pub channel_uri: String,
    pub host: String,
}

/// Vendor application API.
pub trait AppLauncher: Send + Sync {
    fn create_application(
        &self,
        service: &ServiceHandle,
        app_id: &str,
        channel_uri: &str,
    ) -> RemoteResult<AppHandle>;

    /// Launch the application.
    fn connect<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>>;

    /// Release the application channel.
    fn disconnect<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>>;

    /// Open the installation page for the application.
    fn install<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>>;
}

/// Application channels launched and not yet released, keyed by app id.
#[derive(Debug, Clone, Default)]
pub struct HeldApps {
    inner: Arc<Mutex<HashMap<String, AppHandle>>>,
}

impl HeldApps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, app_id: &str) -> bool {
        self.lock().contains_key(app_id)
    }

    fn insert(&self, app: AppHandle) {
        self.lock().insert(app.app_id.clone(), app);
    }

    /// Take `app` out only if it is still the handle that was stored.
    fn take_if_same(&self, app: &AppHandle) -> bool {
        let mut held = self.lock();
        if held.get(&app.app_id) == Some(app) {
            held.remove(&app.app_id);
            true
        } else {
            false
        }
    }

    fn drain(&self) -> Vec<AppHandle> {
        self.lock().drain().map(|(_, app)| app).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, AppHandle>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`AppLauncher`] over the TV's REST endpoint
/// `http://<host>:8001/api/v2/applications/<app id>`.
#[derive(Debug, Clone)]
pub struct RestAppLauncher {
    http: reqwest::Client,
}

impl RestAppLauncher {
    /// # Errors
    /// Returns [`RemoteError::Http`] if the HTTP client cannot be built.
    pub fn new() -> RemoteResult<Self> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .timeout(LAUNCH_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    fn endpoint(app: &AppHandle) -> String {
        format!(
            "http://{}:{APPLICATIONS_PORT}/api/v2/applications/{}",
            app.host, app.app_id
        )
    }

    async fn post(&self, app: &AppHandle) -> RemoteResult<()> {
        let url = Self::endpoint(app);
        tracing::debug!(url, "Launching application");
        self.http.post(&url).send().await?.error_for_status()?;
        Ok(())
    }

    async fn delete(&self, app: &AppHandle) -> RemoteResult<()> {
        let url = Self::endpoint(app);
        self.http.delete(&url).send().await?.error_for_status()?;
        Ok(())
    }

    async fn put(&self, app: &AppHandle) -> RemoteResult<()> {
        let url = Self::endpoint(app);
        tracing::debug!(url, "Opening application install page");
        self.http.put(&url).send().await?.error_for_status()?;
        Ok(())
    }
}

impl AppLauncher for RestAppLauncher {
    fn create_application(
        &self,
        service: &ServiceHandle,
        app_id: &str,
        channel_uri: &str,
    ) -> RemoteResult<AppHandle> {
        let host = control_host(&service.uri).ok_or_else(|| RemoteError::InvalidHost {
            host: service.uri.clone(),
        })?;
        if app_id.trim().is_empty() {
            return Err(RemoteError::AppLaunchFailed {
                app: app_id.to_string(),
                reason: "empty application id".into(),
            });
        }
        Ok(AppHandle {
            app_id: app_id.to_string(),
            channel_uri: channel_uri.to_string(),
            host,
        })
    }

    fn connect<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(self.post(app))
    }

    fn disconnect<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(self.delete(app))
    }

    fn install<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(self.put(app))
    }
}

/// Known catalog entry for `app`, or the trimmed input used as both id and name.
fn resolve(app: &str) -> (String, String) {
    match find_app(app) {
        Some(known) => (known.id.to_string(), known.name.to_string()),
        None => (app.trim().to_string(), app.trim().to_string()),
    }
}

/// Launch `app` on the TV behind `service`.
///
/// Known ids and names resolve through [`KNOWN_APPS`]; anything else is
/// passed through as a raw app id. On success the channel is recorded in
/// `held` and released in the background after [`RELEASE_DELAY`], unless
/// [`release_all`] got to it first.
///
/// # Errors
/// Returns [`RemoteError::AppLaunchFailed`] when the launch fails or does not
/// complete within [`LAUNCH_TIMEOUT`].
pub async fn launch_app(
    launcher: Arc<dyn AppLauncher>,
    service: &ServiceHandle,
    app: &str,
    held: &HeldApps,
) -> RemoteResult<()> {
    let (app_id, app_name) = resolve(app);
    let channel_uri = channel_uri_for(&app_name);
    let handle = launcher.create_application(service, &app_id, &channel_uri)?;

    let launched = tokio::time::timeout(LAUNCH_TIMEOUT, launcher.connect(&handle)).await;
    match launched {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(app = %app_name, error = %e, "App launch failed");
            return Err(RemoteError::AppLaunchFailed {
                app: app_name,
                reason: e.to_string(),
            });
        }
        Err(_) => {
            tracing::warn!(app = %app_name, "App launch timed out");
            return Err(RemoteError::AppLaunchFailed {
                app: app_name,
                reason: format!("no answer within {}s", LAUNCH_TIMEOUT.as_secs()),
            });
        }
    }

    tracing::info!(app = %app_name, id = %app_id, "App launched");
    held.insert(handle.clone());
    let held = held.clone();
    tokio::spawn(async move {
        tokio::time::sleep(RELEASE_DELAY).await;
        if !held.take_if_same(&handle) {
            return;
        }
        if let Err(e) = launcher.disconnect(&handle).await {
            tracing::debug!(app = %handle.app_id, error = %e, "Releasing application channel failed");
        }
    });
    Ok(())
}

/// Open the store page for `app` on the TV behind `service`.
///
/// # Errors
/// Returns [`RemoteError::AppLaunchFailed`] when the TV rejects the request
/// or does not answer within [`LAUNCH_TIMEOUT`].
pub async fn install_app(
    launcher: &dyn AppLauncher,
    service: &ServiceHandle,
    app: &str,
) -> RemoteResult<()> {
    let (app_id, app_name) = resolve(app);
    let handle = launcher.create_application(service, &app_id, &channel_uri_for(&app_name))?;

    match tokio::time::timeout(LAUNCH_TIMEOUT, launcher.install(&handle)).await {
        Ok(Ok(())) => {
            tracing::info!(app = %app_name, id = %app_id, "Install page opened");
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::warn!(app = %app_name, error = %e, "App install failed");
            Err(RemoteError::AppLaunchFailed {
                app: app_name,
                reason: format!("install: {e}"),
            })
        }
        Err(_) => Err(RemoteError::AppLaunchFailed {
            app: app_name,
            reason: format!("install: no answer within {}s", LAUNCH_TIMEOUT.as_secs()),
        }),
    }
}

/// Release every held application channel now. Returns how many were held.
pub async fn release_all(launcher: &dyn AppLauncher, held: &HeldApps) -> usize {
    let apps = held.drain();
    for app in &apps {
        if let Err(e) = launcher.disconnect(app).await {
            tracing::debug!(app = %app.app_id, error = %e, "Releasing application channel failed");
        }
    }
    if !apps.is_empty() {
        tracing::debug!(count = apps.len(), "Released application channels");
    }
    apps.len()
}
