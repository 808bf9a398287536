//! # Configuration
//!
//! [`RemoteConfig`] holds everything needed to discover TVs and open a
//! control channel.
//!
//! ## Loading Priority
//!
//! Configuration is loaded from the first source that provides a value:
//!
//! 1. Explicit struct fields (programmatic construction)
//! 2. TOML config file at an explicit path
//! 3. The file named by the `SMARTTV_CONFIG` environment variable
//! 4. `./smarttv.toml` in the current directory
//! 5. `~/.config/smarttv-remote/smarttv.toml`
//! 6. Built-in defaults
//!
//! `SMARTTV_APP_NAME`, `SMARTTV_TOKEN_PATH` and `SMARTTV_SUBNET` override the
//! corresponding fields regardless of where the rest came from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RemoteError, RemoteResult};
use crate::tls;

/// Application name presented to the TV during pairing.
pub const DEFAULT_APP_NAME: &str = "SmartRemote";

/// Secure WebSocket port of the Samsung remote-control API.
pub const DEFAULT_CONTROL_PORT: u16 = 8002;

/// Channel path of the Samsung remote-control API.
pub const DEFAULT_CONTROL_CHANNEL: &str = "samsung.remote.control";

/// Default per-probe HTTP timeout in milliseconds.
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_500;

/// Default device-info fetch timeout in seconds.
const DEFAULT_DEVICE_INFO_TIMEOUT_SECS: u64 = 5;

/// Default wall-clock budget of one discovery session in seconds.
const DEFAULT_SCAN_BUDGET_SECS: u64 = 6;

/// Default WebSocket open timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default pairing handshake timeout in seconds.
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

/// Default keep-alive interval in seconds.
const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 30;

/// Default upper bound on concurrently probed hosts, enough for a whole /24.
const DEFAULT_MAX_CONCURRENT_PROBES: usize = 256;

/// Default reconnect base delay in seconds.
const DEFAULT_RECONNECT_BASE_DELAY_SECS: u64 = 1;

/// Default reconnect max delay in seconds.
const DEFAULT_RECONNECT_MAX_DELAY_SECS: u64 = 30;

/// Default max reconnect attempts.
const DEFAULT_RECONNECT_MAX_ATTEMPTS: u32 = 3;

/// Well-known UPnP device description paths.
const DEFAULT_UPNP_PATHS: &[&str] = &[
    "/description.xml",
    "/rootDesc.xml",
    "/upnp/desc.xml",
    "/device.xml",
];

/// Common TV control ports sniffed when no UPnP description answers.
const DEFAULT_PROBE_PORTS: &[u16] = &[8001, 3000, 80, 7001, 1925, 9080];

/// Configuration for discovering and controlling TVs.
///
/// # Examples
///
/// ## From a TOML file
///
/// ```no_run
/// use smarttv_remote::config::RemoteConfig;
///
/// let config = RemoteConfig::from_file("smarttv.toml").expect("Bad config");
/// ```
///
/// ## Programmatic
///
/// ```
/// use smarttv_remote::config::RemoteConfig;
///
/// let mut config = RemoteConfig::default();
/// config.app_name = "Living Room Remote".into();
/// assert_eq!(config.control.port, 8002);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Name shown on the TV's "allow this device?" prompt.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Where the pairing token is persisted. Defaults to the user config directory.
    #[serde(default)]
    pub token_path: Option<PathBuf>,

    /// Accept unverified certificates for public (non-RFC1918) hosts too.
    /// Only enable this for development/testing.
    #[serde(default)]
    pub allow_insecure_tls: bool,

    /// Control-channel endpoint settings.
    #[serde(default)]
    pub control: ControlConfig,

    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Liveness probe configuration.
    #[serde(default)]
    pub keepalive: KeepAliveConfig,

    /// Network discovery configuration.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Auto-reconnect configuration.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Control-channel endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// TCP port of the control WebSocket.
    #[serde(default = "default_control_port")]
    pub port: u16,

    /// Use `wss://` (true) or plain `ws://` (false).
    #[serde(default = "default_true")]
    pub secure: bool,

    /// Channel path under `/api/v2/channels/`.
    #[serde(default = "default_control_channel")]
    pub channel: String,
}

/// Timeout settings for network operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for each discovery HTTP probe, in milliseconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,

    /// Timeout for fetching device info after an SDK sighting, in seconds.
    #[serde(default = "default_device_info_timeout")]
    pub device_info_timeout_secs: u64,

    /// Wall-clock budget of one discovery session, in seconds.
    #[serde(default = "default_scan_budget")]
    pub scan_budget_secs: u64,

    /// Timeout for opening the control WebSocket, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for the pairing acknowledgement, in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

/// Periodic liveness probe on the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepAliveConfig {
    /// Enable the liveness probe.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Interval between pings, in seconds.
    #[serde(default = "default_keepalive_interval")]
    pub interval_secs: u64,
}

/// Network discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Browse for vendor services via mDNS.
    #[serde(default = "default_true")]
    pub mdns: bool,

    /// Actively probe the local subnet over HTTP.
    #[serde(default = "default_true")]
    pub subnet_probe: bool,

    /// Subnet to probe (e.g. `192.168.1.0/24`). Detected from the local
    /// interface when unset.
    #[serde(default)]
    pub subnet: Option<String>,

    /// First host number probed within the subnet.
    #[serde(default = "default_first_host")]
    pub first_host: u8,

    /// Last host number probed within the subnet.
    #[serde(default = "default_last_host")]
    pub last_host: u8,

    /// Maximum number of hosts probed at the same time.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Ports on which UPnP description paths are requested.
    #[serde(default = "default_upnp_ports")]
    pub upnp_ports: Vec<u16>,

    /// UPnP device description paths, tried in order.
    #[serde(default = "default_upnp_paths")]
    pub upnp_paths: Vec<String>,

    /// Ports sniffed with `GET /` for brand detection, tried in order.
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
}

/// Auto-reconnect behavior when an established control channel drops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Enable auto-reconnect after an unexpected drop.
    #[serde(default)]
    pub enabled: bool,

    /// Initial delay before the first retry, in seconds.
    #[serde(default = "default_reconnect_base_delay")]
    pub base_delay_secs: u64,

    /// Maximum delay between retries (exponential backoff cap), in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub max_delay_secs: u64,

    /// Maximum number of reconnect attempts.
    #[serde(default = "default_reconnect_max_attempts")]
    pub max_attempts: u32,
}

// ─── Defaults ───────────────────────────────────────────────────────────

fn default_app_name() -> String {
    DEFAULT_APP_NAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_control_port() -> u16 {
    DEFAULT_CONTROL_PORT
}

fn default_control_channel() -> String {
    DEFAULT_CONTROL_CHANNEL.to_string()
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_device_info_timeout() -> u64 {
    DEFAULT_DEVICE_INFO_TIMEOUT_SECS
}

fn default_scan_budget() -> u64 {
    DEFAULT_SCAN_BUDGET_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_handshake_timeout() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}

fn default_keepalive_interval() -> u64 {
    DEFAULT_KEEPALIVE_INTERVAL_SECS
}

fn default_first_host() -> u8 {
    1
}

fn default_last_host() -> u8 {
    254
}

fn default_max_concurrent_probes() -> usize {
    DEFAULT_MAX_CONCURRENT_PROBES
}

fn default_upnp_ports() -> Vec<u16> {
    vec![80]
}

fn default_upnp_paths() -> Vec<String> {
    DEFAULT_UPNP_PATHS.iter().map(|p| (*p).to_string()).collect()
}

fn default_probe_ports() -> Vec<u16> {
    DEFAULT_PROBE_PORTS.to_vec()
}

fn default_reconnect_base_delay() -> u64 {
    DEFAULT_RECONNECT_BASE_DELAY_SECS
}

fn default_reconnect_max_delay() -> u64 {
    DEFAULT_RECONNECT_MAX_DELAY_SECS
}

fn default_reconnect_max_attempts() -> u32 {
    DEFAULT_RECONNECT_MAX_ATTEMPTS
}

// ─── Default impls ──────────────────────────────────────────────────────

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            token_path: None,
            allow_insecure_tls: false,
            control: ControlConfig::default(),
            timeouts: TimeoutConfig::default(),
            keepalive: KeepAliveConfig::default(),
            discovery: DiscoveryConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_CONTROL_PORT,
            secure: true,
            channel: default_control_channel(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            device_info_timeout_secs: DEFAULT_DEVICE_INFO_TIMEOUT_SECS,
            scan_budget_secs: DEFAULT_SCAN_BUDGET_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
        }
    }
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_KEEPALIVE_INTERVAL_SECS,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mdns: true,
            subnet_probe: true,
            subnet: None,
            first_host: default_first_host(),
            last_host: default_last_host(),
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
            upnp_ports: default_upnp_ports(),
            upnp_paths: default_upnp_paths(),
            probe_ports: default_probe_ports(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_delay_secs: DEFAULT_RECONNECT_BASE_DELAY_SECS,
            max_delay_secs: DEFAULT_RECONNECT_MAX_DELAY_SECS,
            max_attempts: DEFAULT_RECONNECT_MAX_ATTEMPTS,
        }
    }
}

impl TimeoutConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn device_info_timeout(&self) -> Duration {
        Duration::from_secs(self.device_info_timeout_secs)
    }

    pub fn scan_budget(&self) -> Duration {
        Duration::from_secs(self.scan_budget_secs)
    }
}

// ─── RemoteConfig impl ─────────────────────────────────────────────────

impl RemoteConfig {
    /// Defaults with environment variable overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load config from a TOML file, with environment variable overrides.
    pub fn from_file(path: impl AsRef<Path>) -> RemoteResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| RemoteError::ConfigError {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let mut config: Self = toml::from_str(&contents)?;
        config.validate()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Discover and load config from the standard search path:
    ///
    /// 1. Explicit path (if `Some`)
    /// 2. `SMARTTV_CONFIG` environment variable
    /// 3. `./smarttv.toml`
    /// 4. `~/.config/smarttv-remote/smarttv.toml`
    ///
    /// Falls back to defaults (plus env overrides) if no file is found.
    pub fn discover(explicit_path: Option<&Path>) -> RemoteResult<Self> {
        if let Some(path) = explicit_path {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var("SMARTTV_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        let local_path = PathBuf::from("smarttv.toml");
        if local_path.exists() {
            return Self::from_file(&local_path);
        }

        if let Some(config_path) = config_dir().map(|dir| dir.join("smarttv.toml")) {
            if config_path.exists() {
                return Self::from_file(&config_path);
            }
        }

        Ok(Self::from_env())
    }

    /// Resolved location of the pairing-token file.
    pub fn token_file(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| {
            config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("tokens.json")
        })
    }

    /// Returns `true` if the TV certificate for `host` should be accepted
    /// without chain validation.
    ///
    /// TVs serve a self-signed certificate, so private (RFC1918) and
    /// loopback hosts are always relaxed. Any other host needs
    /// `allow_insecure_tls`.
    pub fn should_accept_invalid_certs(&self, host: &str) -> bool {
        if tls::is_local_network_host(host) {
            return true;
        }
        self.allow_insecure_tls
    }

    fn validate(&self) -> RemoteResult<()> {
        if self.discovery.first_host == 0 || self.discovery.first_host > self.discovery.last_host {
            return Err(RemoteError::ConfigError {
                reason: format!(
                    "discovery host window {}..={} is empty or includes the network address",
                    self.discovery.first_host, self.discovery.last_host
                ),
            });
        }
        if self.app_name.trim().is_empty() {
            return Err(RemoteError::ConfigError {
                reason: "app_name must not be empty".into(),
            });
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(name) = std::env::var("SMARTTV_APP_NAME") {
            if !name.trim().is_empty() {
                self.app_name = name;
            }
        }
        if let Ok(path) = std::env::var("SMARTTV_TOKEN_PATH") {
            self.token_path = Some(PathBuf::from(path));
        }
        if let Ok(subnet) = std::env::var("SMARTTV_SUBNET") {
            self.discovery.subnet = Some(subnet);
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Platform-appropriate config directory.
fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|dir| PathBuf::from(dir).join("smarttv-remote"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .ok()
            .map(|dir| PathBuf::from(dir).join(".config").join("smarttv-remote"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use std::fs;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "SMARTTV_APP_NAME",
        "SMARTTV_TOKEN_PATH",
        "SMARTTV_SUBNET",
        "SMARTTV_CONFIG",
    ];

    struct EnvGuard {
        saved: Vec<(&'static str, Option<OsString>)>,
    }

    impl EnvGuard {
        fn capture(keys: &[&'static str]) -> Self {
            let saved = keys.iter().map(|k| (*k, std::env::var_os(k))).collect();
            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in &self.saved {
                // SAFETY: tests touching the environment hold ENV_LOCK.
                unsafe {
                    if let Some(value) = value {
                        std::env::set_var(key, value);
                    } else {
                        std::env::remove_var(key);
                    }
                }
            }
        }
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_env() {
        for key in ENV_KEYS {
            // SAFETY: callers hold ENV_LOCK.
            unsafe { std::env::remove_var(key) };
        }
    }

    fn unique_temp_dir(label: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "smarttv-config-tests-{}-{}-{}",
            label,
            std::process::id(),
            now
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults() {
        let config = RemoteConfig::default();
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert_eq!(config.control.port, 8002);
        assert!(config.control.secure);
        assert_eq!(config.control.channel, "samsung.remote.control");
        assert_eq!(config.timeouts.probe_timeout(), Duration::from_millis(2_500));
        assert_eq!(config.timeouts.device_info_timeout(), Duration::from_secs(5));
        assert_eq!(config.timeouts.scan_budget(), Duration::from_secs(6));
        assert_eq!(config.timeouts.handshake_timeout_secs, 10);
        assert_eq!(config.keepalive.interval_secs, 30);
        assert_eq!(config.discovery.probe_ports, vec![8001, 3000, 80, 7001, 1925, 9080]);
        assert_eq!(config.discovery.upnp_paths.len(), 4);
        assert!(!config.reconnect.enabled);
    }

    #[test]
    fn test_should_accept_invalid_certs() {
        let mut config = RemoteConfig::default();
        assert!(config.should_accept_invalid_certs("192.168.1.20"));
        assert!(config.should_accept_invalid_certs("10.0.0.7"));
        assert!(config.should_accept_invalid_certs("127.0.0.1"));
        assert!(!config.should_accept_invalid_certs("tv.example.com"));
        assert!(!config.should_accept_invalid_certs("8.8.8.8"));

        config.allow_insecure_tls = true;
        assert!(config.should_accept_invalid_certs("tv.example.com"));
    }

    #[test]
    fn test_deserialize_toml() {
        let toml_str = r#"
            app_name = "Den Remote"
            token_path = "/tmp/tokens.json"

            [control]
            port = 8443
            secure = false

            [timeouts]
            probe_timeout_ms = 900
            handshake_timeout_secs = 4

            [discovery]
            subnet = "10.1.2.0/24"
            first_host = 20
            last_host = 40
            probe_ports = [8001]

            [reconnect]
            enabled = true
            max_attempts = 5
        "#;

        let config: RemoteConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app_name, "Den Remote");
        assert_eq!(config.token_path, Some(PathBuf::from("/tmp/tokens.json")));
        assert_eq!(config.control.port, 8443);
        assert!(!config.control.secure);
        assert_eq!(config.control.channel, DEFAULT_CONTROL_CHANNEL);
        assert_eq!(config.timeouts.probe_timeout_ms, 900);
        assert_eq!(config.timeouts.handshake_timeout_secs, 4);
        assert_eq!(config.timeouts.scan_budget_secs, DEFAULT_SCAN_BUDGET_SECS);
        assert_eq!(config.discovery.subnet.as_deref(), Some("10.1.2.0/24"));
        assert_eq!(config.discovery.first_host, 20);
        assert_eq!(config.discovery.probe_ports, vec![8001]);
        assert!(config.reconnect.enabled);
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_from_file_env_overrides_precedence() {
        let _lock = env_lock();
        let _env = EnvGuard::capture(ENV_KEYS);
        clear_env();

        let dir = unique_temp_dir("from-file-overrides");
        let config_path = dir.join("smarttv.toml");
        fs::write(
            &config_path,
            r#"
app_name = "File Remote"

[discovery]
subnet = "192.168.5.0/24"
"#,
        )
        .unwrap();

        let from_file = RemoteConfig::from_file(&config_path).unwrap();
        assert_eq!(from_file.app_name, "File Remote");
        assert_eq!(from_file.discovery.subnet.as_deref(), Some("192.168.5.0/24"));

        // SAFETY: ENV_LOCK is held.
        unsafe {
            std::env::set_var("SMARTTV_APP_NAME", "Env Remote");
            std::env::set_var("SMARTTV_SUBNET", "172.16.0.0/24");
            std::env::set_var("SMARTTV_TOKEN_PATH", "/tmp/env-tokens.json");
        }

        let config = RemoteConfig::from_file(&config_path).unwrap();
        assert_eq!(config.app_name, "Env Remote");
        assert_eq!(config.discovery.subnet.as_deref(), Some("172.16.0.0/24"));
        assert_eq!(config.token_file(), PathBuf::from("/tmp/env-tokens.json"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_discover_prefers_explicit_then_env_pointer() {
        let _lock = env_lock();
        let _env = EnvGuard::capture(ENV_KEYS);
        clear_env();

        let dir = unique_temp_dir("discover-priority");
        let explicit = dir.join("explicit.toml");
        let pointed = dir.join("pointed.toml");
        fs::write(&explicit, "app_name = \"Explicit\"\n").unwrap();
        fs::write(&pointed, "app_name = \"Pointed\"\n").unwrap();

        let config = RemoteConfig::discover(Some(&explicit)).unwrap();
        assert_eq!(config.app_name, "Explicit");

        // SAFETY: ENV_LOCK is held.
        unsafe { std::env::set_var("SMARTTV_CONFIG", &pointed) };
        let config = RemoteConfig::discover(None).unwrap();
        assert_eq!(config.app_name, "Pointed");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_from_file_missing_and_invalid_errors() {
        let _lock = env_lock();
        let dir = unique_temp_dir("from-file-errors");

        let missing = RemoteConfig::from_file(dir.join("missing.toml")).unwrap_err();
        assert!(matches!(missing, RemoteError::ConfigError { .. }));
        assert!(
            missing.to_string().contains("Failed to read config file"),
            "unexpected error: {missing}"
        );

        let invalid_path = dir.join("invalid.toml");
        fs::write(&invalid_path, "app_name = [").unwrap();
        let invalid = RemoteConfig::from_file(&invalid_path).unwrap_err();
        assert!(matches!(invalid, RemoteError::ConfigError { .. }));

        let empty_window = dir.join("window.toml");
        fs::write(&empty_window, "[discovery]\nfirst_host = 50\nlast_host = 10\n").unwrap();
        let window = RemoteConfig::from_file(&empty_window).unwrap_err();
        assert!(window.to_string().contains("host window"), "unexpected error: {window}");

        fs::remove_dir_all(dir).unwrap();
    }
}
