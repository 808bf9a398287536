use std::fmt::Write as _;
use std::sync::Arc;

use smarttv_remote::discovery::{HttpProber, MdnsBrowser, ReqwestProber, ServiceBrowser};
use smarttv_remote::{
    ConnectionManager, ConnectionSnapshot, ConnectionStatus, DiscoveredTv, DiscoveryService,
    FileTokenStore, RemoteConfig, RemoteControl, RemoteResult, RestAppLauncher, ServiceHandle,
    TokenStore,
};

/// Services wired together for one CLI invocation.
pub struct App {
    pub config: Arc<RemoteConfig>,
    pub tokens: Arc<FileTokenStore>,
    pub manager: Arc<ConnectionManager>,
    pub remote: RemoteControl,
}

impl App {
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        let config = Arc::new(config);
        let tokens = Arc::new(FileTokenStore::new(config.token_file()));
        let launcher = Arc::new(RestAppLauncher::new()?);
        let manager = Arc::new(
            ConnectionManager::new(Arc::clone(&config), tokens.clone()).with_app_launcher(launcher),
        );
        let remote = RemoteControl::new(Arc::clone(&manager));
        Ok(Self {
            config,
            tokens,
            manager,
            remote,
        })
    }

    pub fn discovery(&self) -> RemoteResult<DiscoveryService> {
        let prober: Arc<dyn HttpProber> = Arc::new(ReqwestProber::new()?);
        let browser = match MdnsBrowser::new() {
            Ok(browser) => Some(Arc::new(browser) as Arc<dyn ServiceBrowser>),
            Err(e) => {
                tracing::warn!(error = %e, "mDNS unavailable, probing the subnet only");
                None
            }
        };
        Ok(DiscoveryService::new(
            Arc::clone(&self.config),
            Some(prober),
            browser,
        ))
    }

    /// Connect to `host` and wait for the TV to accept pairing.
    pub async fn connect(&self, host: &str) -> RemoteResult<()> {
        let paired_before = matches!(self.tokens.load(&self.config.app_name), Ok(Some(_)));
        if !paired_before {
            println!("Accept the connection prompt on the TV...");
        }
        let tv = tv_at(host);
        self.manager.connect_to_tv(&tv, Some(service_at(host))).await?;
        self.manager.wait_for_pairing().await?;
        println!("Connected: {}", format_status(&self.manager.snapshot()));
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.manager.disconnect_from_tv().await;
    }
}

/// A TV record for a host typed on the command line.
pub fn tv_at(host: &str) -> DiscoveredTv {
    DiscoveredTv {
        id: host.to_string(),
        name: host.to_string(),
        manufacturer: "Samsung".to_string(),
        ip_address: host.to_string(),
        model_name: None,
        mac_address: None,
    }
}

/// The application service of a Samsung TV at `host`.
pub fn service_at(host: &str) -> ServiceHandle {
    ServiceHandle {
        id: host.to_string(),
        name: host.to_string(),
        uri: format!("http://{host}:8001/api/v2/"),
    }
}

pub fn format_status(snapshot: &ConnectionSnapshot) -> String {
    let status = match snapshot.status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Failed => "failed",
    };
    let tv = snapshot
        .current_tv()
        .map_or_else(|| "none".to_string(), |tv| format!("{} ({})", tv.name, tv.ip_address));

    let mut line = format!("Status: {status} | TV: {tv}");
    if let Some(error) = &snapshot.last_error {
        let _ = write!(line, " | Last error: {error}");
    }
    line
}

pub fn print_pretty_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("Failed to format JSON output: {err}");
            println!("{value}");
        }
    }
}

pub fn print_tv_table(tvs: &[DiscoveredTv]) {
    if tvs.is_empty() {
        println!("No TVs found.");
        return;
    }
    println!("{:<28} {:<16} {:<32} {:<18}", "NAME", "MANUFACTURER", "ADDRESS", "MAC");
    for tv in tvs {
        println!(
            "{:<28} {:<16} {:<32} {:<18}",
            tv.name,
            tv.manufacturer,
            tv.ip_address,
            tv.mac_address.as_deref().unwrap_or("-")
        );
    }
}
