//! # smarttv-remote
//!
//! Find smart TVs on the local network and drive Samsung Tizen TVs over their
//! authenticated WebSocket remote-control channel.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use smarttv_remote::{
//!     ConnectionManager, DiscoveryService, FileTokenStore, RemoteAction, RemoteConfig,
//!     RemoteControl, TvCommand,
//! };
//!
//! #[tokio::main]
//! async fn main() -> smarttv_remote::RemoteResult<()> {
//!     // Load config from SMARTTV_CONFIG, smarttv.toml, or defaults
//!     let config = Arc::new(RemoteConfig::discover(None)?);
//!
//!     // Scan the LAN for the configured budget
//!     let discovery = DiscoveryService::new(Arc::clone(&config), None, None);
//!     discovery.start_discovery();
//!     let mut state = discovery.subscribe();
//!     state.wait_for(|s| !s.scanning).await.ok();
//!
//!     let tv = discovery.discovered().into_iter().next().expect("no TV found");
//!     let tokens = Arc::new(FileTokenStore::new(config.token_file()));
//!     let manager = Arc::new(ConnectionManager::new(Arc::clone(&config), tokens));
//!
//!     // Accept the pairing prompt on the TV the first time
//!     manager.connect_to_tv(&tv, discovery.service_for(&tv)).await?;
//!     manager.wait_for_pairing().await?;
//!
//!     let remote = RemoteControl::new(manager);
//!     remote.dispatch(RemoteAction::Key(TvCommand::VolumeUp)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Layers
//!
//! | Layer | Type | Owns | Best for |
//! |-------|------|------|----------|
//! | Discovery | [`DiscoveryService`] | Subnet probe, mDNS browse | Building a TV picker |
//! | Session | [`TvSession`] | One control channel | Tests, full control |
//! | Manager | [`ConnectionManager`] | Session, snapshot, reconnect | Applications |
//! | Facade | [`RemoteControl`] | Capability gating | UI buttons |
//!
//! ## Configuration
//!
//! See [`RemoteConfig`] for the full reference. A minimal `smarttv.toml`:
//!
//! ```toml
//! app_name = "Living Room Remote"
//!
//! [discovery]
//! subnet = "192.168.1.0/24"
//! ```

pub mod app_launch;
pub mod classifier;
pub mod command;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod keepalive;
pub mod manager;
pub mod model;
pub mod protocol;
pub mod retry;
pub mod session;
pub mod tls;
pub mod token_store;
pub mod wol;

// ─── Public re-exports ──────────────────────────────────────────────────

pub use app_launch::{AppLauncher, HeldApps, RestAppLauncher};
pub use classifier::Brand;
pub use command::TvCommand;
pub use config::RemoteConfig;
pub use discovery::{DiscoveryService, DiscoveryState};
pub use dispatch::{Capabilities, RemoteAction, RemoteControl};
pub use error::{RemoteError, RemoteResult};
pub use manager::{ConnectionManager, ConnectionSnapshot, ConnectionStatus};
pub use model::{DetectedTv, DiscoveredTv, ServiceHandle};
pub use session::{ConnectionPhase, SessionEvent, SessionState, TvSession};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use wol::MacAddress;
