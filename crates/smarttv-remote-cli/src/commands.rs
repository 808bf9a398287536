use std::net::SocketAddr;
use std::time::Duration;

use smarttv_remote::app_launch::KNOWN_APPS;
use smarttv_remote::wol::{self, MacAddress};
use smarttv_remote::{RemoteAction, RemoteResult, TvCommand};

use crate::app::{self, App};

pub async fn cmd_scan(app: &App, json: bool) -> RemoteResult<()> {
    let discovery = app.discovery()?;
    let mut state = discovery.subscribe();

    println!(
        "Scanning for up to {}s (Ctrl-C to stop early)...",
        app.config.timeouts.scan_budget_secs
    );
    discovery.start_discovery();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => discovery.stop_discovery(),
        _ = state.wait_for(|s| !s.scanning) => {}
    }

    let tvs = discovery.discovered();
    if json {
        app::print_pretty_json(&serde_json::to_value(&tvs)?);
    } else {
        app::print_tv_table(&tvs);
    }
    Ok(())
}

pub async fn cmd_keys(app: &App, host: &str, keys: &[TvCommand], delay: Duration) -> RemoteResult<()> {
    app.connect(host).await?;
    let mut result = Ok(());
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        if let Err(e) = app.remote.dispatch(RemoteAction::Key(*key)).await {
            result = Err(e);
            break;
        }
        println!("Sent {key}");
    }
    app.shutdown().await;
    result
}

pub async fn cmd_text(app: &App, host: &str, text: &str) -> RemoteResult<()> {
    app.connect(host).await?;
    let result = app.remote.dispatch(RemoteAction::Text(text.to_string())).await;
    app.shutdown().await;
    result
}

pub fn cmd_apps() {
    println!("{:<20} {}", "NAME", "ID");
    for known in KNOWN_APPS {
        println!("{:<20} {}", known.name, known.id);
    }
}

pub async fn cmd_launch(app: &App, host: &str, name: &str) -> RemoteResult<()> {
    app.connect(host).await?;
    let result = app.remote.dispatch(RemoteAction::LaunchApp(name.to_string())).await;
    if result.is_ok() {
        println!("Launched {name}");
    }
    app.shutdown().await;
    result
}

pub async fn cmd_install(app: &App, host: &str, name: &str) -> RemoteResult<()> {
    app.connect(host).await?;
    let result = app.remote.dispatch(RemoteAction::InstallApp(name.to_string())).await;
    if result.is_ok() {
        println!("Opened install page for {name}");
    }
    app.shutdown().await;
    result
}

pub async fn cmd_wake(mac: &str, target: Option<SocketAddr>) -> RemoteResult<()> {
    let mac = MacAddress::parse(mac)?;
    wol::wake_on_lan(mac, target).await?;
    println!("Magic packet sent to {mac}");
    Ok(())
}
