mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::json;
use smarttv_remote::app_launch::AppHandle;
use smarttv_remote::{
    AppLauncher, ConnectionManager, ConnectionSnapshot, ConnectionStatus, DiscoveredTv,
    MemoryTokenStore, RemoteAction, RemoteConfig, RemoteControl, RemoteError, RemoteResult,
    ServiceHandle, TvCommand,
};
use tokio::sync::watch;

use support::mock_tv::{MockTvServer, STEP_TIMEOUT};

fn test_config(port: u16) -> RemoteConfig {
    let mut config = RemoteConfig::default();
    config.control.secure = false;
    config.control.port = port;
    config.timeouts.connect_timeout_secs = 2;
    config.timeouts.handshake_timeout_secs = 2;
    config
}

fn local_tv() -> DiscoveredTv {
    DiscoveredTv {
        id: "uuid:mock-tv".into(),
        name: "Mock TV".into(),
        manufacturer: "Samsung".into(),
        ip_address: "http://127.0.0.1:8001/api/v2/".into(),
        model_name: None,
        mac_address: Some("a0-b1-c2-d3-e4-f5".into()),
    }
}

fn service() -> ServiceHandle {
    ServiceHandle {
        id: "uuid:mock-tv".into(),
        name: "Mock TV".into(),
        uri: "http://127.0.0.1:8001/api/v2/".into(),
    }
}

async fn start_server_or_skip(test_name: &str) -> Option<MockTvServer> {
    match MockTvServer::start().await {
        Ok(server) => Some(server),
        Err(err) => {
            eprintln!("Skipping {test_name}: unable to start mock server: {err}");
            None
        }
    }
}

async fn wait_status(
    rx: &mut watch::Receiver<ConnectionSnapshot>,
    status: ConnectionStatus,
) -> ConnectionSnapshot {
    tokio::time::timeout(STEP_TIMEOUT, rx.wait_for(|s| s.status == status))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {status:?}"))
        .expect("manager state channel closed")
        .clone()
}

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<String>>,
    released: Mutex<Vec<String>>,
    installed: Mutex<Vec<String>>,
}

impl AppLauncher for RecordingLauncher {
    fn create_application(
        &self,
        service: &ServiceHandle,
        app_id: &str,
        channel_uri: &str,
    ) -> RemoteResult<AppHandle> {
        Ok(AppHandle {
            app_id: app_id.into(),
            channel_uri: channel_uri.into(),
            host: service.uri.clone(),
        })
    }

    fn connect<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>> {
        self.launched.lock().unwrap().push(app.app_id.clone());
        Box::pin(async { Ok(()) })
    }

    fn disconnect<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>> {
        self.released.lock().unwrap().push(app.app_id.clone());
        Box::pin(async { Ok(()) })
    }

    fn install<'a>(&'a self, app: &'a AppHandle) -> BoxFuture<'a, RemoteResult<()>> {
        self.installed.lock().unwrap().push(app.app_id.clone());
        Box::pin(async { Ok(()) })
    }
}

#[tokio::test]
async fn control_host_is_taken_from_service_uri() {
    let Some(mut server) = start_server_or_skip("control_host_is_taken_from_service_uri").await
    else {
        return;
    };
    let manager =
        ConnectionManager::new(Arc::new(test_config(server.port())), Arc::new(MemoryTokenStore::new()));

    manager.connect_to_tv(&local_tv(), Some(service())).await.unwrap();
    let connection = server.accept_connection().await;
    connection.accept_pairing(None).await;
    manager.wait_for_pairing().await.unwrap();

    assert_eq!(manager.session_state().await.host.as_deref(), Some("127.0.0.1"));
    assert_eq!(manager.service(), Some(service()));
    manager.disconnect_from_tv().await;
    assert_eq!(manager.service(), None);
}

#[tokio::test]
async fn auto_reconnect_after_drop() {
    let Some(mut server) = start_server_or_skip("auto_reconnect_after_drop").await else {
        return;
    };
    let mut config = test_config(server.port());
    config.reconnect.enabled = true;
    config.reconnect.base_delay_secs = 1;
    config.reconnect.max_delay_secs = 1;
    config.reconnect.max_attempts = 3;
    let manager = ConnectionManager::new(Arc::new(config), Arc::new(MemoryTokenStore::new()));
    let mut rx = manager.subscribe();

    manager.connect_to_tv(&local_tv(), None).await.unwrap();
    let first = server.accept_connection().await;
    first.accept_pairing(Some("TOKEN-1")).await;
    wait_status(&mut rx, ConnectionStatus::Connected).await;

    first.force_close().await;
    wait_status(&mut rx, ConnectionStatus::Disconnected).await;

    let second = server.accept_connection().await;
    assert!(second.path().ends_with("&token=TOKEN-1"), "path was {}", second.path());
    second.accept_pairing(None).await;
    let snapshot = wait_status(&mut rx, ConnectionStatus::Connected).await;
    assert_eq!(snapshot.connected_tv.map(|t| t.id), Some("uuid:mock-tv".to_string()));

    manager.disconnect_from_tv().await;
}

#[tokio::test]
async fn explicit_disconnect_does_not_reconnect() {
    let Some(mut server) = start_server_or_skip("explicit_disconnect_does_not_reconnect").await
    else {
        return;
    };
    let mut config = test_config(server.port());
    config.reconnect.enabled = true;
    config.reconnect.base_delay_secs = 0;
    let manager = ConnectionManager::new(Arc::new(config), Arc::new(MemoryTokenStore::new()));

    manager.connect_to_tv(&local_tv(), None).await.unwrap();
    let mut connection = server.accept_connection().await;
    connection.accept_pairing(None).await;
    manager.wait_for_pairing().await.unwrap();

    manager.disconnect_from_tv().await;
    assert_eq!(
        connection.recv_json().await,
        json!({ "method": "ms.channel.disconnect" })
    );
    connection.wait_closed().await;

    assert!(server.try_accept_connection(Duration::from_millis(500)).await.is_none());
    assert_eq!(manager.snapshot(), ConnectionSnapshot::default());
}

#[tokio::test]
async fn wake_on_lan_available_for_failed_candidate() {
    // Nothing listens on this port.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let manager = Arc::new(ConnectionManager::new(
        Arc::new(test_config(port)),
        Arc::new(MemoryTokenStore::new()),
    ));
    let remote = RemoteControl::new(Arc::clone(&manager));
    assert!(!remote.capabilities().wake_on_lan);

    let err = manager.connect_to_tv(&local_tv(), None).await.unwrap_err();
    assert!(matches!(err, RemoteError::ConnectionFailed { .. }), "got {err:?}");

    let mut rx = manager.subscribe();
    let snapshot = wait_status(&mut rx, ConnectionStatus::Failed).await;
    assert_eq!(snapshot.candidate.map(|t| t.name), Some("Mock TV".to_string()));

    let caps = remote.capabilities();
    assert!(caps.wake_on_lan);
    assert!(!caps.keys);
    assert!(matches!(
        remote.dispatch(RemoteAction::Key(TvCommand::PowerToggle)).await,
        Err(RemoteError::NotConnected)
    ));
}

#[tokio::test]
async fn launch_app_through_retained_service() {
    let launcher = Arc::new(RecordingLauncher::default());
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let manager = Arc::new(
        ConnectionManager::new(Arc::new(test_config(port)), Arc::new(MemoryTokenStore::new()))
            .with_app_launcher(launcher.clone()),
    );
    let remote = RemoteControl::new(Arc::clone(&manager));
    assert!(!remote.capabilities().app_launch);

    // The control channel may fail; the service handle is still retained.
    let _ = manager.connect_to_tv(&local_tv(), Some(service())).await;
    assert!(remote.capabilities().app_launch);

    remote
        .dispatch(RemoteAction::LaunchApp("Netflix".into()))
        .await
        .unwrap();
    assert_eq!(launcher.launched.lock().unwrap().as_slice(), ["3201907018807"]);
    assert!(manager.held_apps().contains("3201907018807"));

    remote
        .dispatch(RemoteAction::InstallApp("Hulu".into()))
        .await
        .unwrap();
    assert_eq!(launcher.installed.lock().unwrap().as_slice(), ["3201601007625"]);

    // Disconnecting releases the channel before the delayed release fires.
    manager.disconnect_from_tv().await;
    assert!(manager.held_apps().is_empty());
    assert_eq!(launcher.released.lock().unwrap().as_slice(), ["3201907018807"]);
    assert!(!remote.capabilities().app_launch);
}
