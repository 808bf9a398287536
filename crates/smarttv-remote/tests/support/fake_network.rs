#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use smarttv_remote::discovery::{BrowseEvent, DeviceInfo, HttpProber, HttpReply, ServiceBrowser};
use smarttv_remote::{RemoteError, RemoteResult, ServiceHandle};
use tokio::sync::mpsc;

/// Answers HTTP probes from a table; unknown URLs fail like a closed port,
/// or like a silent host when built with [`FakeProber::silent_hosts`].
#[derive(Default)]
pub struct FakeProber {
    replies: HashMap<String, HttpReply>,
    requests: AtomicUsize,
    silent: bool,
}

impl FakeProber {
    pub fn with(mut self, url: &str, status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        self.replies.insert(
            url.to_string(),
            HttpReply {
                status,
                headers: headers
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                body: body.to_string(),
            },
        );
        self
    }

    /// Unknown URLs hang until the probe timeout instead of failing fast.
    pub fn silent_hosts(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl HttpProber for FakeProber {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, RemoteResult<HttpReply>> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.get(url).cloned();
        let silent = self.silent;
        Box::pin(async move {
            match reply {
                Some(reply) => Ok(reply),
                None if silent => {
                    tokio::time::sleep(timeout).await;
                    Err(RemoteError::Timeout { seconds: timeout.as_secs() })
                }
                None => Err(RemoteError::Http(format!("connection refused: {url}"))),
            }
        })
    }
}

/// Scripted vendor service browser.
#[derive(Default)]
pub struct FakeBrowser {
    sender: Mutex<Option<mpsc::Sender<BrowseEvent>>>,
    infos: Mutex<HashMap<String, DeviceInfo>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl FakeBrowser {
    pub fn with_device_info(self, service_id: &str, info: DeviceInfo) -> Self {
        self.infos
            .lock()
            .unwrap()
            .insert(service_id.to_string(), info);
        self
    }

    /// Deliver an event to the running browse session.
    pub async fn emit(&self, event: BrowseEvent) {
        let sender = self.sender.lock().unwrap().clone();
        sender
            .expect("browser not started")
            .send(event)
            .await
            .expect("browse session ended");
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ServiceBrowser for FakeBrowser {
    fn start(&self) -> RemoteResult<mpsc::Receiver<BrowseEvent>> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(tx);
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn stop(&self) {
        self.sender.lock().unwrap().take();
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn device_info<'a>(
        &'a self,
        service: &'a ServiceHandle,
        _timeout: Duration,
    ) -> BoxFuture<'a, RemoteResult<DeviceInfo>> {
        let info = self.infos.lock().unwrap().get(&service.id).cloned();
        Box::pin(async move {
            info.ok_or_else(|| RemoteError::Http(format!("no device info for {}", service.name)))
        })
    }
}

pub fn service(id: &str, name: &str, ip: &str) -> ServiceHandle {
    ServiceHandle {
        id: id.to_string(),
        name: name.to_string(),
        uri: format!("http://{ip}:8001/api/v2/"),
    }
}
