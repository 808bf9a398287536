#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

pub const STEP_TIMEOUT: Duration = Duration::from_secs(3);

enum ConnectionCommand {
    SendText(String),
    ForceClose,
}

/// One accepted control-channel connection.
pub struct MockConnection {
    index: usize,
    path: String,
    text_rx: mpsc::Receiver<String>,
    command_tx: mpsc::Sender<ConnectionCommand>,
    closed_rx: Option<oneshot::Receiver<()>>,
}

impl MockConnection {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Request path and query the client connected with.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn recv_text(&mut self) -> String {
        timeout(STEP_TIMEOUT, self.text_rx.recv())
            .await
            .expect("timed out waiting for a text frame")
            .expect("mock connection text channel closed")
    }

    pub async fn recv_json(&mut self) -> Value {
        let text = self.recv_text().await;
        serde_json::from_str(&text).expect("client sent invalid JSON")
    }

    pub async fn try_recv_text(&mut self, wait: Duration) -> Option<String> {
        match timeout(wait, self.text_rx.recv()).await {
            Ok(text) => text,
            Err(_) => None,
        }
    }

    pub async fn send_text(&self, text: &str) {
        self.command_tx
            .send(ConnectionCommand::SendText(text.to_string()))
            .await
            .expect("failed to send command to mock connection");
    }

    pub async fn send_json(&self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    /// Acknowledge pairing, optionally handing out a token.
    pub async fn accept_pairing(&self, token: Option<&str>) {
        let attributes = match token {
            Some(token) => json!({ "token": token }),
            None => json!({}),
        };
        self.send_json(json!({
            "event": "ms.channel.connect",
            "data": {
                "id": "mock-client",
                "clients": [{ "id": "mock-client", "attributes": attributes }]
            }
        }))
        .await;
    }

    /// Drop the socket without a close handshake.
    pub async fn force_close(&self) {
        let _ = self.command_tx.send(ConnectionCommand::ForceClose).await;
    }

    /// Wait until the client closed its side.
    pub async fn wait_closed(&mut self) {
        let closed = self.closed_rx.take().expect("wait_closed called twice");
        timeout(STEP_TIMEOUT, closed)
            .await
            .expect("timed out waiting for the client to close")
            .ok();
    }
}

/// WebSocket server standing in for a TV's remote-control endpoint.
pub struct MockTvServer {
    addr: SocketAddr,
    connection_rx: mpsc::Receiver<MockConnection>,
    server_task: JoinHandle<()>,
}

impl MockTvServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let (connection_tx, connection_rx) = mpsc::channel(16);
        let next_connection_index = Arc::new(AtomicUsize::new(0));

        let server_task = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };

                let connection_tx = connection_tx.clone();
                let connection_index = next_connection_index.fetch_add(1, Ordering::SeqCst);

                tokio::spawn(async move {
                    let mut path = String::new();
                    let record_path =
                        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                            path = req.uri().to_string();
                            Ok(resp)
                        };
                    let ws_stream = match accept_hdr_async(stream, record_path).await {
                        Ok(ws) => ws,
                        Err(_) => return,
                    };

                    let (mut ws_sink, mut ws_source) = ws_stream.split();
                    let (text_tx, text_rx) = mpsc::channel(64);
                    let (command_tx, mut command_rx) = mpsc::channel(64);
                    let (closed_tx, closed_rx) = oneshot::channel();

                    let connection = MockConnection {
                        index: connection_index,
                        path,
                        text_rx,
                        command_tx,
                        closed_rx: Some(closed_rx),
                    };

                    if connection_tx.send(connection).await.is_err() {
                        return;
                    }

                    loop {
                        tokio::select! {
                            maybe_command = command_rx.recv() => {
                                match maybe_command {
                                    Some(ConnectionCommand::SendText(text)) => {
                                        if ws_sink.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Some(ConnectionCommand::ForceClose) | None => break,
                                }
                            }
                            maybe_message = ws_source.next() => {
                                match maybe_message {
                                    Some(Ok(Message::Text(text))) => {
                                        let _ = text_tx.send(text.as_str().to_string()).await;
                                    }
                                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                        }
                    }
                    let _ = closed_tx.send(());
                });
            }
        });

        Ok(Self {
            addr,
            connection_rx,
            server_task,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn accept_connection(&mut self) -> MockConnection {
        timeout(STEP_TIMEOUT, self.connection_rx.recv())
            .await
            .expect("timed out waiting for client connection")
            .expect("mock server connection channel closed")
    }

    pub async fn try_accept_connection(&mut self, wait: Duration) -> Option<MockConnection> {
        match timeout(wait, self.connection_rx.recv()).await {
            Ok(Some(connection)) => Some(connection),
            _ => None,
        }
    }
}

impl Drop for MockTvServer {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}
