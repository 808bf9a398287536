//! # TV Session
//!
//! One authenticated control channel to a Samsung TV.
//!
//! ## Architecture
//!
//! Opening a link splits the WebSocket into halves and spawns the tasks that
//! own them:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          TvSession                            │
//! │                                                               │
//! │  send_command / send_text ─┐                                  │
//! │  keep-alive pings ─────────┼─► mpsc<Frame> ─► writer ─► sink  │
//! │  teardown goodbye ─────────┘    (FIFO, single writer)         │
//! │                                                               │
//! │  stream ─► reader ─► decode ─► state transition ─► events_tx │
//! │  handshake timer ─────────────► state transition ─► events_tx │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every connect attempt gets a new generation number. Tasks of an older
//! generation can never change state or emit events, so a late close from a
//! torn-down link is harmless.
//!
//! ## State machine
//!
//! `Disconnected → Connecting → Connected`, `Connecting → Failed` on
//! rejection or timeout, `Connecting | Connected → Disconnected` when the TV
//! drops the transport. [`TvSession::disconnect`] returns to `Disconnected`
//! from any phase, and a new [`TvSession::connect`] recovers from `Failed`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tokio_util::sync::CancellationToken;

use crate::command::TvCommand;
use crate::config::RemoteConfig;
use crate::error::{RemoteError, RemoteResult};
use crate::keepalive::KeepAlive;
use crate::protocol::constants::CHANNEL_PATH;
use crate::protocol::{InboundEvent, OutboundMessage, decode};
use crate::tls;
use crate::token_store::TokenStore;

/// How long teardown waits for the writer to flush the goodbye and close.
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

/// Lifecycle phase of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionPhase::Disconnected => "disconnected",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Failed => "failed",
        })
    }
}

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub host: Option<String>,
    pub phase: ConnectionPhase,
    pub authenticated: bool,
    pub last_error: Option<String>,
}

/// Transitions reported to the owner of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Pairing acknowledged.
    Connected { generation: u64 },
    /// The attempt was rejected, timed out, or the transport failed to open.
    Failed { generation: u64, reason: String },
    /// The TV closed the transport, or it broke.
    Disconnected { generation: u64, reason: String },
}

impl SessionEvent {
    pub fn generation(&self) -> u64 {
        match self {
            SessionEvent::Connected { generation }
            | SessionEvent::Failed { generation, .. }
            | SessionEvent::Disconnected { generation, .. } => *generation,
        }
    }
}

/// An item on the outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Ping,
}

struct Inner {
    state: SessionState,
    generation: u64,
    transport_open: bool,
}

/// State shared between the session and its link tasks.
struct Shared {
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` only if `generation` is still current, then emit whatever
    /// event it returns.
    fn transition<F>(&self, generation: u64, f: F)
    where
        F: FnOnce(&mut Inner) -> Option<SessionEvent>,
    {
        let event = {
            let mut inner = self.lock();
            if inner.generation != generation {
                tracing::trace!(generation, current = inner.generation, "Ignoring stale transition");
                return;
            }
            f(&mut inner)
        };
        if let Some(event) = event {
            let _ = self.events.send(event);
        }
    }

    fn fail(&self, generation: u64, reason: String) {
        self.transition(generation, |inner| {
            if inner.state.phase != ConnectionPhase::Connecting {
                return None;
            }
            tracing::warn!(generation, reason = %reason, "Pairing failed");
            inner.state.phase = ConnectionPhase::Failed;
            inner.state.authenticated = false;
            inner.state.last_error = Some(reason.clone());
            inner.transport_open = false;
            Some(SessionEvent::Failed { generation, reason })
        });
    }
}

/// The tasks and queue belonging to one open transport.
struct Link {
    outbound: mpsc::UnboundedSender<Frame>,
    cancel: CancellationToken,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
    handshake: JoinHandle<()>,
    keepalive: Option<KeepAlive>,
}

/// A control-channel session to one TV at a time.
pub struct TvSession {
    config: Arc<RemoteConfig>,
    tokens: Arc<dyn TokenStore>,
    shared: Arc<Shared>,
    link: Option<Link>,
}

impl TvSession {
    /// Create an idle session. Transitions are reported on `events`.
    pub fn new(
        config: Arc<RemoteConfig>,
        tokens: Arc<dyn TokenStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            config,
            tokens,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SessionState::default(),
                    generation: 0,
                    transport_open: false,
                }),
                events,
            }),
            link: None,
        }
    }

    /// Open the control channel to `host`, closing any previous one first.
    ///
    /// Returns once the transport is open; the pairing acknowledgement
    /// arrives later as [`SessionEvent::Connected`].
    ///
    /// # Errors
    /// Returns [`RemoteError::ConnectionFailed`], [`RemoteError::Timeout`] or
    /// [`RemoteError::Tls`] if the transport cannot be opened. The session is
    /// then `Failed` and a [`SessionEvent::Failed`] has been emitted.
    pub async fn connect(&mut self, host: &str) -> RemoteResult<()> {
        self.teardown().await;

        let generation = {
            let mut inner = self.shared.lock();
            inner.generation += 1;
            inner.transport_open = false;
            inner.state = SessionState {
                host: Some(host.to_string()),
                phase: ConnectionPhase::Connecting,
                authenticated: false,
                last_error: None,
            };
            inner.generation
        };

        match self.open_link(host, generation).await {
            Ok(link) => {
                self.link = Some(link);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(generation, e.to_string());
                Err(e)
            }
        }
    }

    async fn open_link(&self, host: &str, generation: u64) -> RemoteResult<Link> {
        let scope = self.config.app_name.as_str();
        let token = match self.tokens.load(scope) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load pairing token, pairing afresh");
                None
            }
        };
        let url = control_url(&self.config, host, token.as_deref());
        let connector =
            tls::connector_for(host, self.config.should_accept_invalid_certs(host))?;
        let connect_timeout = Duration::from_secs(self.config.timeouts.connect_timeout_secs);

        tracing::info!(host, generation, paired = token.is_some(), "Opening control channel");
        let connect_fut = connect_async_tls_with_config(url.as_str(), None, true, Some(connector));
        let (ws, response) = tokio::time::timeout(connect_timeout, connect_fut)
            .await
            .map_err(|_| RemoteError::Timeout {
                seconds: connect_timeout.as_secs(),
            })?
            .map_err(|e| RemoteError::ConnectionFailed {
                url: redact_token(&url),
                reason: e.to_string(),
            })?;
        tracing::debug!(host, generation, status = %response.status(), "Control channel open");

        let (sink, stream) = ws.split();
        let cancel = CancellationToken::new();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        self.shared.lock().transport_open = true;

        let writer = tokio::spawn(run_writer(sink, outbound_rx, cancel.clone()));
        let reader = tokio::spawn(run_reader(
            stream,
            Arc::clone(&self.shared),
            Arc::clone(&self.tokens),
            self.config.app_name.clone(),
            generation,
            cancel.clone(),
        ));
        let handshake = tokio::spawn(run_handshake_timer(
            Arc::clone(&self.shared),
            generation,
            Duration::from_secs(self.config.timeouts.handshake_timeout_secs),
            cancel.clone(),
        ));
        let keepalive = self.config.keepalive.enabled.then(|| {
            KeepAlive::start(
                outbound.clone(),
                Duration::from_secs(self.config.keepalive.interval_secs.max(1)),
                cancel.clone(),
            )
        });

        Ok(Link {
            outbound,
            cancel,
            writer,
            reader,
            handshake,
            keepalive,
        })
    }

    /// Press one remote button.
    ///
    /// # Errors
    /// [`RemoteError::NotConnected`] unless the session is `Connected`;
    /// [`RemoteError::ConnectionLost`] if the link died underneath.
    pub fn send_command(&self, command: TvCommand) -> RemoteResult<()> {
        self.send(&OutboundMessage::KeyPress {
            key_code: command.key_code(),
        })
    }

    /// Type text into the focused input field on the TV.
    ///
    /// # Errors
    /// Same as [`send_command`](Self::send_command).
    pub fn send_text(&self, text: &str) -> RemoteResult<()> {
        self.send(&OutboundMessage::InputString {
            text: text.to_string(),
        })
    }

    fn send(&self, message: &OutboundMessage) -> RemoteResult<()> {
        let phase = self.phase();
        let link = match (&self.link, phase) {
            (Some(link), ConnectionPhase::Connected) => link,
            _ => {
                tracing::warn!(%phase, ?message, "Dropping message, session not connected");
                return Err(RemoteError::NotConnected);
            }
        };
        let frame = Frame::Text(message.encode()?);
        link.outbound
            .send(frame)
            .map_err(|_| RemoteError::ConnectionLost {
                reason: "control channel writer has stopped".into(),
            })
    }

    /// Close the control channel. Safe to call in any phase.
    pub async fn disconnect(&mut self) {
        self.teardown().await;
        let mut inner = self.shared.lock();
        inner.generation += 1;
        inner.transport_open = false;
        inner.state = SessionState::default();
    }

    /// Stop the current link's tasks. Emits no events.
    async fn teardown(&mut self) {
        let Some(mut link) = self.link.take() else {
            return;
        };

        if self.phase() == ConnectionPhase::Connected {
            if let Ok(goodbye) = OutboundMessage::Disconnect.encode() {
                let _ = link.outbound.send(Frame::Text(goodbye));
            }
        }
        link.cancel.cancel();
        if let Some(keepalive) = link.keepalive.as_mut() {
            keepalive.stop().await;
        }
        link.handshake.abort();

        let mut writer = link.writer;
        if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut writer)
            .await
            .is_err()
        {
            tracing::debug!("Writer did not finish in time, aborting");
            writer.abort();
        }
        link.reader.abort();
        let _ = link.reader.await;

        self.shared.lock().transport_open = false;
        tracing::debug!("Control channel torn down");
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state.clone()
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.shared.lock().state.phase
    }

    pub fn is_transport_open(&self) -> bool {
        self.shared.lock().transport_open
    }

    /// Generation of the most recent connect attempt.
    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }
}

impl Drop for TvSession {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.cancel.cancel();
            link.writer.abort();
            link.reader.abort();
            link.handshake.abort();
        }
    }
}

/// `wss://<host>:<port>/api/v2/channels/<channel>?name=<b64 app name>[&token=<t>]`
pub fn control_url(config: &RemoteConfig, host: &str, token: Option<&str>) -> String {
    let scheme = if config.control.secure { "wss" } else { "ws" };
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    let name = BASE64.encode(config.app_name.as_bytes());
    let mut url = format!(
        "{scheme}://{host}:{}{CHANNEL_PATH}/{}?name={name}",
        config.control.port, config.control.channel
    );
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.push_str("&token=");
        url.push_str(token);
    }
    url
}

fn redact_token(url: &str) -> String {
    match url.find("&token=") {
        Some(idx) => format!("{}&token=<redacted>", &url[..idx]),
        None => url.to_string(),
    }
}

async fn run_writer(
    mut sink: WsWriter,
    mut outbound: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = outbound.recv() => frame,
            () = cancel.cancelled() => break,
        };
        let Some(frame) = frame else {
            break;
        };
        let message = match frame {
            Frame::Text(text) => {
                tracing::debug!(raw = %text, "Sending");
                Message::Text(text.into())
            }
            Frame::Ping => Message::Ping(Vec::<u8>::new().into()),
        };
        if let Err(e) = sink.send(message).await {
            tracing::warn!(error = %e, "Control channel write failed");
            break;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::trace!(error = %e, "Close after shutdown");
    }
}

async fn run_reader(
    mut stream: WsReader,
    shared: Arc<Shared>,
    tokens: Arc<dyn TokenStore>,
    scope: String,
    generation: u64,
    cancel: CancellationToken,
) {
    let reason = loop {
        let message = tokio::select! {
            () = cancel.cancelled() => return,
            message = stream.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                let Some(event) = decode(text.as_str()) else {
                    tracing::debug!(raw = %text.as_str(), "Ignoring unrecognised message");
                    continue;
                };
                handle_event(event, &shared, tokens.as_ref(), &scope, generation, &cancel);
            }
            Some(Ok(Message::Close(frame))) => {
                break frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| "closed by TV".to_string());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => break e.to_string(),
            None => break "connection ended".to_string(),
        }
    };

    if cancel.is_cancelled() {
        return;
    }
    cancel.cancel();
    tracing::info!(generation, reason = %reason, "Control channel closed by peer");
    shared.transition(generation, |inner| {
        inner.transport_open = false;
        inner.state.phase = ConnectionPhase::Disconnected;
        inner.state.authenticated = false;
        inner.state.last_error = Some(reason.clone());
        Some(SessionEvent::Disconnected { generation, reason })
    });
}

fn handle_event(
    event: InboundEvent,
    shared: &Shared,
    tokens: &dyn TokenStore,
    scope: &str,
    generation: u64,
    cancel: &CancellationToken,
) {
    match event {
        InboundEvent::ChannelConnect { token } => {
            if let Some(token) = &token {
                if let Err(e) = tokens.save(scope, token) {
                    tracing::warn!(error = %e, "Could not persist pairing token");
                }
            }
            shared.transition(generation, |inner| {
                if inner.state.phase != ConnectionPhase::Connecting {
                    return None;
                }
                tracing::info!(generation, host = ?inner.state.host, "Paired with TV");
                inner.state.phase = ConnectionPhase::Connected;
                inner.state.authenticated = true;
                inner.state.last_error = None;
                Some(SessionEvent::Connected { generation })
            });
        }
        InboundEvent::Unauthorized => {
            shared.fail(generation, "TV rejected the pairing request".into());
            cancel.cancel();
        }
        InboundEvent::PairingTimedOut => {
            shared.fail(generation, "pairing prompt expired on the TV".into());
            cancel.cancel();
        }
        InboundEvent::Other(name) => {
            tracing::debug!(event = %name, "Unhandled TV event");
        }
    }
}

async fn run_handshake_timer(
    shared: Arc<Shared>,
    generation: u64,
    timeout: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        () = cancel.cancelled() => return,
        () = tokio::time::sleep(timeout) => {}
    }
    let still_waiting = {
        let inner = shared.lock();
        inner.generation == generation && inner.state.phase == ConnectionPhase::Connecting
    };
    if still_waiting {
        shared.fail(
            generation,
            format!("no pairing acknowledgement within {}s", timeout.as_secs()),
        );
        cancel.cancel();
    }
}
