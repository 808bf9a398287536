//! # Error Types
//!
//! Semantic error types for discovery, the TV control channel and the
//! connection manager. Every variant carries enough context to diagnose the
//! problem without digging through logs.
//!
//! Network failures inside discovery never reach callers as errors: a host
//! that times out or answers with garbage is simply not published. The
//! variants below are what the session, manager and dispatch layers return.

use thiserror::Error;

/// Convenient Result alias for remote-control operations.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// All errors that can occur while discovering or controlling a TV.
#[derive(Error, Debug)]
pub enum RemoteError {
    // ─── Connection ─────────────────────────────────────────────────
    /// Failed to open the WebSocket control channel.
    #[error("Failed to connect to TV at {url}: {reason}. Is the TV powered on and on the same network?")]
    ConnectionFailed { url: String, reason: String },

    /// The control channel was lost after being established.
    #[error("Connection to TV lost: {reason}")]
    ConnectionLost { reason: String },

    /// No TV is connected (or the pairing handshake has not completed yet).
    #[error("Not connected to a TV")]
    NotConnected,

    // ─── Pairing ────────────────────────────────────────────────────
    /// The TV rejected or never answered the pairing request.
    #[error("Pairing failed: {reason}. Accept the connection prompt on the TV screen.")]
    HandshakeFailed { reason: String },

    // ─── Capabilities ───────────────────────────────────────────────
    /// The selected TV does not offer the requested capability.
    #[error("Capability unavailable: {capability}")]
    CapabilityUnavailable { capability: &'static str },

    /// A TV application could not be launched.
    #[error("Failed to launch {app}: {reason}")]
    AppLaunchFailed { app: String, reason: String },

    // ─── Input validation ───────────────────────────────────────────
    /// A MAC address string could not be parsed.
    #[error("Invalid MAC address '{value}'")]
    InvalidMacAddress { value: String },

    /// A TV address could not be turned into a host name.
    #[error("Invalid TV address '{host}'")]
    InvalidHost { host: String },

    /// Unknown remote command name.
    #[error("Unknown remote command '{name}'")]
    UnknownCommand { name: String },

    // ─── Timeout ────────────────────────────────────────────────────
    /// An operation timed out.
    #[error("Operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    // ─── Retry ──────────────────────────────────────────────────────
    /// All retry attempts have been exhausted.
    #[error("Operation failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<RemoteError>,
    },

    // ─── Protocol ───────────────────────────────────────────────────
    /// Received an unexpected or malformed message from the TV.
    #[error("Protocol error: {reason}")]
    ProtocolError { reason: String },

    // ─── Config ─────────────────────────────────────────────────────
    /// Configuration file error (missing, malformed, or invalid values).
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// The pairing-token store could not be read or written.
    #[error("Token store error: {reason}")]
    TokenStore { reason: String },

    // ─── Transport ──────────────────────────────────────────────────
    /// Low-level WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// TLS/SSL error during connection.
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP request error (discovery probes, device info, app launch).
    #[error("HTTP error: {0}")]
    Http(String),

    // ─── I/O ────────────────────────────────────────────────────────
    /// Filesystem or socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemoteError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionFailed { .. }
                | RemoteError::ConnectionLost { .. }
                | RemoteError::Timeout { .. }
                | RemoteError::WebSocket(_)
                | RemoteError::Http(_)
        )
    }

    /// Returns `true` if this error indicates the control channel is dead
    /// and a reconnect is needed.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionFailed { .. }
                | RemoteError::ConnectionLost { .. }
                | RemoteError::NotConnected
                | RemoteError::WebSocket(_)
        )
    }
}

// ─── From impls for external error types ────────────────────────────────

impl From<tokio_tungstenite::tungstenite::Error> for RemoteError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RemoteError::WebSocket(err.to_string())
    }
}

impl From<native_tls::Error> for RemoteError {
    fn from(err: native_tls::Error) -> Self {
        RemoteError::Tls(err.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return RemoteError::Http(format!("request timed out: {err}"));
        }
        RemoteError::Http(err.to_string())
    }
}

impl From<toml::de::Error> for RemoteError {
    fn from(err: toml::de::Error) -> Self {
        RemoteError::ConfigError {
            reason: err.to_string(),
        }
    }
}
