//! Protocol constants for the Samsung remote-control channel.

/// Methods sent to the TV.
pub struct Methods;

impl Methods {
    /// Key presses and text input.
    pub const REMOTE_CONTROL: &'static str = "ms.remote.control";

    /// Polite goodbye before closing the channel.
    pub const CHANNEL_DISCONNECT: &'static str = "ms.channel.disconnect";
}

/// Events received from the TV.
pub struct Events;

impl Events {
    /// Pairing accepted. Carries the pairing token.
    pub const CHANNEL_CONNECT: &'static str = "ms.channel.connect";

    /// The user denied the pairing prompt.
    pub const CHANNEL_UNAUTHORIZED: &'static str = "ms.channel.unauthorized";

    /// The pairing prompt expired without an answer.
    pub const CHANNEL_TIMEOUT: &'static str = "ms.channel.timeOut";
}

/// Parameter values of `ms.remote.control`.
pub struct RemoteParams;

impl RemoteParams {
    pub const CLICK: &'static str = "Click";
    pub const OPTION_FALSE: &'static str = "false";
    pub const SEND_REMOTE_KEY: &'static str = "SendRemoteKey";
    pub const INPUT_STRING: &'static str = "InputString";
    pub const SEND_INPUT_STRING: &'static str = "SendInputString";
}

/// Path prefix of WebSocket channels on the TV.
pub const CHANNEL_PATH: &str = "/api/v2/channels";
