//! Wire messages of the remote-control channel.
//!
//! Everything the session sends goes through [`OutboundMessage::encode`];
//! everything it receives goes through [`decode`].

use serde::{Deserialize, Serialize};

use super::constants::{Events, Methods, RemoteParams};
use crate::error::RemoteResult;

/// A message sent to the TV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    KeyPress { key_code: &'static str },
    InputString { text: String },
    Disconnect,
}

#[derive(Serialize)]
struct Envelope<'a> {
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<ControlParams<'a>>,
}

#[derive(Serialize)]
struct ControlParams<'a> {
    #[serde(rename = "Cmd")]
    cmd: &'a str,
    #[serde(rename = "DataOfCmd")]
    data_of_cmd: &'a str,
    #[serde(rename = "Option", skip_serializing_if = "Option::is_none")]
    option: Option<&'static str>,
    #[serde(rename = "TypeOfRemote")]
    type_of_remote: &'static str,
}

impl OutboundMessage {
    /// Serialize to the JSON text frame the TV expects.
    pub fn encode(&self) -> RemoteResult<String> {
        let envelope = match self {
            OutboundMessage::KeyPress { key_code } => Envelope {
                method: Methods::REMOTE_CONTROL,
                params: Some(ControlParams {
                    cmd: RemoteParams::CLICK,
                    data_of_cmd: key_code,
                    option: Some(RemoteParams::OPTION_FALSE),
                    type_of_remote: RemoteParams::SEND_REMOTE_KEY,
                }),
            },
            OutboundMessage::InputString { text } => Envelope {
                method: Methods::REMOTE_CONTROL,
                params: Some(ControlParams {
                    cmd: text,
                    data_of_cmd: RemoteParams::INPUT_STRING,
                    option: None,
                    type_of_remote: RemoteParams::SEND_INPUT_STRING,
                }),
            },
            OutboundMessage::Disconnect => Envelope {
                method: Methods::CHANNEL_DISCONNECT,
                params: None,
            },
        };
        Ok(serde_json::to_string(&envelope)?)
    }
}

/// An event received from the TV that the session acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Pairing accepted, with the token when the TV issued one.
    ChannelConnect { token: Option<String> },
    /// The user denied the pairing prompt.
    Unauthorized,
    /// The pairing prompt expired.
    PairingTimedOut,
    /// Any other event name; carried for logging only.
    Other(String),
}

#[derive(Deserialize)]
struct RawEvent {
    event: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
struct ConnectData {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    clients: Vec<Client>,
}

#[derive(Deserialize)]
struct Client {
    #[serde(default)]
    attributes: Option<ClientAttributes>,
}

#[derive(Deserialize)]
struct ClientAttributes {
    #[serde(default)]
    token: Option<String>,
}

/// Decode one inbound text frame.
///
/// Returns `None` for anything that is not a JSON object with a string
/// `event` field. A `data` payload that does not have the expected shape is
/// treated as absent.
pub fn decode(text: &str) -> Option<InboundEvent> {
    let raw: RawEvent = serde_json::from_str(text).ok()?;

    let inbound = match raw.event.as_str() {
        Events::CHANNEL_CONNECT => {
            let data = raw
                .data
                .and_then(|data| serde_json::from_value::<ConnectData>(data).ok())
                .unwrap_or_default();
            InboundEvent::ChannelConnect {
                token: extract_token(data),
            }
        }
        Events::CHANNEL_UNAUTHORIZED => InboundEvent::Unauthorized,
        Events::CHANNEL_TIMEOUT => InboundEvent::PairingTimedOut,
        _ => InboundEvent::Other(raw.event),
    };
    Some(inbound)
}

fn extract_token(data: ConnectData) -> Option<String> {
    data.clients
        .into_iter()
        .filter_map(|c| c.attributes.and_then(|a| a.token))
        .chain(data.token)
        .find(|t| !t.is_empty())
}
