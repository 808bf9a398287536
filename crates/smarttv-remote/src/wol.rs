//! Wake-on-LAN magic packets.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use tokio::net::UdpSocket;

use crate::error::{RemoteError, RemoteResult};

/// Default destination of the magic packet.
pub const DEFAULT_WOL_TARGET: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::BROADCAST, 9);

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
    ///
    /// # Errors
    /// Returns [`RemoteError::InvalidMacAddress`] for anything else.
    pub fn parse(value: &str) -> RemoteResult<Self> {
        let invalid = || RemoteError::InvalidMacAddress {
            value: value.to_string(),
        };
        let trimmed = value.trim();
        let hex: String = if trimmed.len() == 17 {
            let sep = trimmed.as_bytes()[2];
            if sep != b':' && sep != b'-' {
                return Err(invalid());
            }
            let groups: Vec<&str> = trimmed.split(char::from(sep)).collect();
            if groups.len() != 6 || groups.iter().any(|g| g.len() != 2) {
                return Err(invalid());
            }
            groups.concat()
        } else if trimmed.len() == 12 {
            trimmed.to_string()
        } else {
            return Err(invalid());
        };
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = hex.get(i * 2..i * 2 + 2).ok_or_else(invalid)?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Six `0xFF` bytes followed by sixteen copies of the MAC.
pub fn magic_packet(mac: MacAddress) -> [u8; 102] {
    let mut packet = [0xFF_u8; 102];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.0);
    }
    packet
}

/// Broadcast a magic packet for `mac` to `target`
/// (default [`DEFAULT_WOL_TARGET`]).
///
/// # Errors
/// Returns [`RemoteError::Io`] if the socket cannot be opened or the send fails.
pub async fn wake_on_lan(mac: MacAddress, target: Option<SocketAddr>) -> RemoteResult<()> {
    let target = target.unwrap_or(SocketAddr::V4(DEFAULT_WOL_TARGET));
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    let packet = magic_packet(mac);
    let sent = socket.send_to(&packet, target).await?;
    tracing::info!(%mac, %target, bytes = sent, "Wake-on-LAN packet sent");
    Ok(())
}
