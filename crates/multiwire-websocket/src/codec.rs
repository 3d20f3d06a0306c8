//! `ws://host[:port]` and `wss://host[:port]` address strings.

use multiwire_transport_traits::{AddressCodec, AddressRecord};
use url::Url;

/// Transport tag of plain WebSocket addresses.
pub const WS_TRANSPORT: &str = "ws";
/// Transport tag of TLS WebSocket addresses.
pub const WSS_TRANSPORT: &str = "wss";

/// Codec for the WebSocket transport.
///
/// Encodes with `ws` or `wss` depending on `secure`; decodes either scheme,
/// recording the scheme as the transport tag.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsCodec {
    secure: bool,
}

impl WsCodec {
    /// Codec producing `ws://` addresses.
    pub const fn plain() -> Self {
        Self { secure: false }
    }

    /// Codec producing `wss://` addresses.
    pub const fn secure() -> Self {
        Self { secure: true }
    }

    /// Codec for the given scheme tag; `None` for anything but `ws`/`wss`.
    pub fn for_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            WS_TRANSPORT => Some(Self::plain()),
            WSS_TRANSPORT => Some(Self::secure()),
            _ => None,
        }
    }

    /// `ws` or `wss`.
    pub const fn scheme(&self) -> &'static str {
        if self.secure { WSS_TRANSPORT } else { WS_TRANSPORT }
    }

    /// Implicit port of the scheme, left out of encoded addresses.
    pub const fn default_port(&self) -> u16 {
        if self.secure { 443 } else { 80 }
    }
}

impl AddressCodec for WsCodec {
    fn encode(&self, host: &str, port: u16) -> String {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        if port == self.default_port() {
            format!("{}://{host}", self.scheme())
        } else {
            format!("{}://{host}:{port}", self.scheme())
        }
    }

    fn decode(&self, address: &str) -> Option<AddressRecord> {
        let url = Url::parse(address).ok()?;
        let codec = Self::for_scheme(url.scheme())?;
        let host = url.host_str().filter(|host| !host.is_empty())?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        let port = match url.port() {
            Some(0) => return None,
            Some(port) => port,
            None => codec.default_port(),
        };
        Some(AddressRecord::new(codec.scheme(), host, port))
    }
}
