//! Address records, codecs and dial targets.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Delimiter between addresses when a plugin is reachable through several hosts.
pub const ADDRESS_DELIMITER: char = ';';

/// The in-memory form of a transport address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Transport tag, e.g. `net`, `ws` or `wss`.
    pub transport: String,
    /// Literal IP or hostname. IPv6 literals are stored without brackets.
    pub host: String,
    /// Port, 1-65535.
    pub port: u16,
}

impl AddressRecord {
    /// Creates a record.
    pub fn new(transport: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            transport: transport.into(),
            host: host.into(),
            port,
        }
    }
}

/// Converts between [`AddressRecord`]s and one transport's canonical address strings.
///
/// `decode` never fails loudly: anything that is not this transport's canonical
/// form yields `None`, so a caller can probe many codecs cheaply.
pub trait AddressCodec: Send + Sync + fmt::Debug {
    /// Encodes a host and port into this transport's canonical string.
    fn encode(&self, host: &str, port: u16) -> String;

    /// Decodes a canonical string, returning `None` for anything else.
    fn decode(&self, address: &str) -> Option<AddressRecord>;
}

/// Joins several canonical addresses into the multi-address form.
pub fn join_addresses<I, S>(addresses: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for address in addresses {
        if !joined.is_empty() {
            joined.push(ADDRESS_DELIMITER);
        }
        joined.push_str(address.as_ref());
    }
    joined
}

/// Splits the multi-address form, skipping empty entries.
pub fn split_addresses(joined: &str) -> impl Iterator<Item = &str> {
    joined
        .split(ADDRESS_DELIMITER)
        .map(str::trim)
        .filter(|address| !address.is_empty())
}

/// What a client dial is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialTarget {
    /// A record produced by a codec's `decode`.
    Address(AddressRecord),
    /// Transport-native connection options: `host:port` for stream sockets, a
    /// full URL for WebSocket.
    Native(String),
}

impl From<AddressRecord> for DialTarget {
    fn from(record: AddressRecord) -> Self {
        Self::Address(record)
    }
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(record) => {
                write!(f, "{}:{}:{}", record.transport, record.host, record.port)
            }
            Self::Native(native) => f.write_str(native),
        }
    }
}
