//! `net:<host>:<port>` address strings.

use multiwire_transport_traits::{AddressCodec, AddressRecord};

/// Transport tag of the stream transport.
pub const NET_TRANSPORT: &str = "net";

/// Host used when an address leaves the host segment empty (`net::4567`).
const DEFAULT_HOST: &str = "localhost";

/// Codec for the stream transport.
///
/// The host may itself contain colons (IPv6 literals), so decoding takes the
/// first and last segments as tag and port and rejoins everything in between.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetCodec;

impl AddressCodec for NetCodec {
    fn encode(&self, host: &str, port: u16) -> String {
        format!("{NET_TRANSPORT}:{host}:{port}")
    }

    fn decode(&self, address: &str) -> Option<AddressRecord> {
        let segments: Vec<&str> = address.split(':').collect();
        if segments.len() < 3 || segments[0] != NET_TRANSPORT {
            return None;
        }
        let port = parse_port(segments[segments.len() - 1])?;
        let host = segments[1..segments.len() - 1].join(":");
        // `;` separates joined addresses and never belongs to a host
        if host.contains(';') || host.contains(char::is_whitespace) {
            return None;
        }
        let host = if host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            host
        };
        Some(AddressRecord::new(NET_TRANSPORT, host, port))
    }
}

/// Base-10 digits only, in 1..=65535.
fn parse_port(segment: &str) -> Option<u16> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<u16>().ok().filter(|port| *port != 0)
}

/// Splits a native `host:port` (or `[v6]:port`) dial string.
pub(crate) fn split_host_port(native: &str) -> Option<(String, u16)> {
    let (host, port) = native.rsplit_once(':')?;
    let port = parse_port(port)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Some((DEFAULT_HOST.to_string(), port));
    }
    Some((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_decode_hostname() {
        assert_eq!(
            NetCodec.decode("net:example.com:4567"),
            Some(AddressRecord::new("net", "example.com", 4567))
        );
    }

    #[test]
    fn test_decode_empty_host_defaults_to_localhost() {
        assert_eq!(
            NetCodec.decode("net::4567"),
            Some(AddressRecord::new("net", "localhost", 4567))
        );
    }

    #[test]
    fn test_decode_ipv6_host() {
        assert_eq!(
            NetCodec.decode("net:fe80::1:8008"),
            Some(AddressRecord::new("net", "fe80::1", 8008))
        );
        assert_eq!(
            NetCodec.decode("net:::1:8008"),
            Some(AddressRecord::new("net", "::1", 8008))
        );
    }

    #[test]
    fn test_decode_rejects() {
        for bad in [
            "",
            "net",
            "net:host",
            "not-net:host:1",
            "ws://host:1",
            "net:host:port",
            "net:host:",
            "net:host:+80",
            "net:host:-1",
            "net:host:0",
            "net:host:65536",
            "NET:host:1",
            "net:127.0.0.1:8008;net:10.0.0.2:8009",
            "net:host;:80",
            "net:exa mple.com:80",
            "net:host\t:80",
            " net:host:80",
        ] {
            assert_eq!(NetCodec.decode(bad), None, "{bad:?} should not decode");
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(NetCodec.encode("127.0.0.1", 8008), "net:127.0.0.1:8008");
        assert_eq!(NetCodec.encode("::1", 8008), "net:::1:8008");
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("example.com:80"),
            Some(("example.com".to_string(), 80))
        );
        assert_eq!(split_host_port("[::1]:9000"), Some(("::1".to_string(), 9000)));
        assert_eq!(split_host_port(":9000"), Some(("localhost".to_string(), 9000)));
        assert_eq!(split_host_port("example.com"), None);
        assert_eq!(split_host_port("example.com:http"), None);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_preserves_record(
            host in "[a-z0-9][a-z0-9.-]{0,30}|[0-9a-f:]{2,20}",
            port in 1u16..=65535,
        ) {
            let record = NetCodec.decode(&NetCodec.encode(&host, port));
            prop_assert_eq!(record, Some(AddressRecord::new("net", host, port)));
        }

        #[test]
        fn prop_decode_never_panics(input in ".{0,64}") {
            let _ = NetCodec.decode(&input);
        }
    }
}
