//! Peer address of inbound WebSocket connections.
//!
//! A browser `Origin` header is only believed when the socket itself comes from
//! loopback: a local page talking to a local node. Remote peers are always
//! identified by their socket address, whatever origin they claim.

use std::net::SocketAddr;

/// Origin sent by browsers for opaque contexts (`file://`, sandboxed frames).
const NULL_ORIGIN: &str = "null";

/// Builds the address attached to an accepted connection from the socket
/// address and the `Origin` header, if any.
pub fn peer_address(origin: Option<&str>, remote: SocketAddr) -> String {
    let ip = remote.ip().to_canonical();
    match origin {
        Some(origin) if ip.is_loopback() => {
            if origin == NULL_ORIGIN {
                format!("ws:{NULL_ORIGIN}")
            } else if let Some(rest) = origin.strip_prefix("http") {
                format!("ws{rest}")
            } else {
                origin.to_string()
            }
        }
        _ => format!("ws:{ip}:{}", remote.port()),
    }
}
