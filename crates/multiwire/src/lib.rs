//! # multiwire
//!
//! Interchangeable transport plugins behind one contract. Each plugin can
//! listen, dial, and exchange human-readable addresses scoped to how far they
//! may be disclosed (`device`, `local`, `public`).
//!
//! ## Transports
//!
//! | Feature | Plugin | Address form |
//! |---|---|---|
//! | `net` | [`net::NetPlugin`] | `net:<host>:<port>` |
//! | `websocket` | [`websocket::WsPlugin`] | `ws://host[:port]`, `wss://host[:port]` |
//!
//! Both are enabled by default.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multiwire::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plugins: Vec<Arc<dyn TransportPlugin>> = vec![
//!         Arc::new(NetPlugin::builder().build()),
//!         Arc::new(WsPlugin::builder().build()),
//!     ];
//!
//!     // recognise an address by asking every plugin
//!     let address = "net:127.0.0.1:8008";
//!     let (plugin, record) = plugins
//!         .iter()
//!         .find_map(|p| p.parse(address).map(|r| (p, r)))
//!         .expect("some plugin understands it");
//!     let conn = plugin.dial(record.into()).await?;
//!     println!("connected to {}", conn.peer_address());
//!     Ok(())
//! }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use multiwire_transport_traits as traits;
pub use multiwire_transport_traits::{
    AddressCodec, AddressRecord, AddressResolver, Aborter, ClientAttempt, ConnectionHandle,
    DialTarget, OsAssignedPorts, PortAllocator, RandomPorts, Scope, ScopeConfig, ServerCloser,
    TransportError, TransportPlugin, TransportResult, join_addresses, split_addresses,
};

/// Stream (TCP) transport.
#[cfg(feature = "net")]
#[cfg_attr(docsrs, doc(cfg(feature = "net")))]
pub use multiwire_net as net;

/// WebSocket transport.
#[cfg(feature = "websocket")]
#[cfg_attr(docsrs, doc(cfg(feature = "websocket")))]
pub use multiwire_websocket as websocket;

/// Everything needed to build, listen and dial.
pub mod prelude {
    pub use multiwire_transport_traits::{
        AddressCodec, AddressRecord, ConnectionHandle, DialTarget, Scope, ScopeConfig,
        ServerCloser, TransportError, TransportPlugin, TransportResult,
    };

    #[cfg(feature = "net")]
    pub use multiwire_net::{NetConfig, NetPlugin};

    #[cfg(feature = "websocket")]
    pub use multiwire_websocket::{FrameMode, TlsConfig, WsConfig, WsPlugin};
}
