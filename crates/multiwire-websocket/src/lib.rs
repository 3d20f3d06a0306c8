//! # multiwire WebSocket transport
//!
//! WebSocket transport plugin for multiwire. Addresses are plain URLs,
//! `ws://host[:port]` or `wss://host[:port]`, with the scheme's default port
//! left out.
//!
//! ## Features
//!
//! - **Server**: HTTP upgrade on a fresh port per `server()` call unless one is
//!   pinned or a bound listener is attached, optional TLS termination with
//!   rustls, and an optional responder for plain HTTP requests on the same port
//! - **Client**: dial an [`AddressRecord`] or a full URL, abortable
//! - **Byte streams**: every connection is exposed as `AsyncRead + AsyncWrite`,
//!   one binary (or text) frame per write
//! - **Origin trust**: a browser `Origin` header names the peer only when the
//!   socket comes from loopback; see [`peer_address`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multiwire_websocket::{TlsConfig, WsPlugin};
//! use multiwire_transport_traits::{Scope, TransportPlugin};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plugin = WsPlugin::builder()
//!         .port(8443)
//!         .tls(TlsConfig::from_files("key.pem", "cert.pem"))
//!         .build();
//!     let closer = plugin
//!         .listen(Arc::new(|conn| println!("peer {}", conn.peer_address())))
//!         .expect("inside a tokio runtime")
//!         .await?;
//!     println!("{:?}", plugin.stringify(&Scope::Device)); // wss://127.0.0.1:8443
//!     closer.shutdown().await?;
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
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

mod codec;
mod config;
mod duplex;
mod fallback;
mod origin;
mod plugin;
mod tls;

pub use codec::{WS_TRANSPORT, WSS_TRANSPORT, WsCodec};
pub use config::{WsConfig, WsPluginBuilder};
pub use duplex::{FrameMode, WsDuplex};
pub use fallback::FallbackHandler;
pub use origin::peer_address;
pub use plugin::WsPlugin;
pub use tls::{TlsConfig, TlsMaterial};

// Re-export the plugin contract for convenience
pub use multiwire_transport_traits::{
    AddressCodec, AddressRecord, ConnectionHandle, DialTarget, Scope, ScopeConfig, ServerCloser,
    TransportError, TransportPlugin, TransportResult,
};
