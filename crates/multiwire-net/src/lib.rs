//! # multiwire net transport
//!
//! Raw TCP stream transport plugin for multiwire. Addresses take the form
//! `net:<host>:<port>`; the host may contain colons (IPv6 literals).
//!
//! ## Features
//!
//! - **Server**: bind once per `server()` call, report the bound address, hand
//!   every accepted socket to the connection handler
//! - **Client**: dial an [`AddressRecord`] or a native `host:port`, abortable
//! - **Scoped advertisement**: `stringify(scope)` lists the interface addresses
//!   this instance may disclose in that scope
//! - **Half-open policy**: by default EOF on read closes the write side too
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multiwire_net::NetPlugin;
//! use multiwire_transport_traits::{Scope, TransportPlugin};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let plugin = NetPlugin::builder().port(8008).build();
//!     let closer = plugin
//!         .listen(Arc::new(|conn| println!("peer {}", conn.peer_address())))
//!         .expect("inside a tokio runtime")
//!         .await?;
//!     println!("{:?}", plugin.stringify(&Scope::Device)); // net:127.0.0.1:8008
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
mod plugin;
mod stream;

pub use codec::{NET_TRANSPORT, NetCodec};
pub use config::{NetConfig, NetPluginBuilder};
pub use plugin::NetPlugin;
pub use stream::NetStream;

// Re-export the plugin contract for convenience
pub use multiwire_transport_traits::{
    AddressCodec, AddressRecord, ConnectionHandle, DialTarget, Scope, ScopeConfig, ServerCloser,
    TransportError, TransportPlugin, TransportResult,
};
