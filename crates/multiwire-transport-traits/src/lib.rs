//! # multiwire transport traits
//!
//! The contract every multiwire transport plugin implements, plus the pieces
//! the plugins share.
//!
//! ## Overview
//!
//! This crate defines:
//! - **Plugin contract**: [`TransportPlugin`] with its four operations
//!   (`server`, `client`, `parse`, `stringify`)
//! - **Scopes**: [`Scope`], [`ScopeConfig`] and the [`AddressResolver`] that turns a
//!   scope into advertisable hosts
//! - **Addresses**: [`AddressRecord`], [`AddressCodec`], [`DialTarget`] and the
//!   `;`-joined multi-address helpers
//! - **Lifecycle**: [`ServerCloser`]/[`ServerTask`] for listeners,
//!   [`Aborter`]/[`ClientAttempt`] for dials, both guarded by [`OneShot`]
//! - **Connections**: [`ConnectionHandle`], a duplex byte channel tagged with the
//!   peer's address string
//! - **Errors**: [`TransportError`], [`TransportResult`]
//!
//! ## Usage
//!
//! Transport crates implement [`TransportPlugin`]:
//!
//! ```rust,ignore
//! use multiwire_transport_traits::{TransportPlugin, Scope};
//!
//! let plugin = multiwire_net::NetPlugin::builder().build();
//! let closer = plugin.listen(on_connection).expect("tokio runtime").await?;
//! println!("{:?}", plugin.stringify(&Scope::Device));
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

mod address;
mod advertise;
mod client;
mod connection;
mod error;
mod latch;
mod ports;
mod resolver;
mod scope;
mod server;
mod traits;

pub use address::{
    ADDRESS_DELIMITER, AddressCodec, AddressRecord, DialTarget, join_addresses, split_addresses,
};
pub use advertise::Advertiser;
pub use client::{Aborter, ClientAttempt, ClientState};
pub use connection::{ConnectionHandle, DuplexIo};
pub use error::{TransportError, TransportResult};
pub use latch::OneShot;
pub use ports::{OsAssignedPorts, PortAllocator, RandomPorts};
pub use resolver::{
    AddressResolver, InterfaceSource, StaticInterfaces, SystemInterfaces, classify_ip,
    is_wildcard_host,
};
pub use scope::{Scope, ScopeConfig};
pub use server::{ServerCloser, ServerState, ServerTask};
pub use traits::{
    ClientCallback, CloseCallback, ListenFuture, OnConnection, StartedCallback, TransportPlugin,
    runtime_handle,
};
