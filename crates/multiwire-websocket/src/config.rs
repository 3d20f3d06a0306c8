//! WebSocket transport configuration and builder.

use std::fmt;
use std::net::TcpListener;
use std::sync::Arc;

use multiwire_transport_traits::{
    AddressResolver, PortAllocator, RandomPorts, Scope, ScopeConfig,
};
use serde::{Deserialize, Serialize};

use crate::duplex::FrameMode;
use crate::fallback::FallbackHandler;
use crate::plugin::WsPlugin;
use crate::tls::TlsConfig;

/// Configuration of one [`WsPlugin`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WsConfig {
    /// Scopes this instance may advertise in.
    pub scope: ScopeConfig,
    /// Host to bind and advertise. Unset means "the addresses of the scope".
    pub host: Option<String>,
    /// Port to bind. Unset means a fresh one is allocated on every `server()`.
    pub port: Option<u16>,
    /// Public identity advertised for the `public` scope.
    pub external: Option<String>,
    /// Terminate TLS and advertise `wss://`.
    pub tls: Option<TlsConfig>,
    /// Frame type for outgoing bytes.
    pub frame_mode: FrameMode,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            scope: ScopeConfig::Single(Scope::Device),
            host: None,
            port: None,
            external: None,
            tls: None,
            frame_mode: FrameMode::Binary,
        }
    }
}

/// Builder for [`WsPlugin`].
#[derive(Default)]
pub struct WsPluginBuilder {
    config: WsConfig,
    resolver: Option<AddressResolver>,
    ports: Option<Arc<dyn PortAllocator>>,
    listener: Option<TcpListener>,
    fallback: Option<FallbackHandler>,
}

impl fmt::Debug for WsPluginBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsPluginBuilder")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("ports", &self.ports)
            .field("listener", &self.listener)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl WsPluginBuilder {
    /// Create a builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    #[must_use]
    pub fn config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the scope (a single label or a set)
    #[must_use]
    pub fn scope(mut self, scope: impl Into<ScopeConfig>) -> Self {
        self.config.scope = scope.into();
        self
    }

    /// Set the bind host
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = Some(host.into());
        self
    }

    /// Pin the listening port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Set the external host advertised for the public scope
    #[must_use]
    pub fn external(mut self, external: impl Into<String>) -> Self {
        self.config.external = Some(external.into());
        self
    }

    /// Serve `wss://` with the given key and certificate
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.config.tls = Some(tls);
        self
    }

    /// Set the frame type for outgoing bytes
    #[must_use]
    pub const fn frame_mode(mut self, mode: FrameMode) -> Self {
        self.config.frame_mode = mode;
        self
    }

    /// Use a custom interface resolver
    #[must_use]
    pub fn resolver(mut self, resolver: AddressResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Use a custom port allocator for unpinned ports
    #[must_use]
    pub fn ports(mut self, ports: Arc<dyn PortAllocator>) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Accept from an already bound listener instead of binding one.
    ///
    /// The configured host and port are then only used for advertising hosts;
    /// the listener's port is the advertised port.
    #[must_use]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Answer plain HTTP requests (anything that is not a WebSocket upgrade)
    /// on the same port with `handler`.
    #[must_use]
    pub fn fallback(mut self, handler: FallbackHandler) -> Self {
        self.fallback = Some(handler);
        self
    }

    /// Build the plugin
    #[must_use]
    pub fn build(self) -> WsPlugin {
        WsPlugin::new(
            self.config,
            self.resolver.unwrap_or_default(),
            self.ports.unwrap_or_else(|| Arc::new(RandomPorts)),
            self.listener,
            self.fallback,
        )
    }
}
