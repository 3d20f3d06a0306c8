//! Stream transport configuration and builder.

use std::sync::Arc;

use multiwire_transport_traits::{
    AddressResolver, PortAllocator, RandomPorts, Scope, ScopeConfig,
};
use serde::{Deserialize, Serialize};

use crate::plugin::NetPlugin;

/// Configuration of one [`NetPlugin`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Scopes this instance may advertise in.
    pub scope: ScopeConfig,
    /// Host to bind and advertise. Unset means "the addresses of the scope".
    pub host: Option<String>,
    /// Port to bind. Unset means one is allocated when the plugin is built.
    pub port: Option<u16>,
    /// Public identity advertised for the `public` scope instead of the
    /// interface addresses (NAT or reverse proxy).
    pub external: Option<String>,
    /// Keep the write side open after the peer finishes sending.
    pub allow_half_open: bool,
    /// Set `TCP_NODELAY` on every stream.
    pub nodelay: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            scope: ScopeConfig::Single(Scope::Device),
            host: None,
            port: None,
            external: None,
            allow_half_open: false,
            nodelay: false,
        }
    }
}

/// Builder for [`NetPlugin`].
#[derive(Debug, Default)]
pub struct NetPluginBuilder {
    config: NetConfig,
    resolver: Option<AddressResolver>,
    ports: Option<Arc<dyn PortAllocator>>,
}

impl NetPluginBuilder {
    /// Create a builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    #[must_use]
    pub fn config(mut self, config: NetConfig) -> Self {
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

    /// Allow half-open connections
    #[must_use]
    pub const fn allow_half_open(mut self, enabled: bool) -> Self {
        self.config.allow_half_open = enabled;
        self
    }

    /// Enable or disable `TCP_NODELAY`
    #[must_use]
    pub const fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
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

    /// Build the plugin. An unpinned port is allocated here, once.
    #[must_use]
    pub fn build(self) -> NetPlugin {
        let ports = self.ports.unwrap_or_else(|| Arc::new(RandomPorts));
        let port = self.config.port.unwrap_or_else(|| ports.allocate());
        NetPlugin::new(self.config, self.resolver.unwrap_or_default(), port)
    }
}
