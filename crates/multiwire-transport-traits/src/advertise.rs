//! Scope-checked address advertisement, shared by every plugin's `stringify`.

use crate::address::{AddressCodec, join_addresses};
use crate::resolver::AddressResolver;
use crate::scope::{Scope, ScopeConfig};

/// The address-disclosure half of a plugin: which scopes it may advertise in
/// and which hosts it advertises there.
#[derive(Debug, Clone)]
pub struct Advertiser {
    resolver: AddressResolver,
    scope: ScopeConfig,
    host: Option<String>,
    external: Option<String>,
}

impl Advertiser {
    /// Creates an advertiser for a plugin configured with `scope`, an optional
    /// bind `host`, and an optional `external` public identity.
    pub fn new(
        resolver: AddressResolver,
        scope: ScopeConfig,
        host: Option<String>,
        external: Option<String>,
    ) -> Self {
        Self {
            resolver,
            scope,
            host,
            external,
        }
    }

    /// The configured scope.
    pub fn scope(&self) -> &ScopeConfig {
        &self.scope
    }

    /// The resolver used for candidate hosts.
    pub fn resolver(&self) -> &AddressResolver {
        &self.resolver
    }

    /// Candidate hosts for `target`, or `None` when `target` is not permitted.
    ///
    /// For the public scope an external override replaces the bind host.
    pub fn hosts(&self, target: &Scope) -> Option<Vec<String>> {
        if !self.scope.allows(target) {
            return None;
        }
        let host = match (target, &self.external) {
            (Scope::Public, Some(external)) => Some(external.as_str()),
            _ => self.host.as_deref(),
        };
        Some(self.resolver.resolve(host, target))
    }

    /// Encodes every candidate host for `target` with `port` and joins them.
    ///
    /// `None` when the scope is not permitted, when no host is advertisable,
    /// or when no usable port is known yet.
    pub fn stringify(
        &self,
        codec: &dyn AddressCodec,
        target: &Scope,
        port: Option<u16>,
    ) -> Option<String> {
        let port = port.filter(|port| *port != 0)?;
        let hosts = self.hosts(target)?;
        if hosts.is_empty() {
            return None;
        }
        Some(join_addresses(
            hosts.iter().map(|host| codec.encode(host, port)),
        ))
    }

    /// Picks the host to bind when none is configured: the first advertisable
    /// host of a single configured scope, otherwise every interface.
    pub fn bind_host(&self) -> String {
        if let Some(host) = &self.host {
            return host.clone();
        }
        self.scope
            .single()
            .and_then(|scope| self.resolver.resolve(None, scope).into_iter().next())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }
}
