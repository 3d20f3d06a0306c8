//! Scope-aware address resolution.
//!
//! Turns a configured host and a [`Scope`] into the ordered list of host strings
//! a plugin may advertise. Interface enumeration is behind [`InterfaceSource`] so
//! the machine's real interfaces can be swapped for a fixed list.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::scope::Scope;

/// Enumerates the IP addresses assigned to this machine.
pub trait InterfaceSource: Send + Sync + fmt::Debug {
    /// Returns every interface address in a stable order.
    fn addresses(&self) -> Vec<IpAddr>;
}

/// Reads the host's network interfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

impl InterfaceSource for SystemInterfaces {
    fn addresses(&self) -> Vec<IpAddr> {
        match if_addrs::get_if_addrs() {
            Ok(interfaces) => interfaces.iter().map(if_addrs::Interface::ip).collect(),
            Err(e) => {
                warn!("Failed to enumerate network interfaces: {}", e);
                Vec::new()
            }
        }
    }
}

/// A fixed list of interface addresses.
#[derive(Debug, Default, Clone)]
pub struct StaticInterfaces(pub Vec<IpAddr>);

impl InterfaceSource for StaticInterfaces {
    fn addresses(&self) -> Vec<IpAddr> {
        self.0.clone()
    }
}

/// Returns `true` for hosts that mean "every local address" rather than one
/// concrete host.
pub fn is_wildcard_host(host: &str) -> bool {
    matches!(host.trim(), "" | "0.0.0.0" | "::" | "[::]")
}

/// Classifies an address into the well-known scope it is advertisable in.
///
/// Unspecified, multicast, broadcast and documentation addresses have no scope.
pub fn classify_ip(ip: &IpAddr) -> Option<Scope> {
    match ip {
        IpAddr::V4(v4) => classify_ipv4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => classify_ipv4(&v4),
            None => classify_ipv6(v6),
        },
    }
}

fn classify_ipv4(ip: &Ipv4Addr) -> Option<Scope> {
    if ip.is_loopback() {
        Some(Scope::Device)
    } else if ip.is_private() || ip.is_link_local() {
        Some(Scope::Local)
    } else if ip.is_unspecified()
        || ip.is_multicast()
        || ip.is_broadcast()
        || ip.is_documentation()
    {
        None
    } else {
        Some(Scope::Public)
    }
}

fn classify_ipv6(ip: &Ipv6Addr) -> Option<Scope> {
    let first = ip.segments()[0];
    if ip.is_loopback() {
        Some(Scope::Device)
    } else if first & 0xfe00 == 0xfc00 || first & 0xffc0 == 0xfe80 {
        // fc00::/7 unique local, fe80::/10 link-local
        Some(Scope::Local)
    } else if ip.is_unspecified()
        || ip.is_multicast()
        || (first == 0x2001 && ip.segments()[1] == 0x0db8)
    {
        None
    } else {
        Some(Scope::Public)
    }
}

/// Resolves the advertisable hosts for a scope.
#[derive(Debug, Clone)]
pub struct AddressResolver {
    source: Arc<dyn InterfaceSource>,
    ipv6: bool,
}

impl AddressResolver {
    /// Creates a resolver over the given interface source. IPv6 candidates are
    /// excluded until [`with_ipv6`](Self::with_ipv6) enables them.
    pub fn new(source: Arc<dyn InterfaceSource>) -> Self {
        Self {
            source,
            ipv6: false,
        }
    }

    /// Creates a resolver over the machine's real interfaces.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemInterfaces))
    }

    /// Includes or excludes IPv6 interface addresses.
    #[must_use]
    pub fn with_ipv6(mut self, enabled: bool) -> Self {
        self.ipv6 = enabled;
        self
    }

    /// Returns the ordered, de-duplicated hosts advertisable for `scope`.
    ///
    /// A concrete `explicit_host` always wins and is returned on its own,
    /// whatever the scope. Otherwise interface addresses are filtered by scope;
    /// an empty result means "nothing to advertise here", not a failure.
    pub fn resolve(&self, explicit_host: Option<&str>, scope: &Scope) -> Vec<String> {
        if let Some(host) = explicit_host
            && !is_wildcard_host(host)
        {
            return vec![host.to_string()];
        }

        let mut hosts: Vec<String> = Vec::new();
        for ip in self.source.addresses() {
            if ip.is_ipv6() && !self.ipv6 {
                continue;
            }
            if classify_ip(&ip).as_ref() != Some(scope) {
                continue;
            }
            let host = ip.to_string();
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }

        debug!("Resolved {} host(s) for scope {}: {:?}", hosts.len(), scope, hosts);
        hosts
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_resolver() -> AddressResolver {
        AddressResolver::new(Arc::new(StaticInterfaces(vec![
            "127.0.0.1".parse().unwrap(),
            "::1".parse().unwrap(),
            "192.168.1.20".parse().unwrap(),
            "169.254.3.4".parse().unwrap(),
            "fe80::1".parse().unwrap(),
            "93.184.216.34".parse().unwrap(),
            "2606:4700::1111".parse().unwrap(),
            "192.168.1.20".parse().unwrap(),
        ])))
    }

    #[test]
    fn test_explicit_host_wins() {
        let resolver = sample_resolver();
        assert_eq!(
            resolver.resolve(Some("example.com"), &Scope::Public),
            vec!["example.com"]
        );
        assert_eq!(
            resolver.resolve(Some("10.0.0.9"), &Scope::Device),
            vec!["10.0.0.9"]
        );
    }

    #[test]
    fn test_wildcard_host_enumerates() {
        let resolver = sample_resolver();
        assert_eq!(resolver.resolve(Some("0.0.0.0"), &Scope::Device), vec!["127.0.0.1"]);
        assert_eq!(resolver.resolve(Some("::"), &Scope::Device), vec!["127.0.0.1"]);
    }

    #[test]
    fn test_scope_filtering_ipv4() {
        let resolver = sample_resolver();
        assert_eq!(resolver.resolve(None, &Scope::Device), vec!["127.0.0.1"]);
        assert_eq!(
            resolver.resolve(None, &Scope::Local),
            vec!["192.168.1.20", "169.254.3.4"]
        );
        assert_eq!(resolver.resolve(None, &Scope::Public), vec!["93.184.216.34"]);
    }

    #[test]
    fn test_scope_filtering_ipv6() {
        let resolver = sample_resolver().with_ipv6(true);
        assert_eq!(resolver.resolve(None, &Scope::Device), vec!["127.0.0.1", "::1"]);
        assert_eq!(
            resolver.resolve(None, &Scope::Public),
            vec!["93.184.216.34", "2606:4700::1111"]
        );
    }

    #[test]
    fn test_no_matching_interface_is_empty() {
        let resolver = AddressResolver::new(Arc::new(StaticInterfaces(vec![
            "127.0.0.1".parse().unwrap(),
        ])));
        assert!(resolver.resolve(None, &Scope::Public).is_empty());
        assert!(resolver.resolve(None, &Scope::Other("mesh".into())).is_empty());
    }

    #[test]
    fn test_resolution_is_stable() {
        let resolver = sample_resolver();
        let first = resolver.resolve(None, &Scope::Local);
        let second = resolver.resolve(None, &Scope::Local);
        assert_eq!(first, second);
    }

    #[test]
    fn test_classify_ip() {
        assert_eq!(classify_ip(&"127.0.0.5".parse().unwrap()), Some(Scope::Device));
        assert_eq!(classify_ip(&"10.1.2.3".parse().unwrap()), Some(Scope::Local));
        assert_eq!(classify_ip(&"172.20.0.1".parse().unwrap()), Some(Scope::Local));
        assert_eq!(classify_ip(&"fd00::7".parse().unwrap()), Some(Scope::Local));
        assert_eq!(classify_ip(&"8.8.8.8".parse().unwrap()), Some(Scope::Public));
        assert_eq!(
            classify_ip(&"::ffff:127.0.0.1".parse().unwrap()),
            Some(Scope::Device)
        );
        assert_eq!(classify_ip(&"0.0.0.0".parse().unwrap()), None);
        assert_eq!(classify_ip(&"224.0.0.1".parse().unwrap()), None);
    }
}
