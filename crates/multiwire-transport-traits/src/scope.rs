//! Visibility scopes.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A visibility label controlling which addresses a plugin may advertise.
///
/// The three well-known labels map onto address classes (see
/// [`AddressResolver`](crate::AddressResolver)); any other label is kept
/// verbatim so callers can define their own scopes, but it never matches a
/// network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    /// Loopback only, reachable from this machine.
    #[default]
    Device,
    /// Private and link-local ranges, reachable from the LAN.
    Local,
    /// Globally routable addresses.
    Public,
    /// Any other label.
    Other(String),
}

impl Scope {
    /// Returns the label string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Device => "device",
            Self::Local => "local",
            Self::Public => "public",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Scope {
    fn from(label: &str) -> Self {
        match label {
            "device" => Self::Device,
            "local" => Self::Local,
            "public" => Self::Public,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Scope {
    fn from(label: String) -> Self {
        match label.as_str() {
            "device" | "local" | "public" => Self::from(label.as_str()),
            _ => Self::Other(label),
        }
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Scope {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

/// The scope a plugin instance is configured with: one label or a set of labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScopeConfig {
    /// A single label.
    Single(Scope),
    /// A set of labels, in configuration order.
    Many(Vec<Scope>),
}

impl ScopeConfig {
    /// Returns `true` if `target` equals the configured label or is a member
    /// of the configured set.
    pub fn allows(&self, target: &Scope) -> bool {
        match self {
            Self::Single(scope) => scope == target,
            Self::Many(scopes) => scopes.contains(target),
        }
    }

    /// Iterates the configured labels.
    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        let labels: &[Scope] = match self {
            Self::Single(scope) => std::slice::from_ref(scope),
            Self::Many(scopes) => scopes,
        };
        labels.iter()
    }

    /// Returns the label when exactly one is configured.
    pub fn single(&self) -> Option<&Scope> {
        match self {
            Self::Single(scope) => Some(scope),
            Self::Many(scopes) if scopes.len() == 1 => scopes.first(),
            Self::Many(_) => None,
        }
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self::Single(Scope::Device)
    }
}

impl From<Scope> for ScopeConfig {
    fn from(scope: Scope) -> Self {
        Self::Single(scope)
    }
}

impl From<Vec<Scope>> for ScopeConfig {
    fn from(scopes: Vec<Scope>) -> Self {
        Self::Many(scopes)
    }
}

impl fmt::Display for ScopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(scope) => write!(f, "{scope}"),
            Self::Many(scopes) => {
                let labels: Vec<&str> = scopes.iter().map(Scope::as_str).collect();
                write!(f, "[{}]", labels.join(", "))
            }
        }
    }
}
