//! Settings loading: TOML file, then `MULTIWIRE_*` environment variables

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use multiwire::net::NetConfig;
use multiwire::websocket::WsConfig;
use multiwire::{Scope, ScopeConfig};
use serde::{Deserialize, Serialize};

use crate::cli::PluginArgs;
use crate::error::CliResult;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MULTIWIRE";

/// Per-transport settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Stream transport
    pub net: NetConfig,
    /// WebSocket transport
    pub ws: WsConfig,
}

impl Settings {
    /// Load from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        Self::load_with(path, environment())
    }

    /// Load from an optional file plus the given environment source.
    pub fn load_with(path: Option<&Path>, env: Environment) -> CliResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        let settings = builder.add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("net.scope")
        .with_list_parse_key("ws.scope")
        .try_parsing(true)
}

fn scope_override(labels: &[String]) -> Option<ScopeConfig> {
    match labels {
        [] => None,
        [one] => Some(ScopeConfig::Single(Scope::from(one.as_str()))),
        many => Some(ScopeConfig::Many(
            many.iter().map(|label| Scope::from(label.as_str())).collect(),
        )),
    }
}

impl PluginArgs {
    /// Apply the command-line overrides to a stream configuration
    pub fn apply_net(&self, mut config: NetConfig) -> NetConfig {
        if let Some(scope) = scope_override(&self.scope) {
            config.scope = scope;
        }
        config.host = self.host.clone().or(config.host);
        config.port = self.port.or(config.port);
        config.external = self.external.clone().or(config.external);
        config
    }

    /// Apply the command-line overrides to a WebSocket configuration
    pub fn apply_ws(&self, mut config: WsConfig) -> WsConfig {
        if let Some(scope) = scope_override(&self.scope) {
            config.scope = scope;
        }
        config.host = self.host.clone().or(config.host);
        config.port = self.port.or(config.port);
        config.external = self.external.clone().or(config.external);
        config
    }
}
