//! CLI argument parsing

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main CLI application structure
#[derive(Parser, Debug)]
#[command(
    name = "multiwire",
    version,
    about = "Listen, dial and inspect multiwire transport addresses",
    long_about = "multiwire runs the net (TCP) and WebSocket transport plugins from the command line.\n\
                  Addresses look like net:<host>:<port> or ws[s]://host[:port]; several addresses\n\
                  for one listener are joined with ';'.\n\n\
                  Settings come from an optional TOML file (--config) and MULTIWIRE_* environment\n\
                  variables, e.g. MULTIWIRE_NET__PORT=8008 or MULTIWIRE_WS__SCOPE=local."
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value = "human")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Settings file (TOML)
    #[arg(long, short = 'c', global = true, env = "MULTIWIRE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Listen and echo every connection back to its sender
    Listen(ListenArgs),

    /// Dial an address and pipe stdin/stdout through the connection
    Dial(DialArgs),

    /// Decode an address with whichever transport recognises it
    Parse {
        /// Address to decode
        address: String,
    },

    /// Print the addresses a transport would advertise, per scope
    Stringify(StringifyArgs),
}

/// Overrides applied on top of the loaded settings
#[derive(Args, Debug, Clone, Default)]
pub struct PluginArgs {
    /// Scope labels, comma separated (device, local, public)
    #[arg(long, short = 's', value_delimiter = ',')]
    pub scope: Vec<String>,

    /// Host to bind and advertise
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(long, short = 'p')]
    pub port: Option<u16>,

    /// Public identity advertised for the public scope
    #[arg(long)]
    pub external: Option<String>,
}

/// Arguments for `listen`
#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Transport to listen on
    #[arg(long, short = 't', value_enum, default_value = "net")]
    pub transport: TransportKind,

    #[command(flatten)]
    pub plugin: PluginArgs,
}

/// Arguments for `dial`
#[derive(Args, Debug)]
pub struct DialArgs {
    /// Address to dial
    pub address: String,

    /// Transport (auto-detected from the address if not specified)
    #[arg(long, short = 't', value_enum)]
    pub transport: Option<TransportKind>,

    /// Give up on the dial after this many seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

/// Arguments for `stringify`
#[derive(Args, Debug)]
pub struct StringifyArgs {
    /// Transport whose addresses to print
    #[arg(long, short = 't', value_enum, default_value = "net")]
    pub transport: TransportKind,

    /// Only print this scope
    #[arg(long)]
    pub target: Option<String>,

    #[command(flatten)]
    pub plugin: PluginArgs,
}

/// Transport types
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Plain TCP, `net:<host>:<port>`
    Net,
    /// WebSocket, `ws://` or `wss://`
    Ws,
}

/// Output formats
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Human,
    /// JSON output
    Json,
}
