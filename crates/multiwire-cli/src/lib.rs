//! # multiwire CLI
//!
//! Command-line front end for the multiwire transport plugins.
//!
//! ## Usage
//!
//! ```bash
//! # Echo server on the stream transport, advertised on loopback and LAN
//! multiwire listen --transport net --scope device,local --port 8008
//!
//! # Pipe stdin/stdout through a connection; the transport is detected
//! multiwire dial net:127.0.0.1:8008
//!
//! # Decode an address
//! multiwire parse wss://example.com --format json
//!
//! # What would a WebSocket listener on port 9000 advertise publicly?
//! multiwire stringify --transport ws --port 9000 --external example.com --scope public
//! ```
//!
//! ## Architecture
//!
//! 1. **Command Layer** (`cli`): Clap-based argument parsing
//! 2. **Settings Layer** (`settings`): TOML file and `MULTIWIRE_*` environment
//! 3. **Execution Layer** (`commands`): builds plugins and runs the command
//! 4. **Output Layer** (`output`): human or JSON rendering

#![warn(rust_2018_idioms, clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod settings;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub use cli::{Cli, Commands, OutputFormat, TransportKind};
pub use commands::CommandExecutor;
pub use error::{CliError, CliResult};
pub use settings::Settings;

/// Run the CLI application
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("loading settings from {}", path.display()),
        None => "loading settings from the environment".to_string(),
    })?;
    let executor = CommandExecutor::new(cli.format, settings);

    executor.execute(cli.command).await?;
    Ok(())
}

/// Log to stderr so stdout stays free for piped data. `RUST_LOG` wins over
/// `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
