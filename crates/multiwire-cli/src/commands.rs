//! Command execution on top of the transport plugins

use std::sync::Arc;
use std::time::Duration;

use multiwire::net::NetPlugin;
use multiwire::websocket::WsPlugin;
use multiwire::traits::OnConnection;
use multiwire::{
    AddressRecord, ConnectionHandle, DialTarget, OsAssignedPorts, PortAllocator, Scope,
    TransportPlugin,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::cli::{
    Commands, DialArgs, ListenArgs, OutputFormat, PluginArgs, StringifyArgs, TransportKind,
};
use crate::error::{CliError, CliResult};
use crate::output;
use crate::settings::Settings;

/// Execute CLI commands
#[derive(Debug)]
pub struct CommandExecutor {
    format: OutputFormat,
    settings: Settings,
}

impl CommandExecutor {
    #[must_use]
    pub fn new(format: OutputFormat, settings: Settings) -> Self {
        Self { format, settings }
    }

    /// Execute a command
    pub async fn execute(&self, command: Commands) -> CliResult<()> {
        match command {
            Commands::Listen(args) => self.execute_listen(args).await,
            Commands::Dial(args) => self.execute_dial(args).await,
            Commands::Parse { address } => self.execute_parse(&address),
            Commands::Stringify(args) => self.execute_stringify(&args),
        }
    }

    /// Build one plugin from the settings plus command-line overrides
    pub fn plugin(&self, kind: TransportKind, overrides: &PluginArgs) -> Arc<dyn TransportPlugin> {
        match kind {
            TransportKind::Net => Arc::new(NetPlugin::from_config(
                overrides.apply_net(self.settings.net.clone()),
            )),
            TransportKind::Ws => Arc::new(WsPlugin::from_config(
                overrides.apply_ws(self.settings.ws.clone()),
            )),
        }
    }

    /// Like [`plugin`](Self::plugin), but an unpinned port stays unknown
    /// instead of being drawn at random. Nothing listens here, so a random
    /// port would advertise an address nobody serves.
    pub fn offline_plugin(
        &self,
        kind: TransportKind,
        overrides: &PluginArgs,
    ) -> Arc<dyn TransportPlugin> {
        let ports: Arc<dyn PortAllocator> = Arc::new(OsAssignedPorts);
        match kind {
            TransportKind::Net => Arc::new(
                NetPlugin::builder()
                    .config(overrides.apply_net(self.settings.net.clone()))
                    .ports(ports)
                    .build(),
            ),
            TransportKind::Ws => Arc::new(
                WsPlugin::builder()
                    .config(overrides.apply_ws(self.settings.ws.clone()))
                    .ports(ports)
                    .build(),
            ),
        }
    }

    /// Find the transport that understands `address`.
    ///
    /// With `only` set, that transport is the sole candidate and an address it
    /// cannot decode is handed to it as a native target.
    pub fn recognise(
        &self,
        address: &str,
        only: Option<TransportKind>,
    ) -> CliResult<(Arc<dyn TransportPlugin>, DialTarget)> {
        let kinds = match only {
            Some(kind) => vec![kind],
            None => vec![TransportKind::Net, TransportKind::Ws],
        };
        for kind in kinds {
            let plugin = self.plugin(kind, &PluginArgs::default());
            if let Some(record) = plugin.parse(address) {
                debug!("{} recognised {}", plugin.name(), address);
                return Ok((plugin, record.into()));
            }
            if only.is_some() {
                return Ok((plugin, DialTarget::Native(address.to_string())));
            }
        }
        Err(CliError::Unrecognised(address.to_string()))
    }

    /// Decode an address with the first transport that accepts it
    pub fn decode(&self, address: &str) -> CliResult<AddressRecord> {
        [TransportKind::Net, TransportKind::Ws]
            .into_iter()
            .find_map(|kind| self.plugin(kind, &PluginArgs::default()).parse(address))
            .ok_or_else(|| CliError::Unrecognised(address.to_string()))
    }

    async fn execute_listen(&self, args: ListenArgs) -> CliResult<()> {
        let plugin = self.plugin(args.transport, &args.plugin);
        let closer = plugin
            .listen(echo_handler())
            .ok_or(CliError::Unsupported(plugin.name()))?
            .await?;

        let entries = advertised(plugin.as_ref(), None);
        println!("{}", output::render_addresses(self.format, &entries)?);
        info!("Listening on {:?}, press Ctrl-C to stop", closer.local_addr());

        tokio::signal::ctrl_c().await?;
        info!("Shutting down");
        closer.shutdown().await?;
        Ok(())
    }

    async fn execute_dial(&self, args: DialArgs) -> CliResult<()> {
        let (plugin, target) = self.recognise(&args.address, args.transport)?;
        let elapsed = Duration::from_secs(args.timeout);
        let conn = tokio::time::timeout(elapsed, plugin.dial(target))
            .await
            .map_err(|_| CliError::Timeout {
                operation: format!("dial {}", args.address),
                elapsed,
            })??;
        info!("Connected to {}", conn.peer_address());

        let (sent, received) = pipe(conn, tokio::io::stdin(), tokio::io::stdout()).await?;
        debug!("Sent {} bytes, received {} bytes", sent, received);
        Ok(())
    }

    fn execute_parse(&self, address: &str) -> CliResult<()> {
        let record = self.decode(address)?;
        println!("{}", output::render_record(self.format, &record)?);
        Ok(())
    }

    fn execute_stringify(&self, args: &StringifyArgs) -> CliResult<()> {
        let plugin = self.offline_plugin(args.transport, &args.plugin);
        let target = args.target.as_deref().map(Scope::from);
        let entries = advertised(plugin.as_ref(), target);
        println!("{}", output::render_addresses(self.format, &entries)?);
        Ok(())
    }
}

/// The addresses `plugin` advertises for `target`, or for every scope it is
/// configured with.
pub fn advertised(
    plugin: &dyn TransportPlugin,
    target: Option<Scope>,
) -> Vec<(Scope, Option<String>)> {
    let scopes: Vec<Scope> = match target {
        Some(scope) => vec![scope],
        None => plugin.scope().iter().cloned().collect(),
    };
    scopes
        .into_iter()
        .map(|scope| {
            let joined = plugin.stringify(&scope);
            (scope, joined)
        })
        .collect()
}

/// Writes every accepted connection's bytes straight back to it.
pub fn echo_handler() -> OnConnection {
    Arc::new(|conn: ConnectionHandle| {
        let peer = conn.peer_address().to_string();
        tokio::spawn(async move {
            let (mut reader, mut writer) = tokio::io::split(conn);
            match tokio::io::copy(&mut reader, &mut writer).await {
                Ok(echoed) => debug!("Echoed {} bytes to {}", echoed, peer),
                Err(e) => warn!("Echo to {} failed: {}", peer, e),
            }
            let _ = writer.shutdown().await;
        });
    })
}

/// Copies `input` into the connection and the connection into `output` until
/// both directions finish. Returns `(sent, received)` byte counts.
pub async fn pipe<R, W>(conn: ConnectionHandle, mut input: R, mut output: W) -> CliResult<(u64, u64)>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(conn);
    let upstream = async {
        let sent = tokio::io::copy(&mut input, &mut writer).await?;
        writer.shutdown().await?;
        Ok::<_, std::io::Error>(sent)
    };
    let downstream = async {
        let received = tokio::io::copy(&mut reader, &mut output).await?;
        output.flush().await?;
        Ok::<_, std::io::Error>(received)
    };
    Ok(tokio::try_join!(upstream, downstream)?)
}
