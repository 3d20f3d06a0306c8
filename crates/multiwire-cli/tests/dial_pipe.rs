//! End-to-end: listen with the echo handler, recognise the advertised address,
//! dial it and pipe bytes through.

use multiwire::net::NetConfig;
use multiwire::{Scope, TransportPlugin};
use multiwire_cli::cli::PluginArgs;
use multiwire_cli::commands::{advertised, echo_handler, pipe};
use multiwire_cli::{CliError, CommandExecutor, OutputFormat, Settings, TransportKind};
use pretty_assertions::assert_eq;

fn loopback_executor() -> CommandExecutor {
    let settings = Settings {
        net: NetConfig {
            host: Some("127.0.0.1".into()),
            ..NetConfig::default()
        },
        ..Settings::default()
    };
    CommandExecutor::new(OutputFormat::Human, settings)
}

#[tokio::test]
async fn test_pipe_through_echo_listener() {
    let exec = loopback_executor();
    let listener = exec.plugin(TransportKind::Net, &PluginArgs::default());
    let closer = listener.listen(echo_handler()).unwrap().await.unwrap();

    let entries = advertised(listener.as_ref(), None);
    assert_eq!(entries.len(), 1);
    let (scope, address) = &entries[0];
    assert_eq!(scope, &Scope::Device);
    let address = address.clone().unwrap();
    assert_eq!(
        address,
        format!("net:127.0.0.1:{}", closer.local_addr().unwrap().port())
    );

    let (dialer, target) = exec.recognise(&address, None).unwrap();
    assert_eq!(dialer.name(), "net");
    let conn = dialer.dial(target).await.unwrap();

    let mut received = Vec::new();
    let (sent, echoed) = pipe(conn, &b"through the pipe"[..], &mut received)
        .await
        .unwrap();
    assert_eq!(sent, 16);
    assert_eq!(echoed, 16);
    assert_eq!(received, b"through the pipe");

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_native_target_with_explicit_transport() {
    let exec = loopback_executor();
    let listener = exec.plugin(TransportKind::Net, &PluginArgs::default());
    let closer = listener.listen(echo_handler()).unwrap().await.unwrap();
    let native = closer.local_addr().unwrap().to_string();

    let (dialer, target) = exec.recognise(&native, Some(TransportKind::Net)).unwrap();
    let conn = dialer.dial(target).await.unwrap();
    let mut received = Vec::new();
    pipe(conn, &b"native"[..], &mut received).await.unwrap();
    assert_eq!(received, b"native");

    closer.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dial_refused_surfaces_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let exec = loopback_executor();
    let (dialer, target) = exec
        .recognise(&format!("net:127.0.0.1:{port}"), None)
        .unwrap();
    let err: CliError = dialer.dial(target).await.unwrap_err().into();
    assert!(err.to_string().starts_with("Transport error: Connection failed"));
    assert_eq!(err.suggestions().len(), 2);
}
