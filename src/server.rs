use crate::constants::{APP_PROTOCOL_VERSION, CORE_PROTOCOL_VERSION};
use crate::proto::provider_server::ProviderServer;
use crate::provider::EtcdProvider;
use crate::{ProviderError, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;
use tonic::transport::Server;
use tracing::{error, info, warn};

#[cfg(unix)]
use tokio::net::UnixListener;

/// Command-line arguments for the provider server.
#[derive(Parser, Debug)]
#[command(author, version, about = "etcd provider plugin server", long_about = None)]
struct Args {
    /// Address to bind to (socket path for unix, host:port for tcp).
    #[arg(long)]
    address: String,

    /// Network type (unix or tcp).
    #[arg(long, default_value = "unix")]
    network: String,
}

/// Serves the provider on the address given on the command line.
///
/// Once listening, a single handshake line is written to stdout (see
/// [`handshake_line`]) so the host knows where to connect. The server runs
/// until SIGINT or SIGTERM; a Unix socket file is removed on the way out.
///
/// # Arguments
///
/// * `provider` - The provider to serve
/// * `args` - Optional command-line arguments (defaults to std::env::args())
pub async fn serve(provider: EtcdProvider, args: Option<Vec<String>>) -> Result<()> {
    let args = if let Some(args) = args {
        Args::parse_from(args)
    } else {
        Args::parse()
    };

    info!(
        "Starting provider server on {} ({})",
        args.address, args.network
    );

    let service = ProviderServer::new(provider);

    match args.network.as_str() {
        "unix" => serve_unix(service, &args.address).await,
        "tcp" => serve_tcp(service, &args.address).await,
        network => Err(ProviderError::Configuration(format!(
            "Unsupported network type: {}",
            network
        ))),
    }
}

/// `<core version>|<app version>|<network>|<address>|grpc`
pub fn handshake_line(network: &str, address: &str) -> String {
    format!(
        "{}|{}|{}|{}|grpc",
        CORE_PROTOCOL_VERSION, APP_PROTOCOL_VERSION, network, address
    )
}

fn announce(network: &str, address: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", handshake_line(network, address))?;
    stdout.flush()?;
    Ok(())
}

#[cfg(unix)]
async fn serve_unix<S>(service: S, address: &str) -> Result<()>
where
    S: tonic::codegen::Service<
            http::Request<tonic::body::BoxBody>,
            Response = http::Response<tonic::body::BoxBody>,
            Error = std::convert::Infallible,
        > + tonic::server::NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    use tokio_stream::wrappers::UnixListenerStream;

    let path = PathBuf::from(address);

    // Remove existing socket file if it exists.
    if path.exists() {
        warn!("Removing existing socket file: {}", address);
        std::fs::remove_file(&path)?;
    }

    let listener = UnixListener::bind(&path)?;
    let stream = UnixListenerStream::new(listener);

    info!("Listening on Unix socket: {}", address);
    announce("unix", address)?;

    Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(stream, shutdown_signal())
        .await?;

    if path.exists() {
        info!("Cleaning up socket file: {}", address);
        let _ = std::fs::remove_file(&path);
    }

    Ok(())
}

#[cfg(not(unix))]
async fn serve_unix<S>(_service: S, _address: &str) -> Result<()>
where
    S: tonic::codegen::Service<
            http::Request<tonic::body::BoxBody>,
            Response = http::Response<tonic::body::BoxBody>,
            Error = std::convert::Infallible,
        > + tonic::server::NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    Err(ProviderError::Configuration(
        "Unix sockets not supported on this platform".to_string(),
    ))
}

async fn serve_tcp<S>(service: S, address: &str) -> Result<()>
where
    S: tonic::codegen::Service<
            http::Request<tonic::body::BoxBody>,
            Response = http::Response<tonic::body::BoxBody>,
            Error = std::convert::Infallible,
        > + tonic::server::NamedService
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    use tokio_stream::wrappers::TcpListenerStream;

    let addr: std::net::SocketAddr = address
        .parse()
        .map_err(|e| ProviderError::Configuration(format!("Invalid TCP address: {}", e)))?;

    // Bind first so a port of 0 is reported as the port actually chosen.
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    info!("Listening on TCP: {}", local);
    announce("tcp", &local.to_string())?;

    Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal())
        .await?;

    Ok(())
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down gracefully");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_names_network_and_address() {
        assert_eq!(
            handshake_line("tcp", "127.0.0.1:40123"),
            "1|1|tcp|127.0.0.1:40123|grpc"
        );
    }

    #[tokio::test]
    async fn rejects_unknown_network() {
        let provider = EtcdProvider::new().unwrap();
        let args = ["terraform-provider-etcd", "--address", "x", "--network", "udp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = serve(provider, Some(args)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn rejects_bad_tcp_address() {
        let provider = EtcdProvider::new().unwrap();
        let args = ["terraform-provider-etcd", "--address", "nowhere", "--network", "tcp"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let err = serve(provider, Some(args)).await.unwrap_err();
        assert!(err.to_string().contains("Invalid TCP address"));
    }
}
