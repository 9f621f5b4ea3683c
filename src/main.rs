use terraform_provider_etcd::{serve, EtcdProvider};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout belongs to the handshake; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Starting etcd provider");

    let provider = EtcdProvider::new()?;
    serve(provider, None).await?;

    Ok(())
}
