use ag_backend::{GenBackend, GenBackendConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = GenBackendConfig::load()?;
    GenBackend::new(config).await?.run().await
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
