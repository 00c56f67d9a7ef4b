use std::sync::Arc;

use opdq::service::TokenService;
use opdq::transport::{ServerConfig, serve};
use opdq::{MemoryEventSink, MemoryPatientDirectory, MemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();

    let service = Arc::new(TokenService::with_parts(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryPatientDirectory::new()),
        Arc::new(MemoryEventSink::new()),
        config.lock_timeout,
    ));

    serve(config, service).await
}
