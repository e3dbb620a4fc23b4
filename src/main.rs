use std::process;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wxgate::webhook::server;
use wxgate::{CredentialCache, FileStore, WeixinApi, WxGateConfig, WxGateError};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        error!("wxgate exited: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), WxGateError> {
    let config = WxGateConfig::from_env()?;
    let source = Arc::new(WeixinApi::new(&config)?);
    let store = FileStore::new(&config.store_dir)?;
    let cache = CredentialCache::new(source, store);

    server::serve(&config, cache).await
}
