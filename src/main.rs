use anyhow::Context;
use filedrop::config::Config;
use filedrop::storage::DiskIndex;
use filedrop::{create_router, server, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filedrop=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    let index = DiskIndex::create(&config.upload_dir)
        .await
        .with_context(|| format!("cannot open upload directory {}", config.upload_dir.display()))?;
    tracing::info!(dir = %index.root().display(), "storing uploads");

    let tls = server::load_tls(&config).await?;

    let app = create_router(AppState::new(Arc::new(index), config.port));
    server::serve(&config, tls, app).await?;
    Ok(())
}
