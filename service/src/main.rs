use anyhow::Context;
use asset_store::config::Config;
use asset_store::logging::logger_setup;
use asset_store::observability::{tracer_provider_setup, tracer_provider_shutdown};
use asset_store::repository::sqlite_repository::SqliteAssetRepository;
use asset_store::server::serve;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let provider = tracer_provider_setup(config.trace_stdout);
    logger_setup(&provider)?;

    let repository = SqliteAssetRepository::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("could not open image store at {}", config.database_url))?;
    let repository = Arc::new(repository);

    let addr = config.listen_addr;
    info!("Attempting to start server at {addr}");
    let listener = TcpListener::bind(addr).await?;
    info!("Server started at {addr}");

    serve(listener, repository.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await;

    repository.close().await;
    tracer_provider_shutdown(provider);
    info!("Server stopped");
    Ok(())
}
