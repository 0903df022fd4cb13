mod config;
mod driver;
mod handlers;
mod pool;
mod rpc;
mod scheduler;
mod state;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::MasterConfig;
use crate::rpc::HttpTaskCaller;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,axum=info,tower_http=info")),
        )
        .init();

    let config = MasterConfig::from_env();
    info!(
        "config: data_dir={} max_attempts={:?}",
        config.data_dir.display(),
        config.scheduler.max_attempts
    );

    let bind = config.bind.clone();
    let state = AppState::new(config, Arc::new(HttpTaskCaller::new(reqwest::Client::new())));

    // router HTTP
    let app = handlers::build_router(state);

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", bind))?;
    info!("master escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
