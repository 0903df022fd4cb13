mod config;
mod worker;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("worker=debug,reqwest=info,tower_http=info")),
        )
        .init();

    // Nombre de host: identifica al worker y arma la dirección anunciada por defecto
    let hostname = hostname::get()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let config = WorkerConfig::from_env(&hostname);
    worker::run(config, hostname).await
}
