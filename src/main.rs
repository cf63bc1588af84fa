use anyhow::Context;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use webcaf::config::AppConfig;
use webcaf::core::shared::utils::{create_conn, run_migrations};
use webcaf::framework::FrameworkRegistry;
use webcaf::web_server::run_server;
use webcaf::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let frameworks = FrameworkRegistry::load_dir(&config.frameworks.directory).with_context(|| {
        format!(
            "Failed to load frameworks from {}",
            config.frameworks.directory.display()
        )
    })?;
    info!(
        "Loaded frameworks: {}",
        frameworks.ids().collect::<Vec<_>>().join(", ")
    );

    let state = match config.database_url().map(str::to_string) {
        Some(url) => {
            let pool = create_conn(&url).context("Failed to create database pool")?;
            run_migrations(&pool)?;
            info!("Database migrations applied");
            AppState::with_pool(config, frameworks, pool)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory stores; data is lost on restart");
            AppState::in_memory(config, frameworks)
        }
    };

    run_server(Arc::new(state)).await?;
    info!("Server stopped");
    Ok(())
}
