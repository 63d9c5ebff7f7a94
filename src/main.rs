use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use chart_insight::config::{FirebaseCredentials, StoreConfig};
use chart_insight::{AppState, Config, web_pages};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let state = AppState::build(&config).context("failed to initialise clients")?;
    match &config.store {
        StoreConfig::Firebase {
            database_url,
            credentials,
        } => {
            let auth = match credentials {
                FirebaseCredentials::None => "none",
                FirebaseCredentials::DatabaseSecret(_) => "database secret",
                FirebaseCredentials::ServiceAccount(_) => "service account",
            };
            info!(%database_url, auth, "using firebase response store")
        }
        StoreConfig::Local { cache_dir } => {
            info!(cache_dir = %cache_dir.display(), "using local response store")
        }
    }

    let bind_address = config.bind_address();
    let tcp_listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!(%bind_address, model = %config.model, "chart insight server started");

    axum::serve(tcp_listener, web_pages::router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
