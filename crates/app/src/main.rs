mod auth;
mod identity;
mod problem;
mod router;
mod seminars;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use tracing::info;

use seminar_hub_core::SeminarService;
use seminar_hub_storage::Database;
use seminar_hub_util::{load_env_file, AppConfig};

use crate::identity::DirectoryBackend;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", database = %config.database_url, "database ready");

    let directory = DirectoryBackend::from_config(config.identity.as_ref(), reqwest::Client::new())?;
    let service = SeminarService::new(Arc::new(database), Arc::new(directory), config.display_tz);
    let state = router::AppState::new(metrics, service, &config.auth_secret);

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        display_tz = %config.display_tz,
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
