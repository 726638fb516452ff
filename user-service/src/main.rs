use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use user_service::{
    api::{AppState, run_api_server},
    auth::AuthService,
    clients::{database::DatabaseClient, health::HealthChecker},
    config::Config,
    jwt::JwtService,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,sqlx=warn,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    let database_client = Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let jwt_service = JwtService::new(&config.jwt_secret_key, config.jwt_expiration_secs);

    let state = Arc::new(AppState {
        auth_service: AuthService::new(database_client, jwt_service),
        health_checker: HealthChecker::new(config.clone()),
    });

    run_api_server(config, state)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))?;

    Ok(())
}
