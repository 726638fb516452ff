use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use order_service::{
    api::{AppState, run_api_server},
    clients::{
        database::DatabaseClient, health::HealthChecker, mail::SmtpClient, rbmq::RabbitMqClient,
    },
    config::Config,
    dispatcher::{MailService, OrderDispatcher, run_consumer},
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "order_service=debug,lapin=warn,sqlx=warn,tower_http=info".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    let database_client = Arc::new(DatabaseClient::connect(&config.database_url).await?);
    let rabbitmq_client = Arc::new(RabbitMqClient::connect(&config).await?);
    let smtp_client = Arc::new(SmtpClient::new(&config)?);

    let mail_service = Arc::new(MailService::new(
        smtp_client,
        database_client.clone(),
        rabbitmq_client.clone(),
    ));

    let dispatcher = Arc::new(OrderDispatcher::new(
        database_client.clone(),
        mail_service.clone(),
    ));

    let state = Arc::new(AppState {
        mail_service,
        store: database_client,
        health_checker: HealthChecker::new(config.clone()),
    });

    tokio::select! {
        result = run_api_server(config.clone(), state) => {
            result.map_err(|e| anyhow!("API server failed: {}", e))?;
        }
        result = run_consumer(rabbitmq_client, dispatcher) => {
            result?;
        }
    }

    Ok(())
}
