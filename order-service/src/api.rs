use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    clients::health::HealthChecker,
    config::Config,
    dispatcher::{MailService, NotificationStore},
    models::health::HealthStatus,
};

pub struct AppState {
    pub mail_service: Arc<MailService>,
    pub store: Arc<dyn NotificationStore>,
    pub health_checker: HealthChecker,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMailRequest {
    #[serde(default)]
    pub to: String,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub text: String,
}

pub async fn run_api_server(
    config: Config,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = Router::new()
        .route("/api/orders/sendMail", post(send_mail))
        .route("/get", get(get_all_notifications))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Order API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn send_mail(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendMailRequest>,
) -> impl IntoResponse {
    match state
        .mail_service
        .send_mail(&request.to, &request.subject, &request.text)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            format!("Mail request has been fulfilled:\n{:?}", request),
        ),
        Err(e) => {
            error!(error = %e, "Caught exception while sending mail");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "There was an error in sending the following mail:\n{:?}",
                    request
                ),
            )
        }
    }
}

async fn get_all_notifications(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.find_all().await {
        Ok(notifications) => (StatusCode::OK, Json(notifications)).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to fetch order notifications");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}
