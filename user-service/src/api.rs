use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{
    auth::{AuthError, AuthService},
    clients::health::HealthChecker,
    config::Config,
    models::{
        health::HealthStatus,
        user::{LoginRequest, RegisterRequest, UserResponse},
    },
};

pub struct AppState {
    pub auth_service: AuthService,
    pub health_checker: HealthChecker,
}

pub async fn run_api_server(
    config: Config,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/users", get(list_users))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "User API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> impl IntoResponse {
    match state.auth_service.register(&request).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => auth_error_response(e),
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    match state.auth_service.login(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => auth_error_response(e),
    }
}

async fn list_users(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.auth_service.list_users().await {
        Ok(users) => {
            let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
            (StatusCode::OK, Json(users)).into_response()
        }
        Err(e) => auth_error_response(e),
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

pub fn auth_error_response(error: AuthError) -> Response {
    let status = match &error {
        AuthError::InvalidCredentials | AuthError::AccountDisabled => StatusCode::UNAUTHORIZED,
        AuthError::AlreadyRegistered => StatusCode::CONFLICT,
        AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %error, "Auth request failed");
    }

    // One body for every unauthorized outcome; whether the account exists,
    // is disabled, or the password was wrong stays in the server logs.
    let body = if status == StatusCode::UNAUTHORIZED {
        "Invalid credentials".to_string()
    } else {
        error.to_string()
    };

    (status, body).into_response()
}
