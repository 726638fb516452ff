use std::sync::Arc;

use argon2::{
    Argon2, Params,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::{
    jwt::JwtService,
    models::user::{LoginRequest, LoginResponse, RegisterRequest, User},
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Username or email is already registered")]
    AlreadyRegistered,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new user. A username or email collision is
    /// `AuthError::AlreadyRegistered`.
    async fn create_user(&self, user: &User) -> Result<(), AuthError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;

    async fn find_all(&self) -> Result<Vec<User>, AuthError>;
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, jwt_service: JwtService) -> Self {
        Self { users, jwt_service }
    }

    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        // OWASP recommended parameters: m=19456 (19 MiB), t=2, p=1
        let params = Params::new(19456, 2, 1, None)
            .map_err(|e| AuthError::Internal(format!("Invalid Argon2 params: {}", e)))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))?
            .to_string();

        Ok(password_hash)
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AuthError::Internal(format!("Invalid password hash format: {}", e)))?;

        // Verification reads the parameters back out of the hash
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<(), AuthError> {
        let password_hash = Self::hash_password(&request.password)?;
        let user = User::register(request, password_hash);

        self.users.create_user(&user).await?;

        info!(username = %user.username, "User registered");

        Ok(())
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let user = self
            .users
            .find_by_username(&request.username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.enabled {
            warn!(username = %request.username, "Login rejected for disabled account");
            return Err(AuthError::AccountDisabled);
        }

        if !Self::verify_password(&request.password, &user.password_hash)? {
            warn!(username = %request.username, "Login rejected for bad credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self
            .jwt_service
            .generate_token(&user.username)
            .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        info!(username = %user.username, "User logged in");

        Ok(LoginResponse {
            token,
            id: user.id,
            username: user.username,
            email: user.email,
        })
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        self.users.find_all().await
    }
}
