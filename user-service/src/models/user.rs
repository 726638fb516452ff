use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    Admin,
    User,
    Moderator,
    Guest,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Role::Admin => write!(f, "ROLE_ADMIN"),
            Role::User => write!(f, "ROLE_USER"),
            Role::Moderator => write!(f, "ROLE_MODERATOR"),
            Role::Guest => write!(f, "ROLE_GUEST"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub enabled: bool,
    pub roles: Vec<String>,
}

impl User {
    /// New accounts start enabled with the plain user role.
    pub fn register(request: &RegisterRequest, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash,
            first_name: request.first_name.clone(),
            last_name: request.last_name.clone(),
            enabled: true,
            roles: vec![Role::User.to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

/// Outward shape of a user. The password hash never leaves the service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub enabled: bool,
    pub roles: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            enabled: user.enabled,
            roles: user.roles,
        }
    }
}
