use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{debug, error, info};

use crate::{
    auth::{AuthError, UserStore},
    models::user::User,
};

const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    first_name TEXT NOT NULL DEFAULT '',
    last_name TEXT NOT NULL DEFAULT '',
    enabled BOOLEAN NOT NULL DEFAULT TRUE,
    roles TEXT[] NOT NULL DEFAULT '{}'
)";

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        info!("PostgreSQL connection established");

        sqlx::query(CREATE_USERS_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| anyhow!("Failed to initialize users table: {}", e))?;

        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for DatabaseClient {
    async fn create_user(&self, user: &User) -> Result<(), AuthError> {
        sqlx::query(
            r"
            INSERT INTO users (id, username, email, password_hash, first_name, last_name, enabled, roles)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.enabled)
        .bind(&user.roles)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AuthError::AlreadyRegistered
            }
            _ => {
                error!(error = %e, "Failed to insert user");
                AuthError::Database(e.to_string())
            }
        })?;

        debug!(id = %user.id, "User written to database");

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, username, email, password_hash, first_name, last_name, enabled, roles
            FROM users
            WHERE username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))
    }

    async fn find_all(&self) -> Result<Vec<User>, AuthError> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, username, email, password_hash, first_name, last_name, enabled, roles
            FROM users
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))
    }
}
