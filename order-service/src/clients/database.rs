use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{dispatcher::NotificationStore, models::notification::OrderNotification};

const CREATE_ORDER_NOTIFICATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS order_notifications (
    id UUID PRIMARY KEY,
    ordered_on TIMESTAMP,
    to_address TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    subject TEXT NOT NULL DEFAULT ''
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

        sqlx::query(CREATE_ORDER_NOTIFICATIONS_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| anyhow!("Failed to initialize order_notifications table: {}", e))?;

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
impl NotificationStore for DatabaseClient {
    async fn save(&self, notification: &OrderNotification) -> Result<Uuid, Error> {
        let id = notification.id.unwrap_or_else(Uuid::new_v4);

        // Re-consumed records arrive with their id already assigned;
        // saving them again overwrites in place instead of erroring.
        sqlx::query(
            r"
            INSERT INTO order_notifications (id, ordered_on, to_address, text, subject)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET ordered_on = EXCLUDED.ordered_on,
                to_address = EXCLUDED.to_address,
                text = EXCLUDED.text,
                subject = EXCLUDED.subject
            ",
        )
        .bind(id)
        .bind(notification.ordered_on)
        .bind(&notification.to)
        .bind(&notification.text)
        .bind(&notification.subject)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to write order notification");
            anyhow!("Database write failed: {}", e)
        })?;

        debug!(id = %id, "Order notification written to database");

        Ok(id)
    }

    async fn find_all(&self) -> Result<Vec<OrderNotification>, Error> {
        let notifications = sqlx::query_as::<_, OrderNotification>(
            "SELECT id, ordered_on, to_address, text, subject FROM order_notifications",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!("Failed to fetch order notifications: {}", e))?;

        Ok(notifications)
    }
}
