use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{clients::rbmq::RabbitMqClient, models::notification::OrderNotification};

/// Queue carrying both incoming order events and the records published
/// back after a mail send. Nothing filters the echo; re-consumed records
/// carry a timestamp and land in the persist branch.
pub const ORDERS_TOPIC: &str = "orders";

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persist a notification, assigning an id when it has none.
    /// Saving an id that already exists overwrites that record.
    async fn save(&self, notification: &OrderNotification) -> Result<Uuid, Error>;

    async fn find_all(&self) -> Result<Vec<OrderNotification>, Error>;
}

#[async_trait]
pub trait MailGateway: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, notification: &OrderNotification) -> Result<(), Error>;
}

/// Sends order mail, records the send, and announces it on the queue.
pub struct MailService {
    gateway: Arc<dyn MailGateway>,
    store: Arc<dyn NotificationStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl MailService {
    pub fn new(
        gateway: Arc<dyn MailGateway>,
        store: Arc<dyn NotificationStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            gateway,
            store,
            publisher,
        }
    }

    /// Send the mail, then persist a timestamped record of it, then publish
    /// the record back to the orders queue. A failed send or a failed save
    /// is an error for the caller; a failed publish only logs a warning.
    pub async fn send_mail(&self, to: &str, subject: &str, text: &str) -> Result<(), Error> {
        info!(to = %to, subject = %subject, "Sending order mail");

        self.gateway.send(to, subject, text).await?;

        let mut notification = OrderNotification::sent_now(to, text, subject);
        let id = self.store.save(&notification).await?;
        notification.id = Some(id);

        debug!(id = %id, "Sent mail recorded");

        if let Err(e) = self.publisher.publish(ORDERS_TOPIC, &notification).await {
            warn!(error = %e, "Failed to publish sent-mail record");
        }

        Ok(())
    }
}

/// Routes each consumed order event: timestamped records are persisted,
/// untimestamped events trigger a mail send.
pub struct OrderDispatcher {
    store: Arc<dyn NotificationStore>,
    mail_service: Arc<MailService>,
}

impl OrderDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, mail_service: Arc<MailService>) -> Self {
        Self {
            store,
            mail_service,
        }
    }

    /// Handle one raw queue payload. Payloads that fail to deserialize are
    /// logged and dropped without surfacing an error; store and mail
    /// failures propagate to the consumer loop.
    pub async fn on_message(&self, payload: &str) -> Result<(), Error> {
        info!("Received order message: {}", payload);

        let notification = match serde_json::from_str::<OrderNotification>(payload) {
            Ok(notification) => notification,
            Err(e) => {
                error!(error = %e, "Discarding malformed order message");
                return Ok(());
            }
        };

        if notification.is_order_confirmation() {
            let id = self.store.save(&notification).await?;
            debug!(id = %id, "Order confirmation persisted");
        } else {
            self.mail_service
                .send_mail(&notification.to, &notification.subject, &notification.text)
                .await?;
        }

        Ok(())
    }
}

/// Consume the orders queue until the stream closes. Every delivery is
/// acknowledged exactly once, whether handling succeeded or not; failed
/// messages are logged and not redelivered.
pub async fn run_consumer(
    rabbitmq_client: Arc<RabbitMqClient>,
    dispatcher: Arc<OrderDispatcher>,
) -> Result<(), Error> {
    let mut consumer = rabbitmq_client.create_consumer().await?;

    info!(queue = ORDERS_TOPIC, "Order consumer started");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(delivery) => delivery,
            Err(e) => {
                warn!(error = %e, "Failed to receive delivery");
                continue;
            }
        };

        let payload = String::from_utf8_lossy(&delivery.data).to_string();

        if let Err(e) = dispatcher.on_message(&payload).await {
            error!(error = %e, "Order message handling failed");
        }

        rabbitmq_client.acknowledge(delivery.delivery_tag).await?;
    }

    Ok(())
}
