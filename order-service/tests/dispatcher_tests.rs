use std::sync::{Arc, Mutex};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use order_service::{
    dispatcher::{
        EventPublisher, MailGateway, MailService, NotificationStore, ORDERS_TOPIC, OrderDispatcher,
    },
    models::notification::OrderNotification,
};
use uuid::Uuid;

#[derive(Default)]
struct RecordingStore {
    saved: Mutex<Vec<OrderNotification>>,
}

#[async_trait]
impl NotificationStore for RecordingStore {
    async fn save(&self, notification: &OrderNotification) -> Result<Uuid, Error> {
        let id = notification.id.unwrap_or_else(Uuid::new_v4);

        let mut stored = notification.clone();
        stored.id = Some(id);

        // Keyed on id like the real store: saving an existing id overwrites.
        let mut saved = self.saved.lock().unwrap();
        match saved.iter_mut().find(|existing| existing.id == Some(id)) {
            Some(existing) => *existing = stored,
            None => saved.push(stored),
        }

        Ok(id)
    }

    async fn find_all(&self) -> Result<Vec<OrderNotification>, Error> {
        Ok(self.saved.lock().unwrap().clone())
    }
}

struct FailingStore;

#[async_trait]
impl NotificationStore for FailingStore {
    async fn save(&self, _notification: &OrderNotification) -> Result<Uuid, Error> {
        Err(anyhow!("Store offline"))
    }

    async fn find_all(&self) -> Result<Vec<OrderNotification>, Error> {
        Err(anyhow!("Store offline"))
    }
}

#[derive(Default)]
struct RecordingGateway {
    sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl MailGateway for RecordingGateway {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), Error> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), text.to_string()));

        Ok(())
    }
}

struct FailingGateway;

#[async_trait]
impl MailGateway for FailingGateway {
    async fn send(&self, _to: &str, _subject: &str, _text: &str) -> Result<(), Error> {
        Err(anyhow!("SMTP relay unavailable"))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, OrderNotification)>>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, notification: &OrderNotification) -> Result<(), Error> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), notification.clone()));

        Ok(())
    }
}

struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _topic: &str, _notification: &OrderNotification) -> Result<(), Error> {
        Err(anyhow!("Broker unavailable"))
    }
}

/// Test: Events carrying an order timestamp are persisted without sending mail
#[tokio::test]
async fn test_timestamped_event_is_persisted_not_mailed() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"Order #42 confirmed","subject":"Order Confirmation","orderedOn":"2024-01-01 10:00:00"}"#;
    dispatcher.on_message(payload).await?;

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1, "Exactly one record should be persisted");
    assert_eq!(saved[0].to, "a@x.com");
    assert_eq!(saved[0].text, "Order #42 confirmed");
    assert_eq!(saved[0].subject, "Order Confirmation");

    let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap();
    assert_eq!(
        saved[0].ordered_on,
        Some(expected),
        "The event's own timestamp should be kept"
    );

    assert!(
        gateway.sent.lock().unwrap().is_empty(),
        "No mail should be sent for a timestamped event"
    );
    assert!(
        publisher.published.lock().unwrap().is_empty(),
        "Nothing should be republished for a timestamped event"
    );

    Ok(())
}

/// Test: Events without an order timestamp trigger send, record, and publish
#[tokio::test]
async fn test_untimestamped_event_triggers_mail_flow() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s"}"#;
    dispatcher.on_message(payload).await?;

    let sent = gateway.sent.lock().unwrap();
    assert_eq!(sent.len(), 1, "Exactly one mail should be sent");
    assert_eq!(
        sent[0],
        ("a@x.com".to_string(), "s".to_string(), "hi".to_string())
    );

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1, "The send should be recorded once");
    assert_eq!(saved[0].to, "a@x.com");
    assert_eq!(saved[0].text, "hi");
    assert_eq!(saved[0].subject, "s");

    let recorded = saved[0]
        .ordered_on
        .expect("The record should be stamped with the send time");
    let drift = (Utc::now().naive_utc() - recorded).num_seconds().abs();
    assert!(drift < 5, "Record timestamp should be close to now");

    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1, "The record should be published once");
    assert_eq!(published[0].0, ORDERS_TOPIC);
    assert_eq!(
        published[0].1.id, saved[0].id,
        "The published record should carry the stored id"
    );
    assert_eq!(published[0].1.ordered_on, saved[0].ordered_on);

    Ok(())
}

/// Test: A sent-mail record echoed back from the queue lands on its own row
#[tokio::test]
async fn test_republished_record_overwrites_same_row() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s"}"#;
    dispatcher.on_message(payload).await?;

    let (original_id, republished) = {
        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1, "The sent-mail record is announced once");
        (published[0].1.id, serde_json::to_string(&published[0].1)?)
    };
    assert!(
        original_id.is_some(),
        "The announced record carries its stored id"
    );

    dispatcher.on_message(&republished).await?;

    let saved = store.saved.lock().unwrap();
    assert_eq!(
        saved.len(),
        1,
        "Re-consuming the echoed record overwrites its row instead of adding one"
    );
    assert_eq!(saved[0].id, original_id);
    assert_eq!(saved[0].to, "a@x.com");

    assert_eq!(
        gateway.sent.lock().unwrap().len(),
        1,
        "The echoed record does not trigger a second mail"
    );
    assert_eq!(
        publisher.published.lock().unwrap().len(),
        1,
        "The persist branch does not publish again"
    );

    Ok(())
}

/// Test: A null orderedOn field is treated as a mail request
#[tokio::test]
async fn test_null_timestamp_is_treated_as_mail_request() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"b@x.com","text":"body","subject":"subj","orderedOn":null}"#;
    dispatcher.on_message(payload).await?;

    assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    assert_eq!(store.saved.lock().unwrap().len(), 1);

    Ok(())
}

/// Test: Malformed payloads are discarded without side effects
#[tokio::test]
async fn test_malformed_payload_is_discarded() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let result = dispatcher.on_message("this is not json {{{").await;
    assert!(result.is_ok(), "Malformed payloads must not raise an error");

    assert!(store.saved.lock().unwrap().is_empty());
    assert!(gateway.sent.lock().unwrap().is_empty());
    assert!(publisher.published.lock().unwrap().is_empty());

    Ok(())
}

/// Test: A bad timestamp string makes the whole payload malformed
#[tokio::test]
async fn test_invalid_timestamp_format_is_discarded() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s","orderedOn":"01/01/2024 10:00"}"#;
    let result = dispatcher.on_message(payload).await;
    assert!(result.is_ok());

    assert!(store.saved.lock().unwrap().is_empty());
    assert!(gateway.sent.lock().unwrap().is_empty());

    Ok(())
}

/// Test: Identical events without ids are stored as separate records
#[tokio::test]
async fn test_duplicate_events_create_distinct_records() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s","orderedOn":"2024-01-01 10:00:00"}"#;
    dispatcher.on_message(payload).await?;
    dispatcher.on_message(payload).await?;

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 2, "Redelivery is not deduplicated");
    assert_ne!(
        saved[0].id, saved[1].id,
        "Each save should get its own store-assigned id"
    );

    Ok(())
}

/// Test: Records that already carry an id keep it across saves
#[tokio::test]
async fn test_event_with_id_keeps_it() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let id = Uuid::new_v4();
    let payload = format!(
        r#"{{"id":"{}","to":"a@x.com","text":"hi","subject":"s","orderedOn":"2024-01-01 10:00:00"}}"#,
        id
    );
    dispatcher.on_message(&payload).await?;

    let saved = store.saved.lock().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, Some(id));

    Ok(())
}

/// Test: Mail gateway failures propagate and nothing is recorded
#[tokio::test]
async fn test_gateway_failure_records_nothing() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        Arc::new(FailingGateway),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s"}"#;
    let result = dispatcher.on_message(payload).await;
    assert!(result.is_err(), "A failed send should surface an error");

    assert!(
        store.saved.lock().unwrap().is_empty(),
        "No record should be written when the send fails"
    );
    assert!(publisher.published.lock().unwrap().is_empty());

    Ok(())
}

/// Test: Store failures after a successful send propagate
#[tokio::test]
async fn test_store_failure_after_send_propagates() -> Result<()> {
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        Arc::new(FailingStore),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(Arc::new(FailingStore), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s"}"#;
    let result = dispatcher.on_message(payload).await;
    assert!(result.is_err(), "A failed save should surface an error");

    assert_eq!(
        gateway.sent.lock().unwrap().len(),
        1,
        "The mail goes out before the save is attempted"
    );
    assert!(
        publisher.published.lock().unwrap().is_empty(),
        "Nothing should be published when the save fails"
    );

    Ok(())
}

/// Test: Publish failures do not fail the mail flow
#[tokio::test]
async fn test_publish_failure_is_swallowed() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        Arc::new(FailingPublisher),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let payload = r#"{"to":"a@x.com","text":"hi","subject":"s"}"#;
    dispatcher.on_message(payload).await?;

    assert_eq!(gateway.sent.lock().unwrap().len(), 1);
    assert_eq!(
        store.saved.lock().unwrap().len(),
        1,
        "The record survives even when publishing it fails"
    );

    Ok(())
}

/// Test: Empty order events still follow the mail path with default fields
#[tokio::test]
async fn test_empty_event_defaults_to_mail_request() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    dispatcher.on_message("{}").await?;

    let sent = gateway.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0],
        (String::new(), String::new(), String::new()),
        "Missing fields fall back to empty strings"
    );

    Ok(())
}

/// Test: Stored records are readable back with their original contents
#[tokio::test]
async fn test_find_all_returns_persisted_records() -> Result<()> {
    let store = Arc::new(RecordingStore::default());
    let gateway = Arc::new(RecordingGateway::default());
    let publisher = Arc::new(RecordingPublisher::default());

    let mail_service = Arc::new(MailService::new(
        gateway.clone(),
        store.clone(),
        publisher.clone(),
    ));
    let dispatcher = OrderDispatcher::new(store.clone(), mail_service);

    let first = r#"{"to":"a@x.com","text":"first","subject":"s1","orderedOn":"2024-01-01 10:00:00"}"#;
    let second = r#"{"to":"b@x.com","text":"second","subject":"s2","orderedOn":"2024-01-02 11:30:00"}"#;
    dispatcher.on_message(first).await?;
    dispatcher.on_message(second).await?;

    let all = store.find_all().await?;
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].text, "first");
    assert_eq!(all[1].text, "second");
    assert!(all.iter().all(|record| record.id.is_some()));

    Ok(())
}
