use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single order event on the queue, and the persisted record it becomes.
///
/// Events produced upstream omit `orderedOn`; records written after a mail
/// send carry it. The two shapes share one wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(default, with = "order_timestamp")]
    pub ordered_on: Option<NaiveDateTime>,

    #[serde(default)]
    #[sqlx(rename = "to_address")]
    pub to: String,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub subject: String,
}

impl OrderNotification {
    /// Build the record for a mail that was just sent, stamped with the
    /// current time. The store assigns the id on save.
    pub fn sent_now(to: &str, text: &str, subject: &str) -> Self {
        Self {
            id: None,
            ordered_on: Some(Utc::now().naive_utc()),
            to: to.to_string(),
            text: text.to_string(),
            subject: subject.to_string(),
        }
    }

    /// A notification carrying an order timestamp is a completed-order
    /// record; one without it is a request to send mail.
    pub fn is_order_confirmation(&self) -> bool {
        self.ordered_on.is_some()
    }
}

/// Timestamps travel on the queue as `"2024-01-01 10:00:00"` strings.
/// Sub-second precision is dropped on serialization.
pub mod order_timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(timestamp) => serializer.serialize_str(&timestamp.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;

        value
            .map(|raw| NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(de::Error::custom))
            .transpose()
    }
}
