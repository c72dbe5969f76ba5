use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Delivery,
    Compliance,
    Sanitation,
    Payment,
    General,
    #[serde(rename = "top-up")]
    TopUp,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Delivery => "delivery",
            NotificationType::Compliance => "compliance",
            NotificationType::Sanitation => "sanitation",
            NotificationType::Payment => "payment",
            NotificationType::General => "general",
            NotificationType::TopUp => "top-up",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "delivery" => Some(Self::Delivery),
            "compliance" => Some(Self::Compliance),
            "sanitation" => Some(Self::Sanitation),
            "payment" => Some(Self::Payment),
            "general" => Some(Self::General),
            "top-up" => Some(Self::TopUp),
            _ => None,
        }
    }
}

/// key: notification-model -> write-once customer notice
/// `is_read` belongs to the UI layer; it is always `false` here.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
}

impl Notification {
    pub fn new(
        id: Uuid,
        account_id: Uuid,
        kind: NotificationType,
        title: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            kind,
            title: title.into(),
            description: description.into(),
            created_at,
            is_read: false,
        }
    }
}
