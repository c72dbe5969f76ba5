use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// key: refill-status -> lifecycle states and the transition table
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RefillStatus {
    Requested,
    InProduction,
    OutForDelivery,
    Completed,
    Cancelled,
}

impl RefillStatus {
    pub const ALL: [RefillStatus; 5] = [
        RefillStatus::Requested,
        RefillStatus::InProduction,
        RefillStatus::OutForDelivery,
        RefillStatus::Completed,
        RefillStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RefillStatus::Requested => "requested",
            RefillStatus::InProduction => "in_production",
            RefillStatus::OutForDelivery => "out_for_delivery",
            RefillStatus::Completed => "completed",
            RefillStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "requested" => Some(Self::Requested),
            "in_production" => Some(Self::InProduction),
            "out_for_delivery" => Some(Self::OutForDelivery),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RefillStatus::Completed | RefillStatus::Cancelled)
    }

    /// The single forward successor, if any.
    pub fn next(&self) -> Option<Self> {
        match self {
            RefillStatus::Requested => Some(RefillStatus::InProduction),
            RefillStatus::InProduction => Some(RefillStatus::OutForDelivery),
            RefillStatus::OutForDelivery => Some(RefillStatus::Completed),
            RefillStatus::Completed | RefillStatus::Cancelled => None,
        }
    }

    pub fn can_transition_to(&self, target: RefillStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == RefillStatus::Cancelled || self.next() == Some(target)
    }

    pub fn transition_to(&self, target: RefillStatus) -> LedgerResult<RefillStatus> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(LedgerError::InvalidTransition {
                from: *self,
                to: target,
            })
        }
    }
}

impl fmt::Display for RefillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// key: refill-request-model -> customer refill order
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RefillRequest {
    pub id: Uuid,
    pub account_id: Uuid,
    pub requested_date: NaiveDate,
    pub containers: u32,
    pub status: RefillStatus,
    /// Bumped on every transition; conditional writes compare against it.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefillRequest {
    /// The request as it looks after moving to `status` at `now`.
    pub fn transitioned(&self, status: RefillStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            version: self.version + 1,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Title and body of the delivery notification announcing the current status.
    pub fn status_message(&self) -> (String, String) {
        let containers = match self.containers {
            1 => "1 container".to_string(),
            n => format!("{n} containers"),
        };
        let date = self.requested_date.format("%Y-%m-%d");
        match self.status {
            RefillStatus::Requested => (
                "Refill requested".to_string(),
                format!("Your refill of {containers} for {date} has been received."),
            ),
            RefillStatus::InProduction => (
                "Refill in production".to_string(),
                format!("Your refill of {containers} for {date} is being prepared."),
            ),
            RefillStatus::OutForDelivery => (
                "Refill out for delivery".to_string(),
                format!("Your refill of {containers} for {date} is on its way."),
            ),
            RefillStatus::Completed => (
                "Refill delivered".to_string(),
                format!("Your refill of {containers} for {date} has been delivered."),
            ),
            RefillStatus::Cancelled => (
                "Refill cancelled".to_string(),
                format!("Your refill of {containers} for {date} was cancelled."),
            ),
        }
    }
}
