use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

/// Liters held by one delivery container.
pub const CONTAINER_LITERS: f64 = 19.5;

/// key: ledger-plan-model -> monthly entitlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleUpdate")]
pub struct Plan {
    pub liters_per_month: f64,
    pub bonus_liters: f64,
    pub delivery_day: Weekday,
    pub delivery_time: DeliveryTime,
}

impl Plan {
    pub fn new(
        liters_per_month: f64,
        bonus_liters: f64,
        delivery_day: Weekday,
        delivery_time: DeliveryTime,
    ) -> LedgerResult<Self> {
        let plan = Self {
            liters_per_month,
            bonus_liters,
            delivery_day,
            delivery_time,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> LedgerResult<()> {
        for (field, value) in [
            ("liters_per_month", self.liters_per_month),
            ("bonus_liters", self.bonus_liters),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::validation(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Liters granted per cycle, base plus bonus.
    pub fn allocation(&self) -> f64 {
        self.liters_per_month + self.bonus_liters
    }
}

/// Wall-clock delivery slot, serialized as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeliveryTime {
    hour: u8,
    minute: u8,
}

impl DeliveryTime {
    pub fn new(hour: u8, minute: u8) -> LedgerResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(LedgerError::validation(format!(
                "delivery time {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for DeliveryTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for DeliveryTime {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::validation(format!("delivery time `{value}` is not HH:MM"));
        let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
        if hour.len() != 2 || minute.len() != 2 {
            return Err(invalid());
        }
        let hour = hour.parse::<u8>().map_err(|_| invalid())?;
        let minute = minute.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl Serialize for DeliveryTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DeliveryTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// key: ledger-account-model -> plan owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub plan: Option<Plan>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: Uuid, created_at: DateTime<Utc>, plan: Option<Plan>) -> Self {
        Self {
            id,
            created_at,
            plan,
            updated_at: created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    InTransit,
    Delivered,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_transit" => Some(Self::InTransit),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// key: ledger-delivery-model -> consumption source
/// Written by fulfillment; the ledger only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub date: DateTime<Utc>,
    pub volume_containers: u32,
    pub status: DeliveryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
}

impl DeliveryRecord {
    pub fn liters(&self) -> f64 {
        f64::from(self.volume_containers) * CONTAINER_LITERS
    }
}

/// key: ledger-rollover-override -> saved liters for a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloverOverride {
    pub account_id: Uuid,
    /// Start of the cycle this override feeds.
    pub cycle_start: DateTime<Utc>,
    pub liters: f64,
    /// Consumption already counted in the saving cycle when the liters were saved.
    #[serde(default)]
    pub consumed_when_saved: f64,
    pub created_at: DateTime<Utc>,
}

impl RolloverOverride {
    /// Liters that actually carry over once the saving cycle has consumed `consumed_in_cycle`.
    /// Consumption after the save draws on the saved liters first, never below zero.
    pub fn carried(&self, consumed_in_cycle: f64) -> f64 {
        let drawn = (consumed_in_cycle - self.consumed_when_saved).max(0.0);
        (self.liters - drawn).max(0.0)
    }
}

/// Fields accepted by the schedule-update operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleUpdate {
    pub liters_per_month: f64,
    pub bonus_liters: f64,
    pub delivery_day: Weekday,
    pub delivery_time: DeliveryTime,
}

impl ScheduleUpdate {
    pub fn into_plan(self) -> LedgerResult<Plan> {
        Plan::new(
            self.liters_per_month,
            self.bonus_liters,
            self.delivery_day,
            self.delivery_time,
        )
    }
}

impl TryFrom<ScheduleUpdate> for Plan {
    type Error = LedgerError;

    fn try_from(update: ScheduleUpdate) -> LedgerResult<Self> {
        update.into_plan()
    }
}

/// Calendar date in the canonical clock.
pub fn today(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}
