//! Narrow storage contract the ledger and refill lifecycle are written against.

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::ledger::{Account, DeliveryRecord, RolloverOverride};
use crate::notifications::Notification;
use crate::refill::RefillRequest;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// key: ledger-store -> keyed record access
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Account>;

    async fn put_account(&self, account: &Account) -> LedgerResult<()>;

    /// Deliveries for `account_id` dated within `[from, to]`.
    async fn list_deliveries(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>>;

    async fn get_refill_request(&self, request_id: Uuid) -> LedgerResult<RefillRequest>;

    async fn insert_refill_request(&self, request: &RefillRequest) -> LedgerResult<()>;

    /// Replaces the stored request only if its version still equals `expected_version`.
    async fn put_refill_request(
        &self,
        request: &RefillRequest,
        expected_version: i64,
    ) -> LedgerResult<()>;

    /// Write-once upsert keyed on the notification id.
    async fn put_notification(&self, notification: &Notification) -> LedgerResult<Uuid>;

    async fn get_rollover_override(
        &self,
        account_id: Uuid,
        cycle_start: DateTime<Utc>,
    ) -> LedgerResult<Option<RolloverOverride>>;

    /// Stores `value` unless an override already exists for the same account and cycle; returns
    /// whichever override is stored afterwards.
    async fn insert_rollover_override(
        &self,
        value: &RolloverOverride,
    ) -> LedgerResult<RolloverOverride>;
}

/// Runs a store call under `deadline`; expiry surfaces as `StoreUnavailable`.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, call: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    tokio::time::timeout(deadline, call).await?
}
