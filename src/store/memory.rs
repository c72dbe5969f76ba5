use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::LedgerStore;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{Account, DeliveryRecord, RolloverOverride};
use crate::notifications::Notification;
use crate::refill::RefillRequest;

/// key: ledger-store-memory -> process-local store
/// Every record lives in a sharded map; conditional writes hold the shard lock for the
/// compare and the swap.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    accounts: Arc<DashMap<Uuid, Account>>,
    deliveries: Arc<DashMap<Uuid, Vec<DeliveryRecord>>>,
    refill_requests: Arc<DashMap<Uuid, RefillRequest>>,
    notifications: Arc<DashMap<Uuid, Notification>>,
    rollover_overrides: Arc<DashMap<(Uuid, DateTime<Utc>), RolloverOverride>>,
    #[cfg(test)]
    notifications_offline: Arc<std::sync::atomic::AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivery the way the fulfillment side would.
    pub fn record_delivery(&self, delivery: DeliveryRecord) {
        self.deliveries
            .entry(delivery.account_id)
            .or_default()
            .push(delivery);
    }

    /// Makes notification writes fail with `StoreUnavailable` until switched back.
    #[cfg(test)]
    pub(crate) fn set_notifications_offline(&self, offline: bool) {
        self.notifications_offline
            .store(offline, std::sync::atomic::Ordering::SeqCst);
    }

    #[cfg(test)]
    fn notifications_online(&self) -> LedgerResult<()> {
        if self
            .notifications_offline
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            return Err(LedgerError::StoreUnavailable(
                "notification store offline".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn notifications_online(&self) -> LedgerResult<()> {
        Ok(())
    }

    pub fn notifications_for(&self, account_id: Uuid) -> Vec<Notification> {
        let mut found: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by_key(|notification| notification.created_at);
        found
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Account> {
        self.accounts
            .get(&account_id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::NotFound {
                entity: "account",
                id: account_id,
            })
    }

    async fn put_account(&self, account: &Account) -> LedgerResult<()> {
        self.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn list_deliveries(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>> {
        let Some(entry) = self.deliveries.get(&account_id) else {
            return Ok(Vec::new());
        };
        Ok(entry
            .iter()
            .filter(|delivery| from <= delivery.date && delivery.date <= to)
            .cloned()
            .collect())
    }

    async fn get_refill_request(&self, request_id: Uuid) -> LedgerResult<RefillRequest> {
        self.refill_requests
            .get(&request_id)
            .map(|entry| entry.value().clone())
            .ok_or(LedgerError::NotFound {
                entity: "refill request",
                id: request_id,
            })
    }

    async fn insert_refill_request(&self, request: &RefillRequest) -> LedgerResult<()> {
        match self.refill_requests.entry(request.id) {
            Entry::Occupied(_) => Err(LedgerError::validation(format!(
                "refill request {} already exists",
                request.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(request.clone());
                Ok(())
            }
        }
    }

    async fn put_refill_request(
        &self,
        request: &RefillRequest,
        expected_version: i64,
    ) -> LedgerResult<()> {
        let mut stored =
            self.refill_requests
                .get_mut(&request.id)
                .ok_or(LedgerError::NotFound {
                    entity: "refill request",
                    id: request.id,
                })?;
        if stored.version != expected_version {
            return Err(LedgerError::ConcurrentModification {
                request_id: request.id,
                expected_version,
            });
        }
        *stored = request.clone();
        Ok(())
    }

    async fn put_notification(&self, notification: &Notification) -> LedgerResult<Uuid> {
        self.notifications_online()?;
        self.notifications
            .entry(notification.id)
            .or_insert_with(|| notification.clone());
        Ok(notification.id)
    }

    async fn get_rollover_override(
        &self,
        account_id: Uuid,
        cycle_start: DateTime<Utc>,
    ) -> LedgerResult<Option<RolloverOverride>> {
        Ok(self
            .rollover_overrides
            .get(&(account_id, cycle_start))
            .map(|entry| entry.value().clone()))
    }

    async fn insert_rollover_override(
        &self,
        value: &RolloverOverride,
    ) -> LedgerResult<RolloverOverride> {
        let stored = self
            .rollover_overrides
            .entry((value.account_id, value.cycle_start))
            .or_insert_with(|| value.clone());
        Ok(stored.value().clone())
    }
}
