use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::ledger::{Account, ScheduleUpdate};
use crate::store::{with_deadline, LedgerStore};

/// key: account-service -> plan reads and schedule updates
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub async fn account(&self, account_id: Uuid) -> LedgerResult<Account> {
        with_deadline(self.config.store_timeout, self.store.get_account(account_id)).await
    }

    /// The only path through which an account's plan changes.
    pub async fn update_schedule(
        &self,
        account_id: Uuid,
        update: ScheduleUpdate,
        now: DateTime<Utc>,
    ) -> LedgerResult<Account> {
        let plan = update.into_plan()?;
        let allocation = plan.allocation();
        let mut account = self.account(account_id).await?;
        account.plan = Some(plan);
        account.updated_at = now;

        with_deadline(self.config.store_timeout, self.store.put_account(&account)).await?;
        info!(
            account = %account_id,
            allocation,
            "delivery schedule updated"
        );
        Ok(account)
    }
}
