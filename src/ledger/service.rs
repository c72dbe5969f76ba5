use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::balance::{balance_snapshot, saved_rollover, BalanceSnapshot};
use super::cycle::{current_cycle, had_prior_cycle, next_cycle};
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::store::{with_deadline, LedgerStore};

/// key: ledger-service -> store-backed balance queries and saved liters
///
/// Each call loads its inputs once and computes from that snapshot; nothing is cached.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    config: LedgerConfig,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    pub async fn snapshot(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> LedgerResult<BalanceSnapshot> {
        let deadline = self.config.store_timeout;
        let account = with_deadline(deadline, self.store.get_account(account_id)).await?;
        let cycle = current_cycle(now);
        let deliveries = with_deadline(
            deadline,
            self.store
                .list_deliveries(account_id, cycle.previous().start, cycle.end),
        )
        .await?;
        let carried_in = with_deadline(
            deadline,
            self.store.get_rollover_override(account_id, cycle.start),
        )
        .await?;
        let carried_out = with_deadline(
            deadline,
            self.store.get_rollover_override(account_id, cycle.next().start),
        )
        .await?;

        let snapshot = balance_snapshot(
            account.plan.as_ref(),
            &deliveries,
            now,
            had_prior_cycle(&account, now),
            carried_in.as_ref(),
            carried_out.as_ref(),
        );
        debug!(
            account = %account_id,
            deliveries = deliveries.len(),
            balance = snapshot.current_balance,
            rollover = snapshot.rollover,
            reserved = snapshot.reserved_for_next_cycle,
            "balance computed"
        );
        Ok(snapshot)
    }

    pub async fn balance(&self, account_id: Uuid, now: DateTime<Utc>) -> LedgerResult<f64> {
        Ok(self.snapshot(account_id, now).await?.current_balance)
    }

    /// Carries the current positive balance into the next cycle as its rollover and holds it
    /// back from the current cycle. Within one cycle only the first call stores anything; later
    /// calls return the stored amount.
    pub async fn save_liters(&self, account_id: Uuid, now: DateTime<Utc>) -> LedgerResult<f64> {
        let deadline = self.config.store_timeout;
        let next = next_cycle(now);
        if let Some(existing) = with_deadline(
            deadline,
            self.store.get_rollover_override(account_id, next.start),
        )
        .await?
        {
            return Ok(existing.liters);
        }

        let snapshot = self.snapshot(account_id, now).await?;
        let Some(candidate) = saved_rollover(&snapshot, account_id, now) else {
            debug!(
                account = %account_id,
                balance = snapshot.current_balance,
                "nothing to save"
            );
            return Ok(0.0);
        };

        let stored = with_deadline(
            deadline,
            self.store.insert_rollover_override(&candidate),
        )
        .await?;
        info!(
            account = %account_id,
            liters = stored.liters,
            cycle_start = %stored.cycle_start,
            "liters saved for next cycle"
        );
        Ok(stored.liters)
    }
}
