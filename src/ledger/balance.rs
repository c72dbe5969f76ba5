use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cycle::{current_cycle, Cycle};
use super::models::{DeliveryRecord, Plan, RolloverOverride};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloverSource {
    /// No prior cycle and nothing saved.
    None,
    /// Unused allocation of the previous cycle.
    Computed,
    /// Liters the customer explicitly saved during the previous cycle, less what that cycle
    /// consumed after saving.
    Saved,
}

/// key: ledger-balance-snapshot -> every intermediate of the balance computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub cycle: Cycle,
    pub allocation: f64,
    pub consumed_this_cycle: f64,
    pub consumed_last_cycle: f64,
    pub rollover: f64,
    pub rollover_source: RolloverSource,
    /// Liters already saved for the next cycle and held back from this one.
    pub reserved_for_next_cycle: f64,
    pub current_balance: f64,
}

/// Liters consumed by deliveries dated inside `cycle`, whatever their fulfillment status.
pub fn consumed_liters(deliveries: &[DeliveryRecord], cycle: &Cycle) -> f64 {
    deliveries
        .iter()
        .filter(|delivery| cycle.contains(delivery.date))
        .map(DeliveryRecord::liters)
        .sum()
}

/// Balance left in the current cycle: allocation plus rollover minus this cycle's consumption.
///
/// The result is not floored; over-consumption yields a negative balance.
pub fn compute_balance(
    plan: Option<&Plan>,
    deliveries: &[DeliveryRecord],
    now: DateTime<Utc>,
    had_prior_cycle: bool,
) -> f64 {
    balance_snapshot(plan, deliveries, now, had_prior_cycle, None, None).current_balance
}

/// Full balance breakdown.
///
/// `carried_in` is an override saved for the current cycle; it replaces the computed rollover.
/// `carried_out` is an override saved during the current cycle for the next one; the liters it
/// will carry are held back from the current balance, so saved liters are spendable once.
/// Overrides keyed to any other cycle are ignored.
pub fn balance_snapshot(
    plan: Option<&Plan>,
    deliveries: &[DeliveryRecord],
    now: DateTime<Utc>,
    had_prior_cycle: bool,
    carried_in: Option<&RolloverOverride>,
    carried_out: Option<&RolloverOverride>,
) -> BalanceSnapshot {
    let cycle = current_cycle(now);
    let Some(plan) = plan else {
        return BalanceSnapshot {
            cycle,
            allocation: 0.0,
            consumed_this_cycle: 0.0,
            consumed_last_cycle: 0.0,
            rollover: 0.0,
            rollover_source: RolloverSource::None,
            reserved_for_next_cycle: 0.0,
            current_balance: 0.0,
        };
    };

    let previous = cycle.previous();
    let (mut consumed_this_cycle, mut consumed_last_cycle) = (0.0, 0.0);
    for delivery in deliveries {
        if cycle.contains(delivery.date) {
            consumed_this_cycle += delivery.liters();
        } else if previous.contains(delivery.date) {
            consumed_last_cycle += delivery.liters();
        }
    }

    let allocation = plan.allocation();
    let saved = carried_in.filter(|saved| saved.cycle_start == cycle.start);
    let (rollover, rollover_source) = match saved {
        Some(saved) => (saved.carried(consumed_last_cycle), RolloverSource::Saved),
        None if had_prior_cycle => (
            (allocation - consumed_last_cycle).max(0.0),
            RolloverSource::Computed,
        ),
        None => (0.0, RolloverSource::None),
    };
    let reserved_for_next_cycle = carried_out
        .filter(|saved| saved.cycle_start == cycle.next().start)
        .map_or(0.0, |saved| saved.carried(consumed_this_cycle));

    BalanceSnapshot {
        cycle,
        allocation,
        consumed_this_cycle,
        consumed_last_cycle,
        rollover,
        rollover_source,
        reserved_for_next_cycle,
        current_balance: allocation + rollover - consumed_this_cycle - reserved_for_next_cycle,
    }
}

/// The override `save_liters` should store for the cycle after `snapshot.cycle`, or `None` when
/// there is nothing positive to carry.
pub fn saved_rollover(
    snapshot: &BalanceSnapshot,
    account_id: Uuid,
    now: DateTime<Utc>,
) -> Option<RolloverOverride> {
    if snapshot.current_balance <= 0.0 {
        return None;
    }
    Some(RolloverOverride {
        account_id,
        cycle_start: snapshot.cycle.next().start,
        liters: snapshot.current_balance,
        consumed_when_saved: snapshot.consumed_this_cycle,
        created_at: now,
    })
}
