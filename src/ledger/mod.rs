pub mod balance;
pub mod cycle;
pub mod models;
pub mod service;

pub use balance::{
    balance_snapshot, compute_balance, consumed_liters, saved_rollover, BalanceSnapshot,
    RolloverSource,
};
pub use cycle::{current_cycle, had_prior_cycle, next_cycle, previous_cycle, Cycle};
pub use models::{
    Account, DeliveryRecord, DeliveryStatus, DeliveryTime, Plan, RolloverOverride,
    ScheduleUpdate, CONTAINER_LITERS,
};
pub use service::LedgerService;
