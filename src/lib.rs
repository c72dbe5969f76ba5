pub mod accounts;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod ledger;
pub mod notifications;
pub mod refill;
pub mod store;
pub mod telemetry;

pub use accounts::AccountService;
pub use config::{LedgerConfig, LEDGER_CONFIG};
pub use error::{LedgerError, LedgerResult};
pub use ledger::LedgerService;
pub use notifications::{start_notification_retry_worker, NotificationEmitter};
pub use refill::{RefillService, RefillStatus};
pub use store::{InMemoryStore, LedgerStore, PgStore};
