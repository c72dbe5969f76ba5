//! Refill request lifecycle: `requested -> in_production -> out_for_delivery -> completed`,
//! with `cancelled` reachable from every non-terminal state.

pub mod models;
pub mod service;

pub use models::{RefillRequest, RefillStatus};
pub use service::{NotificationOutcome, RefillService, RefillTransition};
