//! Customer notifications emitted by refill transitions.

pub mod emitter;
pub mod models;
pub mod retry;

pub use emitter::NotificationEmitter;
pub use models::{Notification, NotificationType};
pub use retry::{start_notification_retry_worker, NotificationRetryHandle};
