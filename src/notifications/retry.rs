use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Sender};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::emitter::NotificationEmitter;
use super::models::Notification;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};

/// key: notification-retry-handle -> enqueue interface
#[derive(Clone)]
pub struct NotificationRetryHandle {
    sender: Sender<Notification>,
}

impl NotificationRetryHandle {
    /// Queues `notification` without waiting; a full queue is an error, not back-pressure.
    pub fn dispatch(&self, notification: Notification) -> LedgerResult<()> {
        self.sender.try_send(notification).map_err(|err| match err {
            TrySendError::Full(dropped) => LedgerError::StoreUnavailable(format!(
                "notification retry queue full, dropped {}",
                dropped.id
            )),
            TrySendError::Closed(dropped) => LedgerError::StoreUnavailable(format!(
                "notification retry worker stopped, dropped {}",
                dropped.id
            )),
        })
    }
}

/// key: notification-retry-worker -> re-emit notifications whose first write failed
///
/// Each notification is retried on its own task, so one that keeps failing does not hold back
/// the rest. Notifications keep their id across attempts, so a retry that races a late first
/// write still leaves a single stored record.
pub fn start_notification_retry_worker(
    emitter: NotificationEmitter,
    config: &LedgerConfig,
) -> NotificationRetryHandle {
    let attempts = config.notification_retry_attempts;
    let backoff = config.notification_retry_backoff;
    let capacity = config.notification_retry_capacity.max(1);
    let (tx, mut rx) = channel::<Notification>(capacity);
    let in_flight = Arc::new(Semaphore::new(capacity));

    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let Ok(permit) = in_flight.clone().acquire_owned().await else {
                break;
            };
            let emitter = emitter.clone();
            tokio::spawn(async move {
                retry(&emitter, &notification, attempts, backoff).await;
                drop(permit);
            });
        }
    });

    NotificationRetryHandle { sender: tx }
}

async fn retry(
    emitter: &NotificationEmitter,
    notification: &Notification,
    attempts: u32,
    backoff: Duration,
) {
    for attempt in 1..=attempts {
        sleep(backoff * attempt).await;
        match emitter.deliver(notification).await {
            Ok(id) => {
                info!(
                    notification = %id,
                    account = %notification.account_id,
                    attempt,
                    "notification delivered on retry"
                );
                return;
            }
            Err(err) => warn!(
                ?err,
                notification = %notification.id,
                attempt,
                "notification retry failed"
            ),
        }
    }
    error!(
        notification = %notification.id,
        account = %notification.account_id,
        attempts,
        "giving up on notification"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationType;
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn fast_config() -> LedgerConfig {
        LedgerConfig {
            notification_retry_attempts: 5,
            notification_retry_backoff: Duration::from_millis(5),
            ..LedgerConfig::default()
        }
    }

    fn notification(account_id: Uuid) -> Notification {
        Notification::new(
            Uuid::new_v4(),
            account_id,
            NotificationType::Delivery,
            "Refill in production",
            "Your refill is being prepared.",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn worker_delivers_once_store_recovers() {
        let store = InMemoryStore::new();
        store.set_notifications_offline(true);
        let config = fast_config();
        let emitter = NotificationEmitter::new(Arc::new(store.clone()), &config);
        let handle = start_notification_retry_worker(emitter, &config);

        let account_id = Uuid::new_v4();
        let notification = notification(account_id);
        handle.dispatch(notification.clone()).unwrap();

        sleep(Duration::from_millis(8)).await;
        store.set_notifications_offline(false);

        let mut delivered = Vec::new();
        for _ in 0..50 {
            delivered = store.notifications_for(account_id);
            if !delivered.is_empty() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, vec![notification]);
    }

    #[tokio::test]
    async fn full_queue_rejects_instead_of_waiting() {
        let store = InMemoryStore::new();
        store.set_notifications_offline(true);
        let config = LedgerConfig {
            notification_retry_attempts: 1,
            notification_retry_backoff: Duration::from_secs(60),
            notification_retry_capacity: 1,
            ..LedgerConfig::default()
        };
        let emitter = NotificationEmitter::new(Arc::new(store.clone()), &config);
        let handle = start_notification_retry_worker(emitter, &config);

        // one retrying, one held by the worker, one buffered: the rest must be refused
        let account_id = Uuid::new_v4();
        let mut refused = 0;
        for _ in 0..6 {
            if let Err(err) = handle.dispatch(notification(account_id)) {
                assert!(matches!(err, LedgerError::StoreUnavailable(_)));
                refused += 1;
            }
            tokio::task::yield_now().await;
        }
        assert!(refused >= 3, "only {refused} dispatches refused");
    }
}
