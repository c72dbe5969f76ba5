use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::models::{Notification, NotificationType};
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::store::{with_deadline, LedgerStore};

/// key: notification-emitter -> persist customer notices
#[derive(Clone)]
pub struct NotificationEmitter {
    store: Arc<dyn LedgerStore>,
    store_timeout: Duration,
}

impl NotificationEmitter {
    pub fn new(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            store_timeout: config.store_timeout,
        }
    }

    pub async fn emit(
        &self,
        account_id: Uuid,
        kind: NotificationType,
        title: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Uuid> {
        self.emit_with_id(Uuid::new_v4(), account_id, kind, title, description, now)
            .await
    }

    /// Emits under a caller-chosen id; repeating the call with the same id writes nothing new.
    pub async fn emit_with_id(
        &self,
        id: Uuid,
        account_id: Uuid,
        kind: NotificationType,
        title: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<Uuid> {
        let notification = Notification::new(id, account_id, kind, title, description, now);
        self.deliver(&notification).await
    }

    pub async fn deliver(&self, notification: &Notification) -> LedgerResult<Uuid> {
        let id = with_deadline(self.store_timeout, self.store.put_notification(notification))
            .await?;
        debug!(
            notification = %id,
            account = %notification.account_id,
            kind = notification.kind.as_str(),
            "notification emitted"
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::store::InMemoryStore;
    use chrono::TimeZone;

    #[tokio::test]
    async fn emit_with_same_id_is_written_once() {
        let store = InMemoryStore::new();
        let emitter = NotificationEmitter::new(Arc::new(store.clone()), &LedgerConfig::default());
        let account_id = Uuid::new_v4();
        let id = Uuid::new_v4();
        let first = Utc.with_ymd_and_hms(2024, 6, 15, 9, 0, 0).unwrap();

        for (offset, description) in [(0, "First"), (5, "Second")] {
            let emitted = emitter
                .emit_with_id(
                    id,
                    account_id,
                    NotificationType::General,
                    "Hello",
                    description,
                    first + chrono::Duration::minutes(offset),
                )
                .await
                .unwrap();
            assert_eq!(emitted, id);
        }

        let stored = store.notifications_for(account_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].description, "First");
        assert_eq!(stored[0].created_at, first);
        assert!(!stored[0].is_read);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_unavailable() {
        let store = InMemoryStore::new();
        store.set_notifications_offline(true);
        let emitter = NotificationEmitter::new(Arc::new(store.clone()), &LedgerConfig::default());

        let err = emitter
            .emit(
                Uuid::new_v4(),
                NotificationType::Payment,
                "Invoice",
                "Due",
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::StoreUnavailable(_)));
    }
}
