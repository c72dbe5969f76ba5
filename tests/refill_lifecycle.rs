use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;
use water_ledger::error::LedgerResult;
use water_ledger::ledger::{Account, DeliveryRecord, RolloverOverride};
use water_ledger::notifications::{Notification, NotificationType};
use water_ledger::refill::{NotificationOutcome, RefillRequest};
use water_ledger::{
    start_notification_retry_worker, InMemoryStore, LedgerConfig, LedgerError, LedgerStore,
    NotificationEmitter, RefillService, RefillStatus,
};

// key: refill-lifecycle-tests -> transitions,notifications,races

/// Delegates to an in-memory store but refuses notification writes while `offline` is set.
#[derive(Clone, Default)]
struct FlakyNotifications {
    inner: InMemoryStore,
    offline: Arc<AtomicBool>,
}

#[async_trait]
impl LedgerStore for FlakyNotifications {
    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Account> {
        self.inner.get_account(account_id).await
    }

    async fn put_account(&self, account: &Account) -> LedgerResult<()> {
        self.inner.put_account(account).await
    }

    async fn list_deliveries(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>> {
        self.inner.list_deliveries(account_id, from, to).await
    }

    async fn get_refill_request(&self, request_id: Uuid) -> LedgerResult<RefillRequest> {
        self.inner.get_refill_request(request_id).await
    }

    async fn insert_refill_request(&self, request: &RefillRequest) -> LedgerResult<()> {
        self.inner.insert_refill_request(request).await
    }

    async fn put_refill_request(
        &self,
        request: &RefillRequest,
        expected_version: i64,
    ) -> LedgerResult<()> {
        self.inner.put_refill_request(request, expected_version).await
    }

    async fn put_notification(&self, notification: &Notification) -> LedgerResult<Uuid> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::StoreUnavailable("notifications offline".into()));
        }
        self.inner.put_notification(notification).await
    }

    async fn get_rollover_override(
        &self,
        account_id: Uuid,
        cycle_start: DateTime<Utc>,
    ) -> LedgerResult<Option<RolloverOverride>> {
        self.inner.get_rollover_override(account_id, cycle_start).await
    }

    async fn insert_rollover_override(
        &self,
        value: &RolloverOverride,
    ) -> LedgerResult<RolloverOverride> {
        self.inner.insert_rollover_override(value).await
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 18, 14, 0, 0).unwrap()
}

async fn seeded() -> (InMemoryStore, RefillService, Uuid) {
    water_ledger::telemetry::init_tracing();
    let store = InMemoryStore::new();
    let account = Account::new(Uuid::new_v4(), now() - Duration::days(40), None);
    store.put_account(&account).await.unwrap();
    let service = RefillService::new(Arc::new(store.clone()), LedgerConfig::default());
    (store, service, account.id)
}

async fn requested(service: &RefillService, account_id: Uuid) -> RefillRequest {
    let tomorrow = (now() + Duration::days(1)).date_naive();
    service.create(account_id, tomorrow, 2, now()).await.unwrap()
}

#[tokio::test]
async fn create_validates_container_count() {
    let (store, service, account_id) = seeded().await;
    let tomorrow = (now() + Duration::days(1)).date_naive();

    let err = service
        .create(account_id, tomorrow, 0, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    let request = service.create(account_id, tomorrow, 2, now()).await.unwrap();
    assert_eq!(request.status, RefillStatus::Requested);
    assert_eq!(request.containers, 2);
    assert_eq!(request.version, 0);
    assert_eq!(store.get_refill_request(request.id).await.unwrap(), request);
}

#[tokio::test]
async fn skipping_a_stage_is_rejected_and_one_step_notifies_once() {
    let (store, service, account_id) = seeded().await;
    let request = requested(&service, account_id).await;

    let err = service
        .advance(&request, RefillStatus::OutForDelivery, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    assert!(store.notifications_for(account_id).is_empty());

    let later = now() + Duration::minutes(5);
    let transition = service
        .advance(&request, RefillStatus::InProduction, later)
        .await
        .unwrap();
    assert_eq!(transition.request.status, RefillStatus::InProduction);
    assert_eq!(transition.request.updated_at, later);
    assert_eq!(transition.request.created_at, request.created_at);

    let notifications = store.notifications_for(account_id);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationType::Delivery);
    assert_eq!(notifications[0].title, "Refill in production");
    match transition.notification {
        NotificationOutcome::Emitted(id) => assert_eq!(id, notifications[0].id),
        other => panic!("expected emitted notification, got {other:?}"),
    }
}

#[tokio::test]
async fn full_lifecycle_then_terminal_state_rejects_everything() {
    let (store, service, account_id) = seeded().await;
    let mut request = requested(&service, account_id).await;

    for target in [
        RefillStatus::InProduction,
        RefillStatus::OutForDelivery,
        RefillStatus::Completed,
    ] {
        request = service.advance(&request, target, now()).await.unwrap().request;
    }
    assert_eq!(request.status, RefillStatus::Completed);
    assert_eq!(request.version, 3);
    assert_eq!(store.notifications_for(account_id).len(), 3);

    for target in RefillStatus::ALL {
        let err = service.advance(&request, target, now()).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InvalidTransition {
                from: RefillStatus::Completed,
                ..
            }
        ));
    }
    assert!(matches!(
        service.cancel(&request, now()).await.unwrap_err(),
        LedgerError::InvalidTransition { .. }
    ));
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let (store, service, account_id) = seeded().await;
    let request = requested(&service, account_id).await;

    let cancelled = service.cancel(&request, now()).await.unwrap().request;
    assert_eq!(cancelled.status, RefillStatus::Cancelled);

    let again = service.cancel(&cancelled, now()).await.unwrap();
    assert!(matches!(again.notification, NotificationOutcome::Skipped));
    assert_eq!(again.request, cancelled);
    assert_eq!(store.notifications_for(account_id).len(), 1);

    let err = service
        .advance(&cancelled, RefillStatus::InProduction, now())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTransition { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_advances_from_same_state_only_one_wins() {
    let (store, service, account_id) = seeded().await;
    let request = requested(&service, account_id).await;
    let in_production = service
        .advance(&request, RefillStatus::InProduction, now())
        .await
        .unwrap()
        .request;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let service = service.clone();
            let snapshot = in_production.clone();
            tokio::spawn(async move {
                service
                    .advance(&snapshot, RefillStatus::OutForDelivery, now())
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(transition) => {
                assert_eq!(transition.request.status, RefillStatus::OutForDelivery);
                successes += 1;
            }
            Err(LedgerError::ConcurrentModification { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!((successes, conflicts), (1, 1));

    let stored = store.get_refill_request(request.id).await.unwrap();
    assert_eq!(stored.status, RefillStatus::OutForDelivery);
    assert_eq!(stored.version, 2);
    assert_eq!(store.notifications_for(account_id).len(), 2);
}

#[tokio::test]
async fn failed_notification_is_retried_in_background() {
    let store = FlakyNotifications::default();
    let account = Account::new(Uuid::new_v4(), now() - Duration::days(40), None);
    store.put_account(&account).await.unwrap();
    let config = LedgerConfig {
        notification_retry_attempts: 10,
        notification_retry_backoff: StdDuration::from_millis(5),
        ..LedgerConfig::default()
    };
    let emitter = NotificationEmitter::new(Arc::new(store.clone()), &config);
    let service = RefillService::new(Arc::new(store.clone()), config.clone())
        .with_retry_worker(start_notification_retry_worker(emitter, &config));
    let request = requested(&service, account.id).await;

    store.offline.store(true, Ordering::SeqCst);
    let transition = service
        .advance(&request, RefillStatus::InProduction, now())
        .await
        .unwrap();
    let NotificationOutcome::Failed {
        notification,
        queued: true,
        ..
    } = transition.notification
    else {
        panic!("notification should have been queued while the store is offline");
    };
    store.offline.store(false, Ordering::SeqCst);

    let mut delivered = Vec::new();
    for _ in 0..100 {
        delivered = store.inner.notifications_for(account.id);
        if !delivered.is_empty() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].id, notification);
}
