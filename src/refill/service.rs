use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use super::models::{RefillRequest, RefillStatus};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::models::today;
use crate::notifications::{
    Notification, NotificationEmitter, NotificationRetryHandle, NotificationType,
};
use crate::store::{with_deadline, LedgerStore};

/// What happened to the notification that accompanies a transition.
#[derive(Debug)]
pub enum NotificationOutcome {
    Emitted(Uuid),
    /// The transition is persisted but its notification was not. `queued` tells whether the
    /// retry worker accepted it; without a worker, or with its queue full, it is dropped.
    Failed {
        notification: Uuid,
        error: LedgerError,
        queued: bool,
    },
    /// Nothing changed, so nothing was announced.
    Skipped,
}

/// key: refill-transition -> persisted request plus notification outcome
#[derive(Debug)]
pub struct RefillTransition {
    pub request: RefillRequest,
    pub notification: NotificationOutcome,
}

/// key: refill-service -> refill request lifecycle
#[derive(Clone)]
pub struct RefillService {
    store: Arc<dyn LedgerStore>,
    emitter: NotificationEmitter,
    retry: Option<NotificationRetryHandle>,
    config: LedgerConfig,
}

impl RefillService {
    pub fn new(store: Arc<dyn LedgerStore>, config: LedgerConfig) -> Self {
        let emitter = NotificationEmitter::new(store.clone(), &config);
        Self {
            store,
            emitter,
            retry: None,
            config,
        }
    }

    /// Routes notifications that fail on first write to a retry worker.
    pub fn with_retry_worker(mut self, handle: NotificationRetryHandle) -> Self {
        self.retry = Some(handle);
        self
    }

    pub async fn create(
        &self,
        account_id: Uuid,
        requested_date: NaiveDate,
        containers: u32,
        now: DateTime<Utc>,
    ) -> LedgerResult<RefillRequest> {
        if containers == 0 {
            return Err(LedgerError::validation(
                "a refill request needs at least one container",
            ));
        }
        if requested_date < today(now) {
            return Err(LedgerError::validation(format!(
                "requested date {requested_date} is in the past"
            )));
        }

        with_deadline(self.config.store_timeout, self.store.get_account(account_id)).await?;

        let request = RefillRequest {
            id: Uuid::new_v4(),
            account_id,
            requested_date,
            containers,
            status: RefillStatus::Requested,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        with_deadline(
            self.config.store_timeout,
            self.store.insert_refill_request(&request),
        )
        .await?;

        info!(
            request = %request.id,
            account = %account_id,
            containers,
            requested_date = %requested_date,
            "refill requested"
        );
        Ok(request)
    }

    /// Moves `request` to `target`. The write only lands if the stored request still has the
    /// version `request` was read at.
    pub async fn advance(
        &self,
        request: &RefillRequest,
        target: RefillStatus,
        now: DateTime<Utc>,
    ) -> LedgerResult<RefillTransition> {
        let status = request.status.transition_to(target)?;
        let updated = request.transitioned(status, now);

        with_deadline(
            self.config.store_timeout,
            self.store.put_refill_request(&updated, request.version),
        )
        .await?;

        info!(
            request = %updated.id,
            account = %updated.account_id,
            from = request.status.as_str(),
            to = updated.status.as_str(),
            version = updated.version,
            "refill status advanced"
        );

        let notification = self.announce(&updated, now).await;
        Ok(RefillTransition {
            request: updated,
            notification,
        })
    }

    /// Cancels a non-terminal request; an already cancelled request comes back unchanged.
    pub async fn cancel(
        &self,
        request: &RefillRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<RefillTransition> {
        if request.status == RefillStatus::Cancelled {
            return Ok(RefillTransition {
                request: request.clone(),
                notification: NotificationOutcome::Skipped,
            });
        }
        self.advance(request, RefillStatus::Cancelled, now).await
    }

    /// Re-reads the request and advances from its current stored state. This is the path to use
    /// when retrying after `ConcurrentModification` or `StoreUnavailable`.
    pub async fn advance_by_id(
        &self,
        request_id: Uuid,
        target: RefillStatus,
        now: DateTime<Utc>,
    ) -> LedgerResult<RefillTransition> {
        let current = self.request(request_id).await?;
        if target == RefillStatus::Cancelled {
            return self.cancel(&current, now).await;
        }
        self.advance(&current, target, now).await
    }

    pub async fn request(&self, request_id: Uuid) -> LedgerResult<RefillRequest> {
        with_deadline(
            self.config.store_timeout,
            self.store.get_refill_request(request_id),
        )
        .await
    }

    async fn announce(&self, request: &RefillRequest, now: DateTime<Utc>) -> NotificationOutcome {
        let (title, description) = request.status_message();
        let notification = Notification::new(
            Uuid::new_v4(),
            request.account_id,
            NotificationType::Delivery,
            title,
            description,
            now,
        );

        match self.emitter.deliver(&notification).await {
            Ok(id) => NotificationOutcome::Emitted(id),
            Err(error) => {
                warn!(
                    ?error,
                    request = %request.id,
                    notification = %notification.id,
                    "refill transition persisted but notification failed"
                );
                let id = notification.id;
                let queued = match &self.retry {
                    Some(retry) => match retry.dispatch(notification) {
                        Ok(()) => true,
                        Err(err) => {
                            warn!(?err, notification = %id, "could not queue notification retry");
                            false
                        }
                    },
                    None => false,
                };
                NotificationOutcome::Failed {
                    notification: id,
                    error,
                    queued,
                }
            }
        }
    }
}
