use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::LedgerStore;
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::{
    Account, DeliveryRecord, DeliveryStatus, DeliveryTime, Plan, RolloverOverride,
};
use crate::notifications::Notification;
use crate::refill::{RefillRequest, RefillStatus};

/// key: ledger-store-postgres -> durable store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Account> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                created_at,
                updated_at,
                plan_liters_per_month,
                plan_bonus_liters,
                plan_delivery_day,
                plan_delivery_time
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(LedgerError::NotFound {
                entity: "account",
                id: account_id,
            });
        };
        account_from_row(&row)
    }

    async fn put_account(&self, account: &Account) -> LedgerResult<()> {
        let plan = account.plan.as_ref();
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id,
                created_at,
                updated_at,
                plan_liters_per_month,
                plan_bonus_liters,
                plan_delivery_day,
                plan_delivery_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id)
            DO UPDATE SET
                updated_at = EXCLUDED.updated_at,
                plan_liters_per_month = EXCLUDED.plan_liters_per_month,
                plan_bonus_liters = EXCLUDED.plan_bonus_liters,
                plan_delivery_day = EXCLUDED.plan_delivery_day,
                plan_delivery_time = EXCLUDED.plan_delivery_time
            "#,
        )
        .bind(account.id)
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(plan.map(|plan| plan.liters_per_month))
        .bind(plan.map(|plan| plan.bonus_liters))
        .bind(plan.map(|plan| plan.delivery_day.to_string()))
        .bind(plan.map(|plan| plan.delivery_time.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_deliveries(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<DeliveryRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, date, volume_containers, status, proof_url
            FROM deliveries
            WHERE account_id = $1
              AND date >= $2
              AND date <= $3
            ORDER BY date ASC
            "#,
        )
        .bind(account_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(delivery_from_row).collect()
    }

    async fn get_refill_request(&self, request_id: Uuid) -> LedgerResult<RefillRequest> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, requested_date, containers, status, version, created_at, updated_at
            FROM refill_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(LedgerError::NotFound {
                entity: "refill request",
                id: request_id,
            });
        };
        refill_from_row(&row)
    }

    async fn insert_refill_request(&self, request: &RefillRequest) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refill_requests (
                id,
                account_id,
                requested_date,
                containers,
                status,
                version,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(request.id)
        .bind(request.account_id)
        .bind(request.requested_date)
        .bind(containers_to_db(request.containers)?)
        .bind(request.status.as_str())
        .bind(request.version)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn put_refill_request(
        &self,
        request: &RefillRequest,
        expected_version: i64,
    ) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE refill_requests
            SET status = $2,
                version = $3,
                updated_at = $4
            WHERE id = $1
              AND version = $5
            "#,
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.version)
        .bind(request.updated_at)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM refill_requests WHERE id = $1")
                .bind(request.id)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(_) => Err(LedgerError::ConcurrentModification {
                request_id: request.id,
                expected_version,
            }),
            None => Err(LedgerError::NotFound {
                entity: "refill request",
                id: request.id,
            }),
        }
    }

    async fn put_notification(&self, notification: &Notification) -> LedgerResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO notifications (
                id,
                account_id,
                type,
                title,
                description,
                created_at,
                is_read
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.account_id)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.description)
        .bind(notification.created_at)
        .bind(notification.is_read)
        .execute(&self.pool)
        .await?;
        Ok(notification.id)
    }

    async fn get_rollover_override(
        &self,
        account_id: Uuid,
        cycle_start: DateTime<Utc>,
    ) -> LedgerResult<Option<RolloverOverride>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, cycle_start, liters, consumed_when_saved, created_at
            FROM rollover_overrides
            WHERE account_id = $1 AND cycle_start = $2
            "#,
        )
        .bind(account_id)
        .bind(cycle_start)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(override_from_row).transpose()
    }

    async fn insert_rollover_override(
        &self,
        value: &RolloverOverride,
    ) -> LedgerResult<RolloverOverride> {
        sqlx::query(
            r#"
            INSERT INTO rollover_overrides
                (account_id, cycle_start, liters, consumed_when_saved, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id, cycle_start) DO NOTHING
            "#,
        )
        .bind(value.account_id)
        .bind(value.cycle_start)
        .bind(value.liters)
        .bind(value.consumed_when_saved)
        .bind(value.created_at)
        .execute(&self.pool)
        .await?;

        self.get_rollover_override(value.account_id, value.cycle_start)
            .await?
            .ok_or_else(|| {
                LedgerError::StoreUnavailable("rollover override vanished after insert".into())
            })
    }
}

fn account_from_row(row: &PgRow) -> LedgerResult<Account> {
    let liters: Option<f64> = row.try_get("plan_liters_per_month")?;
    let bonus: Option<f64> = row.try_get("plan_bonus_liters")?;
    let day: Option<String> = row.try_get("plan_delivery_day")?;
    let time: Option<String> = row.try_get("plan_delivery_time")?;

    let plan = match (liters, bonus, day, time) {
        (Some(liters), Some(bonus), Some(day), Some(time)) => {
            let delivery_day = day.parse::<Weekday>().map_err(|_| corrupt("delivery day", &day))?;
            let delivery_time = time.parse::<DeliveryTime>()?;
            Some(Plan::new(liters, bonus, delivery_day, delivery_time)?)
        }
        _ => None,
    };

    Ok(Account {
        id: row.try_get("id")?,
        created_at: row.try_get("created_at")?,
        plan,
        updated_at: row.try_get("updated_at")?,
    })
}

fn delivery_from_row(row: &PgRow) -> LedgerResult<DeliveryRecord> {
    let status: String = row.try_get("status")?;
    let containers: i32 = row.try_get("volume_containers")?;
    Ok(DeliveryRecord {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        date: row.try_get("date")?,
        volume_containers: u32::try_from(containers)
            .map_err(|_| corrupt("volume containers", &containers.to_string()))?,
        status: DeliveryStatus::from_str(&status)
            .ok_or_else(|| corrupt("delivery status", &status))?,
        proof_url: row.try_get("proof_url")?,
    })
}

fn refill_from_row(row: &PgRow) -> LedgerResult<RefillRequest> {
    let status: String = row.try_get("status")?;
    let containers: i32 = row.try_get("containers")?;
    let requested_date: NaiveDate = row.try_get("requested_date")?;
    Ok(RefillRequest {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        requested_date,
        containers: u32::try_from(containers)
            .map_err(|_| corrupt("refill containers", &containers.to_string()))?,
        status: RefillStatus::from_str(&status).ok_or_else(|| corrupt("refill status", &status))?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn override_from_row(row: &PgRow) -> LedgerResult<RolloverOverride> {
    Ok(RolloverOverride {
        account_id: row.try_get("account_id")?,
        cycle_start: row.try_get("cycle_start")?,
        liters: row.try_get("liters")?,
        consumed_when_saved: row.try_get("consumed_when_saved")?,
        created_at: row.try_get("created_at")?,
    })
}

fn containers_to_db(containers: u32) -> LedgerResult<i32> {
    i32::try_from(containers)
        .map_err(|_| LedgerError::validation(format!("{containers} containers exceeds storage range")))
}

fn corrupt(field: &str, value: &str) -> LedgerError {
    LedgerError::StoreUnavailable(format!("stored {field} `{value}` is not recognised"))
}
