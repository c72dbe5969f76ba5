use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

use crate::config::LedgerConfig;
use crate::store::PgStore;

/// Connects to Postgres and applies the bundled migrations.
pub async fn connect(config: &LedgerConfig) -> Result<PgStore> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.store_timeout)
        .connect(&config.database_url)
        .await
        .context("failed to connect to ledger database")?;

    if let Err(error) = sqlx::migrate!().run(&pool).await {
        if config.allow_migration_failure {
            tracing::warn!(
                ?error,
                "ledger migrations failed but continuing due to LEDGER_ALLOW_MIGRATION_FAILURE"
            );
        } else {
            return Err(error).context("failed to apply ledger migrations");
        }
    }

    tracing::info!(
        max_connections = config.max_connections,
        "ledger store connected"
    );
    Ok(PgStore::new(pool))
}
