use anyhow::{Context, Result};
use ibr_schemas::{CommissionReportRecord, Identifier, OrderStatusRecord, PersistRecord};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub const ENV_DB_URL: &str = "IBREST_DATABASE_URL";

/// Connect to Postgres at `url`.
pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Store the latest terminal status reported for an order.
pub async fn upsert_filled_order(pool: &PgPool, status: &OrderStatusRecord) -> Result<()> {
    let json = serde_json::to_value(status).context("encode order status")?;
    sqlx::query(
        r#"
        insert into filled_orders (order_id, order_status)
        values ($1, $2)
        on conflict (order_id) do update set
          order_status = excluded.order_status,
          updated_at = now()
        "#,
    )
    .bind(status.order_id)
    .bind(&json)
    .execute(pool)
    .await
    .context("upsert filled_orders failed")?;
    Ok(())
}

pub async fn upsert_commission(pool: &PgPool, report: &CommissionReportRecord) -> Result<()> {
    let json = serde_json::to_value(report).context("encode commission report")?;
    sqlx::query(
        r#"
        insert into commissions (exec_id, commission_report)
        values ($1, $2)
        on conflict (exec_id) do update set
          commission_report = excluded.commission_report,
          updated_at = now()
        "#,
    )
    .bind(&report.exec_id)
    .bind(&json)
    .execute(pool)
    .await
    .context("upsert commissions failed")?;
    Ok(())
}

pub async fn fetch_filled_order(pool: &PgPool, order_id: Identifier) -> Result<Option<Value>> {
    let row: Option<(Value,)> =
        sqlx::query_as("select order_status from filled_orders where order_id = $1")
            .bind(order_id)
            .fetch_optional(pool)
            .await
            .context("fetch filled_orders failed")?;
    Ok(row.map(|(v,)| v))
}

pub async fn fetch_commission(pool: &PgPool, exec_id: &str) -> Result<Option<Value>> {
    let row: Option<(Value,)> =
        sqlx::query_as("select commission_report from commissions where exec_id = $1")
            .bind(exec_id)
            .fetch_optional(pool)
            .await
            .context("fetch commissions failed")?;
    Ok(row.map(|(v,)| v))
}

pub async fn persist(pool: &PgPool, record: &PersistRecord) -> Result<()> {
    match record {
        PersistRecord::FilledOrder(status) => upsert_filled_order(pool, status).await,
        PersistRecord::Commission(report) => upsert_commission(pool, report).await,
    }
}

/// Drain `rx` until every sender is gone, writing each record.
///
/// Failures are logged and the record is dropped; the event path that
/// produced it never waits on the database. Without a pool records are
/// only logged.
pub fn spawn_persistence_writer(
    pool: Option<PgPool>,
    mut rx: UnboundedReceiver<PersistRecord>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        if pool.is_none() {
            info!("no database configured; fills and commissions are not persisted");
        }
        let mut written = 0u64;
        while let Some(record) = rx.recv().await {
            let Some(pool) = &pool else {
                debug!(?record, "record not persisted");
                continue;
            };
            match persist(pool, &record).await {
                Ok(()) => written += 1,
                Err(e) => error!(error = %format!("{e:#}"), ?record, "persist failed"),
            }
        }
        debug!(written, "persistence writer stopped");
        written
    })
}
