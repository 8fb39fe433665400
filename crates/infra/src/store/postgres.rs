//! Postgres-backed order store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Integrity` |
//! | Database (foreign key / check violation) | `23503` / `23514` | `Integrity` |
//! | Database (append-only trigger) | `P0001` | `Integrity` |
//! | Database (other), PoolClosed, Io, ... | any | `Backend` |
//!
//! A stale version is detected by `UPDATE ... WHERE version = $expected`
//! affecting zero rows, and reported as `Concurrency`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use orderdesk_core::{AggregateRoot, AuditLogId, OrderId, UserId};
use orderdesk_orders::{AuditAction, AuditLog, Order, OrderSnapshot, OrderStatus};

use super::r#trait::{AuditQuery, Committed, OrderChange, OrderStore, StoreError, UnitOfWork};

/// Tables, the index on `audit_logs.order_id`, and the append-only trigger.
///
/// Idempotent. The trigger rejects every UPDATE/DELETE on `audit_logs` except
/// the `ON DELETE SET NULL` cascade clearing `order_id`.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id                  UUID PRIMARY KEY,
    title               VARCHAR(120) NOT NULL,
    amount              NUMERIC(18,2) NOT NULL CHECK (amount >= 0 AND amount <= 1000000),
    status              SMALLINT NOT NULL,
    created_by_user_id  UUID NOT NULL,
    created_at_utc      TIMESTAMPTZ NOT NULL,
    approved_at_utc     TIMESTAMPTZ NULL,
    version             BIGINT NOT NULL CHECK (version >= 1),
    CONSTRAINT orders_approved_at_iff_approved CHECK ((status = 2) = (approved_at_utc IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id                      UUID PRIMARY KEY,
    action                  SMALLINT NOT NULL CHECK (action BETWEEN 1 AND 7),
    occurred_at_utc         TIMESTAMPTZ NOT NULL,
    performed_by_user_id    UUID NULL,
    performed_by_user_name  VARCHAR(256) NULL,
    order_id                UUID NULL REFERENCES orders(id) ON DELETE SET NULL,
    details                 VARCHAR(2000) NULL
);

CREATE INDEX IF NOT EXISTS ix_audit_logs_order_id ON audit_logs (order_id);

CREATE OR REPLACE FUNCTION audit_logs_append_only() RETURNS trigger AS $$
BEGIN
    IF TG_OP = 'UPDATE'
       AND OLD.order_id IS NOT NULL
       AND NEW.order_id IS NULL
       AND ROW(NEW.id, NEW.action, NEW.occurred_at_utc, NEW.performed_by_user_id,
               NEW.performed_by_user_name, NEW.details)
           IS NOT DISTINCT FROM
           ROW(OLD.id, OLD.action, OLD.occurred_at_utc, OLD.performed_by_user_id,
               OLD.performed_by_user_name, OLD.details)
    THEN
        RETURN NEW;
    END IF;
    RAISE EXCEPTION 'audit_logs is append-only';
END;
$$ LANGUAGE plpgsql;

DROP TRIGGER IF EXISTS audit_logs_append_only ON audit_logs;
CREATE TRIGGER audit_logs_append_only
    BEFORE UPDATE OR DELETE ON audit_logs
    FOR EACH ROW EXECUTE FUNCTION audit_logs_append_only();
"#;

const ORDER_COLUMNS: &str = "id, title, amount, status, created_by_user_id, created_at_utc, approved_at_utc, version";

/// Postgres-backed implementation of [`OrderStore`].
///
/// Each commit runs in one transaction: the order write (if any) and the audit
/// insert either both commit or the transaction is rolled back.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<(), StoreError> {
        let snap = order.snapshot();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, title, amount, status, created_by_user_id,
                created_at_utc, approved_at_utc, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(snap.id.as_uuid())
        .bind(&snap.title)
        .bind(snap.amount)
        .bind(snap.status.code())
        .bind(snap.created_by_user_id.as_uuid())
        .bind(snap.created_at_utc)
        .bind(snap.approved_at_utc)
        .bind(snap.version as i64)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;
        Ok(())
    }

    async fn update_order(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let snap = order.snapshot();
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET title = $2,
                amount = $3,
                status = $4,
                approved_at_utc = $5,
                version = $6
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(snap.id.as_uuid())
        .bind(&snap.title)
        .bind(snap.amount)
        .bind(snap.status.code())
        .bind(snap.approved_at_utc)
        .bind(snap.version as i64)
        .bind(expected_version as i64)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(snap.id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("read_version", e))?;

        match current {
            None => Err(StoreError::NotFound(snap.id)),
            Some(found) => Err(StoreError::Concurrency(format!(
                "order {}: expected version {}, found {}",
                snap.id, expected_version, found
            ))),
        }
    }

    async fn insert_audit(tx: &mut Transaction<'_, Postgres>, log: &AuditLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, action, occurred_at_utc, performed_by_user_id,
                performed_by_user_name, order_id, details
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id.as_uuid())
        .bind(log.action.code())
        .bind(log.occurred_at_utc)
        .bind(log.performed_by_user_id.map(Uuid::from))
        .bind(log.performed_by_user_name.as_deref())
        .bind(log.order_id.map(Uuid::from))
        .bind(log.details.as_deref())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_audit", e))?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(
        skip(self, work),
        fields(action = %work.audit.action, order_id = tracing::field::Empty),
        err
    )]
    async fn commit(&self, work: UnitOfWork) -> Result<Committed, StoreError> {
        work.check()?;

        if let Some(change) = &work.order {
            Span::current().record("order_id", tracing::field::display(change.order().id()));
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let written = match &work.order {
            Some(OrderChange::Insert(order)) => Self::insert_order(&mut tx, order).await,
            Some(OrderChange::Update {
                order,
                expected_version,
            }) => Self::update_order(&mut tx, order, *expected_version).await,
            None => Ok(()),
        };
        if let Err(e) = written {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(e);
        }

        let log = work.audit.into_log(AuditLogId::new(), Utc::now());
        if let Err(e) = Self::insert_audit(&mut tx, &log).await {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        let order = work.order.map(|change| match change {
            OrderChange::Insert(order) => order,
            OrderChange::Update { order, .. } => order,
        });
        Ok(Committed { order, audit: log })
    }

    #[instrument(skip(self), fields(order_id = %id), err)]
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        row.map(|r| order_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at_utc ASC, id ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders", e))?;

        rows.iter().map(order_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, action, occurred_at_utc, performed_by_user_id,
                   performed_by_user_name, order_id, details
            FROM audit_logs
            WHERE ($1::uuid IS NULL OR order_id = $1)
              AND ($2::smallint IS NULL OR action = $2)
            ORDER BY occurred_at_utc DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(query.order_id.map(Uuid::from))
        .bind(query.action.map(|a| a.code()))
        .bind(query.limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_audit", e))?;

        rows.iter().map(audit_from_row).collect()
    }
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let read = |e: sqlx::Error| StoreError::Integrity(format!("failed to read order row: {e}"));

    let version: i64 = row.try_get("version").map_err(read)?;
    let status: i16 = row.try_get("status").map_err(read)?;
    let snapshot = OrderSnapshot {
        id: OrderId::from_uuid(row.try_get("id").map_err(read)?),
        title: row.try_get("title").map_err(read)?,
        amount: row.try_get::<Decimal, _>("amount").map_err(read)?,
        status: OrderStatus::from_code(status).map_err(|e| StoreError::Integrity(e.to_string()))?,
        created_by_user_id: UserId::from_uuid(row.try_get("created_by_user_id").map_err(read)?),
        created_at_utc: row.try_get::<DateTime<Utc>, _>("created_at_utc").map_err(read)?,
        approved_at_utc: row
            .try_get::<Option<DateTime<Utc>>, _>("approved_at_utc")
            .map_err(read)?,
        version: version as u64,
    };

    Order::restore(snapshot).map_err(|e| StoreError::Integrity(e.to_string()))
}

fn audit_from_row(row: &PgRow) -> Result<AuditLog, StoreError> {
    let read = |e: sqlx::Error| StoreError::Integrity(format!("failed to read audit row: {e}"));

    let action: i16 = row.try_get("action").map_err(read)?;
    Ok(AuditLog {
        id: AuditLogId::from_uuid(row.try_get("id").map_err(read)?),
        action: AuditAction::from_code(action).map_err(|e| StoreError::Integrity(e.to_string()))?,
        occurred_at_utc: row.try_get("occurred_at_utc").map_err(read)?,
        performed_by_user_id: row
            .try_get::<Option<Uuid>, _>("performed_by_user_id")
            .map_err(read)?
            .map(UserId::from_uuid),
        performed_by_user_name: row.try_get("performed_by_user_name").map_err(read)?,
        order_id: row
            .try_get::<Option<Uuid>, _>("order_id")
            .map_err(read)?
            .map(OrderId::from_uuid),
        details: row.try_get("details").map_err(read)?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // unique, foreign key, check, raise_exception (append-only trigger)
                Some("23505") | Some("23503") | Some("23514") | Some("P0001") => {
                    StoreError::Integrity(msg)
                }
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
