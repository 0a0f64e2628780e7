//! Postgres-backed price store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `NotFound` (product missing) |
//! | Database (check constraint violation) | `23514` | `Conflict` |
//! | Database (other) | Any other | `Persistence` |
//! | PoolClosed / other | N/A | `Persistence` |
//!
//! ## Atomicity
//!
//! `apply_deltas` runs in one transaction and locks the product row first, so
//! two writers for the same product are serialized at the database as well.
//! Any failure drops the transaction, which rolls it back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use pricebook_core::{PriceIntervalId, ProductId};
use pricebook_products::{DateRange, Price, PriceInterval, Product, Reconciliation};

use super::{PriceStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_price_intervals.sql");

/// Postgres-backed price store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresPriceStore {
    pool: Arc<PgPool>,
}

impl PostgresPriceStore {
    /// Create a new PostgresPriceStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl PriceStore for PostgresPriceStore {
    #[instrument(skip_all, fields(product_id = %product.id_typed()), err)]
    async fn create_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO products (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(product.id_typed().as_uuid())
            .bind(product.name())
            .bind(product.created_at())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("create_product", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(product_id = %id), err)]
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.map(|r| product_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at FROM products ORDER BY created_at, id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(
        skip_all,
        fields(
            product_id = %product_id,
            range = %range,
            candidates = tracing::field::Empty
        ),
        err
    )]
    async fn fetch_overlapping(
        &self,
        product_id: ProductId,
        range: DateRange,
    ) -> Result<Vec<PriceInterval>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, start_date, end_date, price
            FROM price_intervals
            WHERE product_id = $1
                AND start_date <= $3
                AND end_date >= $2
            ORDER BY start_date, id
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_overlapping", e))?;

        Span::current().record("candidates", rows.len());
        rows.iter().map(interval_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_intervals(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<PriceInterval>, StoreError> {
        let product_param: Option<Uuid> = product_id.map(|id| *id.as_uuid());
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, start_date, end_date, price
            FROM price_intervals
            WHERE ($1::uuid IS NULL OR product_id = $1)
            ORDER BY product_id, start_date
            "#,
        )
        .bind(product_param)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_intervals", e))?;

        rows.iter().map(interval_from_row).collect()
    }

    #[instrument(
        skip_all,
        fields(
            product_id = %product_id,
            deletions = deltas.deletions.len(),
            updates = deltas.updates.len(),
            insertions = deltas.insertions.len()
        ),
        err
    )]
    async fn apply_deltas(
        &self,
        product_id: ProductId,
        deltas: &Reconciliation,
        new_interval: &PriceInterval,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        lock_product(&mut tx, product_id).await?;

        if !deltas.deletions.is_empty() {
            let ids: Vec<Uuid> = deltas.deletions.iter().map(|id| *id.as_uuid()).collect();
            let deleted = sqlx::query(
                "DELETE FROM price_intervals WHERE product_id = $1 AND id = ANY($2)",
            )
            .bind(product_id.as_uuid())
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_intervals", e))?
            .rows_affected();

            if deleted != ids.len() as u64 {
                return Err(StoreError::Conflict(format!(
                    "expected to delete {} intervals, deleted {deleted}",
                    ids.len()
                )));
            }
        }

        for update in &deltas.updates {
            let updated = sqlx::query(
                r#"
                UPDATE price_intervals
                SET start_date = $3, end_date = $4
                WHERE product_id = $1 AND id = $2
                "#,
            )
            .bind(product_id.as_uuid())
            .bind(update.id.as_uuid())
            .bind(update.range.start())
            .bind(update.range.end())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_interval", e))?
            .rows_affected();

            if updated != 1 {
                return Err(StoreError::Conflict(format!(
                    "price interval {} is no longer present",
                    update.id
                )));
            }
        }

        for fragment in &deltas.insertions {
            let interval = fragment.clone().into_interval(PriceIntervalId::new());
            insert_interval(&mut tx, &interval).await?;
        }
        insert_interval(&mut tx, new_interval).await?;

        ensure_disjoint(&mut tx, product_id).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<(), StoreError> {
    let row = sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_product", e))?;

    match row {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound(format!("product {product_id}"))),
    }
}

async fn insert_interval(
    tx: &mut Transaction<'_, Postgres>,
    interval: &PriceInterval,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO price_intervals (id, product_id, start_date, end_date, price)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(interval.id_typed().as_uuid())
    .bind(interval.product_id().as_uuid())
    .bind(interval.start_date())
    .bind(interval.end_date())
    .bind(interval.price().amount())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_interval", e))?;
    Ok(())
}

/// Last line of defence before commit: no two intervals of the product share a day.
async fn ensure_disjoint(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
) -> Result<(), StoreError> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS overlaps
        FROM price_intervals a
        JOIN price_intervals b
            ON a.product_id = b.product_id
            AND a.id < b.id
            AND a.start_date <= b.end_date
            AND a.end_date >= b.start_date
        WHERE a.product_id = $1
        "#,
    )
    .bind(product_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("ensure_disjoint", e))?;

    let overlaps: i64 = row
        .try_get("overlaps")
        .map_err(|e| StoreError::Persistence(format!("failed to read overlap count: {e}")))?;
    if overlaps > 0 {
        return Err(StoreError::Conflict(format!(
            "{overlaps} overlapping interval pairs for product {product_id}"
        )));
    }
    Ok(())
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let read = || -> Result<(Uuid, String, DateTime<Utc>), sqlx::Error> {
        Ok((row.try_get("id")?, row.try_get("name")?, row.try_get("created_at")?))
    };
    let (id, name, created_at) =
        read().map_err(|e| StoreError::Persistence(format!("failed to read product row: {e}")))?;
    Ok(Product::restore(ProductId::from_uuid(id), name, created_at))
}

fn interval_from_row(row: &PgRow) -> Result<PriceInterval, StoreError> {
    let read = || -> Result<(Uuid, Uuid, NaiveDate, NaiveDate, Decimal), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            row.try_get("product_id")?,
            row.try_get("start_date")?,
            row.try_get("end_date")?,
            row.try_get("price")?,
        ))
    };
    let (id, product_id, start, end, amount) = read()
        .map_err(|e| StoreError::Persistence(format!("failed to read interval row: {e}")))?;

    let corrupt = |e: pricebook_core::DomainError| {
        StoreError::Persistence(format!("corrupt price interval {id}: {e}"))
    };
    let range = DateRange::new(start, end).map_err(corrupt)?;
    let price = Price::new(amount).map_err(corrupt)?;

    Ok(PriceInterval::new(
        PriceIntervalId::from_uuid(id),
        ProductId::from_uuid(product_id),
        range,
        price,
    ))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23514") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Persistence(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Persistence(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Persistence(format!("error in {}: {}", operation, other)),
    }
}
