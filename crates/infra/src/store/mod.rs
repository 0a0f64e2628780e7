//! Price storage abstractions.
//!
//! The pricing core never talks to storage; [`PriceStore`] is the collaborator
//! the service uses to fetch overlap candidates and to apply a reconciliation.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use pricebook_core::ProductId;
use pricebook_products::{DateRange, PriceInterval, Product, Reconciliation};

use crate::config::Config;

pub use in_memory::InMemoryPriceStore;
pub use postgres::PostgresPriceStore;

/// Storage operation error.
///
/// These are **infrastructure errors** (missing rows, lost races, backend
/// failures) as opposed to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A referenced product or interval does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The stored state changed under us (row gone, constraint hit, overlap).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backend failed (connection, query, corrupt row).
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Storage collaborator for products and their price intervals.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn create_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// All products, oldest first.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// Every interval of `product_id` with
    /// `start_date <= range.end AND end_date >= range.start`, ordered by start date.
    async fn fetch_overlapping(
        &self,
        product_id: ProductId,
        range: DateRange,
    ) -> Result<Vec<PriceInterval>, StoreError>;

    /// Intervals ordered by start date, for one product or for all of them.
    async fn list_intervals(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<PriceInterval>, StoreError>;

    /// Apply `deltas` and insert `new_interval`, all or nothing.
    ///
    /// Fails with `Conflict` when a deleted/updated interval no longer exists or
    /// when the result would contain overlapping intervals for the product.
    async fn apply_deltas(
        &self,
        product_id: ProductId,
        deltas: &Reconciliation,
        new_interval: &PriceInterval,
    ) -> Result<(), StoreError>;
}

/// Build the store selected by configuration: Postgres when `DATABASE_URL`
/// is set, in-memory otherwise.
pub async fn connect(config: &Config) -> Result<Arc<dyn PriceStore>, StoreError> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresPriceStore::connect(url, config.db_max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!("using postgres price store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory price store");
            Ok(Arc::new(InMemoryPriceStore::new()))
        }
    }
}
