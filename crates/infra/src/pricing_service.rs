//! Application-level orchestration for pricing.
//!
//! ```text
//! SetPrice
//!   ↓
//! 1. Validate (range, price, product exists)
//!   ↓
//! 2. Take the product's lock
//!   ↓
//! 3. Fetch overlapping intervals
//!   ↓
//! 4. Reconcile (pure)
//!   ↓
//! 5. Apply deltas + new interval atomically
//! ```
//!
//! Steps 3-5 race with any other writer of the same product, so they always run
//! under that product's lock. Different products never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use pricebook_core::{DomainError, PriceIntervalId, ProductId};
use pricebook_products::{
    reconcile, weighted_average, DateRange, Price, PriceInterval, PriceStats, Product,
};

use crate::store::{PriceStore, StoreError};

/// Command: store a price for a product over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetPrice {
    pub product_id: ProductId,
    pub start_date: NaiveDate,
    /// `None` means open-ended.
    pub end_date: Option<NaiveDate>,
    pub price: Decimal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Stored state changed concurrently; retrying the request is safe.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
}

impl From<DomainError> for PricingError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidRange { .. } => PricingError::InvalidRange(err.to_string()),
            DomainError::InvalidPrice(msg) => PricingError::InvalidPrice(msg),
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                PricingError::Validation(msg)
            }
            DomainError::NotFound => PricingError::NotFound("not found".to_string()),
            DomainError::InvariantViolation(msg) => PricingError::Conflict(msg),
        }
    }
}

impl From<StoreError> for PricingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => PricingError::NotFound(msg),
            StoreError::Conflict(msg) => PricingError::Conflict(msg),
            StoreError::Persistence(msg) => PricingError::PersistenceFailure(msg),
        }
    }
}

/// One async mutex per product, created on first use and dropped once the
/// last holder or waiter lets go.
#[derive(Debug, Default)]
struct ProductLocks {
    inner: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
}

impl ProductLocks {
    async fn lock(&self, product_id: ProductId) -> ProductLockGuard<'_> {
        // Clones are only taken under the map lock, so a strong count of 1
        // seen under that lock means nobody else holds or awaits the mutex.
        let lock = self.entries().entry(product_id).or_default().clone();
        let guard = lock.lock_owned().await;
        ProductLockGuard {
            locks: self,
            product_id,
            guard: Some(guard),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<ProductId, Arc<AsyncMutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries().len()
    }
}

/// Holds a product's lock; evicts the registry entry on release when unused.
struct ProductLockGuard<'a> {
    locks: &'a ProductLocks,
    product_id: ProductId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProductLockGuard<'_> {
    fn drop(&mut self) {
        // Release the mutex (and its Arc clone) before inspecting the count.
        drop(self.guard.take());
        let mut entries = self.locks.entries();
        if entries
            .get(&self.product_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            entries.remove(&self.product_id);
        }
    }
}

/// Pricing use cases over a [`PriceStore`].
pub struct PricingService {
    store: Arc<dyn PriceStore>,
    locks: ProductLocks,
}

impl PricingService {
    pub fn new(store: Arc<dyn PriceStore>) -> Self {
        Self {
            store,
            locks: ProductLocks::default(),
        }
    }

    pub async fn create_product(&self, name: &str) -> Result<Product, PricingError> {
        let product = Product::create(ProductId::new(), name, Utc::now())?;
        self.store.create_product(&product).await?;
        tracing::info!(product_id = %product.id_typed(), name = product.name(), "product created");
        Ok(product)
    }

    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, PricingError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or_else(|| PricingError::NotFound(format!("product {product_id}")))
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, PricingError> {
        Ok(self.store.list_products().await?)
    }

    pub async fn list_intervals(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<PriceInterval>, PricingError> {
        if let Some(id) = product_id {
            self.get_product(id).await?;
        }
        Ok(self.store.list_intervals(product_id).await?)
    }

    /// Store `cmd` as the product's price over its range, reshaping existing
    /// intervals so none overlap. Returns the stored interval.
    pub async fn set_price(&self, cmd: SetPrice) -> Result<PriceInterval, PricingError> {
        let range = DateRange::from_optional_end(cmd.start_date, cmd.end_date)?;
        let price = Price::new(cmd.price)?;

        // Unknown products never reach the lock registry; `apply_deltas`
        // re-checks existence inside its own transaction.
        self.get_product(cmd.product_id).await?;
        let _guard = self.locks.lock(cmd.product_id).await;

        let overlapping = self.store.fetch_overlapping(cmd.product_id, range).await?;
        let deltas = reconcile(&range, &overlapping);
        let interval = PriceInterval::new(PriceIntervalId::new(), cmd.product_id, range, price);

        self.store
            .apply_deltas(cmd.product_id, &deltas, &interval)
            .await?;

        tracing::info!(
            product_id = %cmd.product_id,
            interval_id = %interval.id_typed(),
            range = %range,
            price = %price,
            deleted = deltas.deletions.len(),
            updated = deltas.updates.len(),
            inserted = deltas.insertions.len(),
            "price interval stored"
        );
        Ok(interval)
    }

    /// Days-weighted average price of a product over `[start_date, end_date]`.
    pub async fn price_stats(
        &self,
        product_id: ProductId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceStats, PricingError> {
        let range = DateRange::new(start_date, end_date)?;
        self.get_product(product_id).await?;

        let overlapping = self.store.fetch_overlapping(product_id, range).await?;
        let stats = weighted_average(&range, &overlapping);

        tracing::debug!(
            product_id = %product_id,
            range = %range,
            candidates = overlapping.len(),
            days = stats.days,
            price = %stats.price,
            "price stats computed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPriceStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn service() -> PricingService {
        PricingService::new(Arc::new(InMemoryPriceStore::new()))
    }

    #[tokio::test]
    async fn set_price_rejects_inverted_range_before_storage() {
        let svc = service();
        let err = svc
            .set_price(SetPrice {
                // Unknown product: the range check must fire first.
                product_id: ProductId::new(),
                start_date: date(2024, 2, 1),
                end_date: Some(date(2024, 1, 1)),
                price: Decimal::from(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn set_price_rejects_negative_price() {
        let svc = service();
        let product = svc.create_product("Widget").await.unwrap();
        let err = svc
            .set_price(SetPrice {
                product_id: product.id_typed(),
                start_date: date(2024, 1, 1),
                end_date: None,
                price: Decimal::new(-5, 1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::InvalidPrice(_)));
    }

    #[tokio::test]
    async fn set_price_for_unknown_product_is_not_found() {
        let svc = service();
        let err = svc
            .set_price(SetPrice {
                product_id: ProductId::new(),
                start_date: date(2024, 1, 1),
                end_date: None,
                price: Decimal::from(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::NotFound(_)));
    }

    #[tokio::test]
    async fn unknown_products_leave_no_lock_entries() {
        let svc = service();
        for _ in 0..1000 {
            let err = svc
                .set_price(SetPrice {
                    product_id: ProductId::new(),
                    start_date: date(2024, 1, 1),
                    end_date: None,
                    price: Decimal::from(1),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, PricingError::NotFound(_)));
        }
        assert_eq!(svc.locks.len(), 0);
    }

    #[tokio::test]
    async fn lock_entry_is_evicted_after_successful_writes() {
        let svc = service();
        let product = svc.create_product("Widget").await.unwrap();
        for day in 1..=5 {
            svc.set_price(SetPrice {
                product_id: product.id_typed(),
                start_date: date(2024, 1, day),
                end_date: None,
                price: Decimal::from(day),
            })
            .await
            .unwrap();
        }
        assert_eq!(svc.locks.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn contended_lock_is_evicted_once_all_writers_finish() {
        let svc = Arc::new(service());
        let product = svc.create_product("Widget").await.unwrap().id_typed();

        let mut handles = Vec::new();
        for n in 0..16u32 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.set_price(SetPrice {
                    product_id: product,
                    start_date: date(2024, 1, 1 + n),
                    end_date: Some(date(2024, 2, 1 + n)),
                    price: Decimal::from(n),
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(svc.locks.len(), 0);
    }

    #[tokio::test]
    async fn create_product_rejects_blank_name() {
        let err = service().create_product("  ").await.unwrap_err();
        assert!(matches!(err, PricingError::Validation(_)));
    }

    #[tokio::test]
    async fn stats_for_unknown_product_is_not_found() {
        let err = service()
            .price_stats(ProductId::new(), date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap_err();
        assert!(matches!(err, PricingError::NotFound(_)));
    }

    #[test]
    fn store_errors_map_to_pricing_errors() {
        assert_eq!(
            PricingError::from(StoreError::Persistence("disk".into())),
            PricingError::PersistenceFailure("disk".into())
        );
        assert_eq!(
            PricingError::from(StoreError::Conflict("raced".into())),
            PricingError::Conflict("raced".into())
        );
    }
}
