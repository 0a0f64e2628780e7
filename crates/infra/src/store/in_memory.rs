use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use pricebook_core::{PriceIntervalId, ProductId};
use pricebook_products::{select_overlapping, DateRange, PriceInterval, Product, Reconciliation};

use super::{PriceStore, StoreError};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    intervals: Vec<PriceInterval>,
}

/// In-memory price store for tests/dev.
///
/// A whole delta set is applied to a copy of the interval list and swapped in
/// under one write guard, so readers never observe a half-applied insertion.
#[derive(Debug, Default)]
pub struct InMemoryPriceStore {
    inner: RwLock<State>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Persistence("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn create_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut state = self.inner.write().map_err(|_| poisoned())?;
        let id = product.id_typed();
        if state.products.contains_key(&id) {
            return Err(StoreError::Conflict(format!("product {id} already exists")));
        }
        state.products.insert(id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.inner.read().map_err(|_| poisoned())?;
        Ok(state.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let state = self.inner.read().map_err(|_| poisoned())?;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by_key(|p| (p.created_at(), p.id_typed()));
        Ok(products)
    }

    async fn fetch_overlapping(
        &self,
        product_id: ProductId,
        range: DateRange,
    ) -> Result<Vec<PriceInterval>, StoreError> {
        let state = self.inner.read().map_err(|_| poisoned())?;
        Ok(select_overlapping(&state.intervals, product_id, &range))
    }

    async fn list_intervals(
        &self,
        product_id: Option<ProductId>,
    ) -> Result<Vec<PriceInterval>, StoreError> {
        let state = self.inner.read().map_err(|_| poisoned())?;
        let mut intervals: Vec<PriceInterval> = state
            .intervals
            .iter()
            .filter(|i| product_id.is_none_or(|p| i.product_id() == p))
            .cloned()
            .collect();
        intervals.sort_by_key(|i| (i.product_id(), i.start_date()));
        Ok(intervals)
    }

    async fn apply_deltas(
        &self,
        product_id: ProductId,
        deltas: &Reconciliation,
        new_interval: &PriceInterval,
    ) -> Result<(), StoreError> {
        let mut state = self.inner.write().map_err(|_| poisoned())?;
        if !state.products.contains_key(&product_id) {
            return Err(StoreError::NotFound(format!("product {product_id}")));
        }

        let mut next = state.intervals.clone();
        deltas
            .apply_to(product_id, &mut next, PriceIntervalId::new)
            .map_err(|e| StoreError::Conflict(e.to_string()))?;
        next.push(new_interval.clone());

        let mut owned: Vec<&PriceInterval> =
            next.iter().filter(|i| i.product_id() == product_id).collect();
        owned.sort_by_key(|i| i.start_date());
        if let Some(pair) = owned.windows(2).find(|w| w[0].range().overlaps(&w[1].range())) {
            return Err(StoreError::Conflict(format!(
                "intervals {} and {} would overlap",
                pair[0].range(),
                pair[1].range()
            )));
        }

        state.intervals = next;
        Ok(())
    }
}
