//! Infrastructure layer: storage adapters, configuration, and the pricing
//! service that drives fetch → reconcile → apply.

pub mod config;
pub mod pricing_service;
pub mod store;


pub use config::{Config, ConfigError};
pub use pricing_service::{PricingError, PricingService, SetPrice};
pub use store::{InMemoryPriceStore, PostgresPriceStore, PriceStore, StoreError};
