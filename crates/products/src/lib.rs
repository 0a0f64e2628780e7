//! Products domain module: catalog entries and their price history.
//!
//! This crate contains the business rules for price intervals, implemented purely
//! as deterministic domain logic (no IO, no HTTP, no storage):
//!
//! - [`interval`]: the `PriceInterval` entity, its `DateRange`/`Price` value
//!   objects and the overlap selector predicate.
//! - [`reconcile`]: turns "insert this interval" into the delta set that keeps a
//!   product's intervals disjoint.
//! - [`average`]: days-weighted average price over a query range.

pub mod average;
pub mod interval;
pub mod product;
pub mod reconcile;

pub use average::{weighted_average, PriceStats};
pub use interval::{
    far_future, select_overlapping, DateRange, NewPriceInterval, Price, PriceInterval,
};
pub use product::Product;
pub use reconcile::{reconcile, IntervalUpdate, OverlapPattern, Reconciliation};

pub use pricebook_core::{PriceIntervalId, ProductId};
