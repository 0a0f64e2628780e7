//! Value object trait: equality by value, not identity.
//!
//! Value objects have **no identity**; they are defined entirely by their
//! attribute values. Two date ranges covering the same days are the same range.

/// Marker trait for value objects.
///
/// ## Value Object vs Entity
///
/// - **Value Object**: `DateRange { start, end }`, `Price(12.50)`
/// - **Entity**: `PriceInterval { id, .. }` (same id = same interval, even after its range shrinks)
///
/// Value objects are immutable. To "modify" one, build a new one; constructors
/// are where validation happens, so an existing value is always valid.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
