//! Price intervals and the closed-range arithmetic they rely on.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use pricebook_core::{DomainError, DomainResult, Entity, PriceIntervalId, ProductId, ValueObject};

/// End date standing in for "no end": `9999-12-31`.
///
/// Open-ended intervals are stored with this date instead of a null so every
/// comparison and subtraction stays total.
pub fn far_future() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Closed calendar range `[start, end]`, both ends inclusive, `start <= end`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl ValueObject for DateRange {}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::invalid_range(start, end));
        }
        Ok(Self { start, end })
    }

    /// `[start, far_future()]`.
    pub fn open_ended(start: NaiveDate) -> DomainResult<Self> {
        Self::new(start, far_future())
    }

    /// Build a range from an optional end date; `None` means open-ended.
    pub fn from_optional_end(start: NaiveDate, end: Option<NaiveDate>) -> DomainResult<Self> {
        match end {
            Some(end) => Self::new(start, end),
            None => Self::open_ended(start),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn is_open_ended(&self) -> bool {
        self.end == far_future()
    }

    /// Number of days covered, counting both ends (always >= 1).
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Closed-interval overlap test: the ranges share at least one day.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    pub fn intersection(&self, other: &DateRange) -> Option<DateRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(DateRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }
}

impl core::fmt::Display for DateRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Non-negative price per day, at most [`Price::MAX`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl ValueObject for Price {}

impl Price {
    /// Largest accepted amount (10^15).
    ///
    /// Keeps `price * days` summed over the whole `NaiveDate` range (under
    /// 10^9 days) far inside `Decimal`'s range, so averaging never overflows. The
    /// `price_intervals_price` check constraint enforces the same cap.
    pub const MAX: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_zero() {
            // `-0` would otherwise keep its sign all the way to the JSON output.
            return Ok(Self(Decimal::ZERO));
        }
        if amount.is_sign_negative() {
            return Err(DomainError::invalid_price(format!(
                "price must be non-negative (got {amount})"
            )));
        }
        if amount > Self::MAX {
            return Err(DomainError::invalid_price(format!(
                "price must not exceed {} (got {amount})",
                Self::MAX
            )));
        }
        Ok(Self(amount))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A product's price over a closed date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceInterval {
    id: PriceIntervalId,
    product_id: ProductId,
    range: DateRange,
    price: Price,
}

impl PriceInterval {
    pub fn new(id: PriceIntervalId, product_id: ProductId, range: DateRange, price: Price) -> Self {
        Self {
            id,
            product_id,
            range,
            price,
        }
    }

    pub fn id_typed(&self) -> PriceIntervalId {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn start_date(&self) -> NaiveDate {
        self.range.start
    }

    pub fn end_date(&self) -> NaiveDate {
        self.range.end
    }

    pub fn price(&self) -> Price {
        self.price
    }

    /// Same interval (same identity and price) over a different range.
    pub fn with_range(&self, range: DateRange) -> Self {
        Self { range, ..self.clone() }
    }
}

impl Entity for PriceInterval {
    type Id = PriceIntervalId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An interval that has not been persisted yet (no identifier assigned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPriceInterval {
    pub product_id: ProductId,
    pub range: DateRange,
    pub price: Price,
}

impl NewPriceInterval {
    pub fn new(product_id: ProductId, range: DateRange, price: Price) -> Self {
        Self {
            product_id,
            range,
            price,
        }
    }

    pub fn into_interval(self, id: PriceIntervalId) -> PriceInterval {
        PriceInterval::new(id, self.product_id, self.range, self.price)
    }
}

/// Every interval of `product_id` sharing at least one day with `range`,
/// ordered by start date.
///
/// Storage adapters that cannot run this filter in memory must encode the same
/// predicate: `start_date <= range.end AND end_date >= range.start`.
pub fn select_overlapping<'a, I>(
    intervals: I,
    product_id: ProductId,
    range: &DateRange,
) -> Vec<PriceInterval>
where
    I: IntoIterator<Item = &'a PriceInterval>,
{
    let mut selected: Vec<PriceInterval> = intervals
        .into_iter()
        .filter(|i| i.product_id == product_id && i.range.overlaps(range))
        .cloned()
        .collect();
    selected.sort_by_key(|i| (i.start_date(), i.id));
    selected
}
