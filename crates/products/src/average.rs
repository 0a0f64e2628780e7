//! Days-weighted average price over a query range.

use rust_decimal::Decimal;

use crate::interval::{DateRange, PriceInterval};

/// Result of a price query.
///
/// `days` is the length of the whole query window, covered or not; `price` is
/// averaged over covered days only. Both are zero when nothing covers the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceStats {
    pub days: i64,
    pub price: Decimal,
}

impl PriceStats {
    pub fn empty() -> Self {
        Self {
            days: 0,
            price: Decimal::ZERO,
        }
    }
}

/// Weight each interval's price by the number of days it shares with `range`.
pub fn weighted_average(range: &DateRange, overlapping: &[PriceInterval]) -> PriceStats {
    let mut total_price = Decimal::ZERO;
    let mut total_days: i64 = 0;

    for interval in overlapping {
        let Some(shared) = interval.range().intersection(range) else {
            continue;
        };
        let days = shared.days();
        // At most `Price::MAX` times the days in the whole calendar.
        total_price += interval.price().amount() * Decimal::from(days);
        total_days += days;
    }

    if total_days == 0 {
        return PriceStats::empty();
    }

    PriceStats {
        days: range.days(),
        price: total_price / Decimal::from(total_days),
    }
}
