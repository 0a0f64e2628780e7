//! Interval reconciliation: keep a product's price intervals disjoint when a new
//! interval is inserted.
//!
//! Given the new range and every existing interval that overlaps it, each
//! existing interval falls into exactly one [`OverlapPattern`]. Each pattern
//! proposes boundary changes; [`normalize`] then turns the proposals into a
//! [`Reconciliation`] (deletions, updates, insertions), dropping anything that
//! would collapse to zero days.
//!
//! Applying the reconciliation and then inserting the new interval leaves the
//! product's intervals pairwise disjoint, with every day outside the new range
//! priced exactly as before. Callers must apply it atomically and serialize
//! fetch-reconcile-apply per product.

use chrono::NaiveDate;

use pricebook_core::{DomainError, DomainResult, PriceIntervalId, ProductId};

use crate::interval::{DateRange, NewPriceInterval, Price, PriceInterval};

/// Position of an existing interval `I` relative to the new interval `N`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OverlapPattern {
    /// `I.start < N.start <= I.end <= N.end`: `I` loses its tail.
    LeftOverlap,
    /// `I.start < N.start && I.end > N.end`: `I` is split around `N`.
    Encloses,
    /// `N.start <= I.start <= N.end < I.end`: `I` loses its head.
    RightOverlap,
    /// `N.start <= I.start && I.end <= N.end`: `I` disappears.
    Contained,
}

impl OverlapPattern {
    /// All patterns in classification priority order.
    pub const ALL: [OverlapPattern; 4] = [
        OverlapPattern::LeftOverlap,
        OverlapPattern::Encloses,
        OverlapPattern::RightOverlap,
        OverlapPattern::Contained,
    ];

    /// Whether this pattern's guard holds for `existing` against `new`.
    pub fn matches(self, existing: &DateRange, new: &DateRange) -> bool {
        let (s, e) = (existing.start(), existing.end());
        let (ns, ne) = (new.start(), new.end());
        match self {
            OverlapPattern::LeftOverlap => s < ns && ns <= e && e <= ne,
            OverlapPattern::Encloses => s < ns && e > ne,
            OverlapPattern::RightOverlap => ns <= s && s <= ne && ne < e,
            OverlapPattern::Contained => ns <= s && e <= ne,
        }
    }

    /// First matching pattern, or `None` when the ranges share no day.
    pub fn classify(existing: &DateRange, new: &DateRange) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.matches(existing, new))
    }
}

/// New boundaries for a surviving interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalUpdate {
    pub id: PriceIntervalId,
    pub range: DateRange,
}

/// Delta set produced by [`reconcile`]; apply all of it or none of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub deletions: Vec<PriceIntervalId>,
    pub updates: Vec<IntervalUpdate>,
    pub insertions: Vec<NewPriceInterval>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.updates.is_empty() && self.insertions.is_empty()
    }

    /// Ids of existing intervals this delta set deletes or rewrites.
    pub fn touched_ids(&self) -> impl Iterator<Item = PriceIntervalId> + '_ {
        self.deletions
            .iter()
            .copied()
            .chain(self.updates.iter().map(|u| u.id))
    }

    /// Apply the delta set to `product_id`'s intervals in an in-memory
    /// collection.
    ///
    /// Fails without touching `intervals` if any deleted or updated id is
    /// missing or belongs to another product. Inserted fragments get fresh
    /// identifiers from `next_id`.
    pub fn apply_to(
        &self,
        product_id: ProductId,
        intervals: &mut Vec<PriceInterval>,
        mut next_id: impl FnMut() -> PriceIntervalId,
    ) -> DomainResult<()> {
        let owned = |i: &PriceInterval, id: PriceIntervalId| {
            i.product_id() == product_id && i.id_typed() == id
        };
        for id in self.touched_ids() {
            if !intervals.iter().any(|i| owned(i, id)) {
                return Err(DomainError::invariant(format!(
                    "price interval {id} is no longer present for product {product_id}"
                )));
            }
        }

        intervals.retain(|i| !self.deletions.iter().any(|id| owned(i, *id)));
        for update in &self.updates {
            if let Some(slot) = intervals.iter_mut().find(|i| owned(i, update.id)) {
                *slot = slot.with_range(update.range);
            }
        }
        for insertion in &self.insertions {
            intervals.push(insertion.clone().into_interval(next_id()));
        }
        Ok(())
    }
}

/// Raw boundary change proposed by one pattern, before degenerate ranges are
/// filtered out.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Proposal {
    Delete(PriceIntervalId),
    Update {
        id: PriceIntervalId,
        start: NaiveDate,
        end: NaiveDate,
    },
    Insert {
        product_id: ProductId,
        start: NaiveDate,
        end: NaiveDate,
        price: Price,
    },
}

/// Compute the deltas that make room for `new_range` among `overlapping`.
///
/// `overlapping` is expected to be the selector's result for the same product
/// and range. Candidates that do not actually share a day with `new_range` are
/// left untouched.
pub fn reconcile(new_range: &DateRange, overlapping: &[PriceInterval]) -> Reconciliation {
    let proposals = overlapping
        .iter()
        .flat_map(|existing| propose(existing, new_range));
    normalize(proposals)
}

fn propose(existing: &PriceInterval, new: &DateRange) -> Vec<Proposal> {
    let id = existing.id_typed();
    let Some(pattern) = OverlapPattern::classify(&existing.range(), new) else {
        return Vec::new();
    };

    match pattern {
        OverlapPattern::LeftOverlap => vec![Proposal::Update {
            id,
            start: existing.start_date(),
            end: day_before(new.start()),
        }],
        OverlapPattern::Encloses => vec![
            Proposal::Update {
                id,
                start: existing.start_date(),
                end: day_before(new.start()),
            },
            Proposal::Insert {
                product_id: existing.product_id(),
                start: day_after(new.end()),
                end: existing.end_date(),
                price: existing.price(),
            },
        ],
        OverlapPattern::RightOverlap => vec![Proposal::Update {
            id,
            start: day_after(new.end()),
            end: existing.end_date(),
        }],
        OverlapPattern::Contained => vec![Proposal::Delete(id)],
    }
}

/// Turn proposals into a delta set: an update whose range collapsed becomes a
/// deletion, an insertion whose range collapsed is dropped.
fn normalize(proposals: impl IntoIterator<Item = Proposal>) -> Reconciliation {
    let mut out = Reconciliation::default();
    for proposal in proposals {
        match proposal {
            Proposal::Delete(id) => out.deletions.push(id),
            Proposal::Update { id, start, end } => match DateRange::new(start, end) {
                Ok(range) => out.updates.push(IntervalUpdate { id, range }),
                Err(_) => out.deletions.push(id),
            },
            Proposal::Insert {
                product_id,
                start,
                end,
                price,
            } => {
                if let Ok(range) = DateRange::new(start, end) {
                    out.insertions.push(NewPriceInterval::new(product_id, range, price));
                }
            }
        }
    }
    out
}

// Both helpers are only called with a date that is strictly greater (resp.
// smaller) than another valid date, so the calendar bound is never hit.
fn day_before(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(NaiveDate::MIN)
}

fn day_after(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(NaiveDate::MAX)
}
