//! Input contract for the scoring engine.
//!
//! A fact provider aggregates raw transaction rows into one
//! [`EntityPeriodFacts`] per entity covering two comparison windows. The
//! engine never fetches or persists anything; everything downstream is a pure
//! function over these records.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

/// Half-open calendar window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if start >= end {
            return Err(DomainError::InvariantViolation(format!(
                "window start {start} is not before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn len_days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Number of whole-or-partial calendar months the window spans.
    pub fn month_span(&self) -> u32 {
        use chrono::Datelike;
        let months = (self.end.year() - self.start.year()) * 12
            + (self.end.month() as i32 - self.start.month() as i32);
        // An end mid-month still counts that month.
        let extra = u32::from(self.end.day() > 1 || months == 0);
        months.max(0) as u32 + extra
    }
}

/// Aggregates for one entity over one window.
///
/// Missing numeric fields deserialize to zero and missing collections to
/// empty, so a single malformed record degrades its own scores instead of
/// aborting the batch. Structural problems (inverted windows, NaN metrics)
/// are caught by [`EntityPeriodFacts::validate`] instead.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodFacts {
    #[serde(default)]
    pub revenue: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    #[serde(default)]
    pub gross_profit: Decimal,
    #[serde(default)]
    pub unit_count: u32,
    /// Revenue attributed to each product category. Keys double as the
    /// entity's category set.
    #[serde(default)]
    pub category_revenue: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub order_dates: BTreeSet<NaiveDate>,
}

impl PeriodFacts {
    pub fn categories(&self) -> BTreeSet<&str> {
        self.category_revenue.keys().map(String::as_str).collect()
    }

    pub fn category_count(&self) -> usize {
        self.category_revenue.len()
    }

    pub fn order_count(&self) -> usize {
        self.order_dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revenue.is_zero() && self.order_dates.is_empty()
    }

    pub fn first_order(&self) -> Option<NaiveDate> {
        self.order_dates.iter().next().copied()
    }

    pub fn last_order(&self) -> Option<NaiveDate> {
        self.order_dates.iter().next_back().copied()
    }

    /// Gross margin as a percentage of revenue. Zero when there is no revenue.
    pub fn margin_pct(&self) -> f64 {
        if self.revenue <= Decimal::ZERO {
            return 0.0;
        }
        decimal_to_f64(self.gross_profit) / decimal_to_f64(self.revenue) * 100.0
    }

    /// Mean revenue per order. `None` when there are no orders.
    pub fn average_order_value(&self) -> Option<f64> {
        if self.order_dates.is_empty() {
            return None;
        }
        Some(decimal_to_f64(self.revenue) / self.order_dates.len() as f64)
    }
}

/// One entity's facts for the current window and the prior comparable window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityPeriodFacts {
    pub id: EntityId,
    pub name: String,
    pub current_window: PeriodWindow,
    pub prior_window: PeriodWindow,
    pub current: PeriodFacts,
    pub prior: PeriodFacts,
}

impl EntityPeriodFacts {
    /// Check the window invariant: equal length, non-overlapping, prior
    /// before current. Records arriving through serde bypass constructors,
    /// so the pipeline validates each entity before scoring it.
    pub fn validate(&self) -> Result<(), DomainError> {
        let invalid = |detail: String| DomainError::InvalidWindows {
            entity: self.id.0.clone(),
            detail,
        };
        if self.current_window.start >= self.current_window.end
            || self.prior_window.start >= self.prior_window.end
        {
            return Err(invalid("window start is not before window end".to_owned()));
        }
        if self.prior_window.end > self.current_window.start {
            return Err(invalid(format!(
                "prior window ending {} overlaps current window starting {}",
                self.prior_window.end, self.current_window.start
            )));
        }
        if self.current_window.len_days() != self.prior_window.len_days() {
            return Err(invalid(format!(
                "current window spans {} days but prior spans {}",
                self.current_window.len_days(),
                self.prior_window.len_days()
            )));
        }
        Ok(())
    }

    pub fn total_order_count(&self) -> usize {
        self.current.order_count() + self.prior.order_count()
    }

    pub fn first_order(&self) -> Option<NaiveDate> {
        match (self.prior.first_order(), self.current.first_order()) {
            (Some(p), Some(c)) => Some(p.min(c)),
            (p, c) => p.or(c),
        }
    }

    pub fn last_order(&self) -> Option<NaiveDate> {
        match (self.prior.last_order(), self.current.last_order()) {
            (Some(p), Some(c)) => Some(p.max(c)),
            (p, c) => p.or(c),
        }
    }

    /// Days since the most recent order across both windows, relative to
    /// `as_of`. `None` when the entity has never ordered.
    pub fn recency_days(&self, as_of: NaiveDate) -> Option<i64> {
        self.last_order()
            .map(|last| as_of.signed_duration_since(last).num_days().max(0))
    }

    /// Period-over-period revenue change. `None` without a prior baseline.
    pub fn revenue_change_pct(&self) -> Option<f64> {
        if self.prior.revenue <= Decimal::ZERO {
            return None;
        }
        let prior = decimal_to_f64(self.prior.revenue);
        let current = decimal_to_f64(self.current.revenue);
        Some((current - prior) / prior * 100.0)
    }

    /// Period-over-period order-count change. `None` without prior orders.
    pub fn order_count_change_pct(&self) -> Option<f64> {
        if self.prior.order_dates.is_empty() {
            return None;
        }
        let prior = self.prior.order_count() as f64;
        let current = self.current.order_count() as f64;
        Some((current - prior) / prior * 100.0)
    }

    /// Whether there is any prior-period activity to decline from.
    pub fn has_prior_baseline(&self) -> bool {
        self.prior.revenue > Decimal::ZERO || !self.prior.order_dates.is_empty()
    }
}

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::{EntityId, EntityPeriodFacts, PeriodFacts, PeriodWindow};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn facts_fixture() -> EntityPeriodFacts {
        EntityPeriodFacts {
            id: EntityId("acct-1".to_owned()),
            name: "Harborview Utilities".to_owned(),
            current_window: PeriodWindow { start: date(2025, 1, 1), end: date(2026, 1, 1) },
            prior_window: PeriodWindow { start: date(2024, 1, 1), end: date(2025, 1, 1) },
            current: PeriodFacts {
                revenue: Decimal::new(48_000, 0),
                gross_profit: Decimal::new(12_000, 0),
                order_dates: [date(2025, 3, 10), date(2025, 9, 2)].into_iter().collect(),
                category_revenue: BTreeMap::from([
                    ("meters".to_owned(), Decimal::new(30_000, 0)),
                    ("chemicals".to_owned(), Decimal::new(18_000, 0)),
                ]),
                ..PeriodFacts::default()
            },
            prior: PeriodFacts {
                revenue: Decimal::new(40_000, 0),
                order_dates: [date(2024, 4, 1)].into_iter().collect(),
                ..PeriodFacts::default()
            },
        }
    }

    #[test]
    fn valid_windows_pass_validation() {
        assert!(facts_fixture().validate().is_ok());
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let mut facts = facts_fixture();
        facts.prior_window = PeriodWindow { start: date(2024, 6, 1), end: date(2025, 6, 1) };
        let error = facts.validate().unwrap_err();
        assert!(error.to_string().contains("overlaps"));
    }

    #[test]
    fn unequal_windows_are_rejected() {
        let mut facts = facts_fixture();
        facts.prior_window = PeriodWindow { start: date(2024, 7, 1), end: date(2025, 1, 1) };
        assert!(facts.validate().is_err());
    }

    #[test]
    fn recency_spans_both_windows() {
        let facts = facts_fixture();
        assert_eq!(facts.recency_days(date(2025, 9, 12)), Some(10));
        assert_eq!(facts.last_order(), Some(date(2025, 9, 2)));
    }

    #[test]
    fn revenue_change_requires_prior_baseline() {
        let mut facts = facts_fixture();
        assert_eq!(facts.revenue_change_pct(), Some(20.0));

        facts.prior.revenue = Decimal::ZERO;
        facts.prior.order_dates.clear();
        assert_eq!(facts.revenue_change_pct(), None);
        assert!(!facts.has_prior_baseline());
    }

    #[test]
    fn margin_pct_is_zero_without_revenue() {
        let facts = PeriodFacts::default();
        assert_eq!(facts.margin_pct(), 0.0);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let parsed: PeriodFacts = serde_json::from_str(r#"{ "revenue": "1200" }"#).unwrap();
        assert_eq!(parsed.revenue, Decimal::new(1200, 0));
        assert_eq!(parsed.order_count(), 0);
        assert_eq!(parsed.category_count(), 0);
    }
}
