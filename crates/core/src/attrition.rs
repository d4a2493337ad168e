//! Attrition risk scoring from period-over-period purchasing deltas.
//!
//! The score blends four components, recency weighted most heavily: a
//! customer who has simply stopped ordering is a louder signal than one whose
//! order values are slipping. Entities with no prior-period activity have no
//! baseline to decline from and are never scored as declining; the behavior
//! classifier picks them up as new accounts instead.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::facts::{EntityId, EntityPeriodFacts};
use crate::errors::DomainError;

/// Score at or above which the entity is at risk (or churned).
const AT_RISK_SCORE: u8 = 80;
/// Score at or above which the entity is declining.
const DECLINING_SCORE: u8 = 50;

/// Weights for the attrition components. Must sum to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttritionWeights {
    pub recency: f64,
    pub monetary: f64,
    pub frequency: f64,
    pub category: f64,
}

impl Default for AttritionWeights {
    fn default() -> Self {
        Self { recency: 0.40, monetary: 0.30, frequency: 0.20, category: 0.10 }
    }
}

impl AttritionWeights {
    pub fn validate(&self) -> Result<(), DomainError> {
        let sum = self.recency + self.monetary + self.frequency + self.category;
        if !sum.is_finite() {
            return Err(DomainError::NonFiniteMetric { field: "attrition weights" });
        }
        if (sum - 1.0).abs() > 1e-6 {
            return Err(DomainError::InvariantViolation(format!(
                "attrition weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttritionStatus {
    Active,
    Declining,
    AtRisk,
    Churned,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttritionScore {
    pub entity_id: EntityId,
    pub score: u8,
    pub status: AttritionStatus,
    /// Days since the most recent order across both windows. For entities
    /// with no orders at all this is measured from the prior window start.
    pub recency_days: u32,
    pub frequency_change_pct: Option<f64>,
    pub monetary_change_pct: Option<f64>,
    pub revenue_at_risk: Decimal,
}

#[derive(Clone, Debug, Default)]
pub struct AttritionAnalyzer {
    weights: AttritionWeights,
}

impl AttritionAnalyzer {
    pub fn new(weights: AttritionWeights) -> Self {
        Self { weights }
    }

    pub fn analyze(&self, facts: &EntityPeriodFacts, as_of: NaiveDate) -> AttritionScore {
        let window_days = facts.current_window.len_days().max(1);
        let recency_days = facts
            .recency_days(as_of)
            .unwrap_or_else(|| {
                as_of.signed_duration_since(facts.prior_window.start).num_days().max(0)
            })
            .max(0) as u32;

        let recency_component =
            ((f64::from(recency_days) / window_days as f64).clamp(0.0, 1.0) * 100.0).round();

        if !facts.has_prior_baseline() {
            // New entity: only staleness can count against it, and never
            // enough to cross the declining threshold.
            let score = (recency_component as u8).min(DECLINING_SCORE - 1);
            return AttritionScore {
                entity_id: facts.id.clone(),
                score,
                status: AttritionStatus::Active,
                recency_days,
                frequency_change_pct: None,
                monetary_change_pct: None,
                revenue_at_risk: Decimal::ZERO,
            };
        }

        let monetary_change_pct = facts.revenue_change_pct();
        let frequency_change_pct = facts.order_count_change_pct();

        let monetary_component = decline_component(monetary_change_pct);
        let frequency_component = decline_component(frequency_change_pct);
        let category_component = category_contraction(facts);

        let score = (recency_component * self.weights.recency
            + monetary_component * self.weights.monetary
            + frequency_component * self.weights.frequency
            + category_component * self.weights.category)
            .round()
            .clamp(0.0, 100.0) as u8;

        let status = if score >= AT_RISK_SCORE {
            if i64::from(recency_days) > window_days && facts.current.order_dates.is_empty() {
                AttritionStatus::Churned
            } else {
                AttritionStatus::AtRisk
            }
        } else if score >= DECLINING_SCORE {
            AttritionStatus::Declining
        } else {
            AttritionStatus::Active
        };

        let revenue_at_risk = match status {
            AttritionStatus::Active => Decimal::ZERO,
            _ => facts.prior.revenue,
        };

        AttritionScore {
            entity_id: facts.id.clone(),
            score,
            status,
            recency_days,
            frequency_change_pct,
            monetary_change_pct,
            revenue_at_risk,
        }
    }
}

/// Map a period-over-period change onto [0, 100]: no decline scores 0, a
/// full -100% scores 100.
fn decline_component(change_pct: Option<f64>) -> f64 {
    match change_pct {
        Some(change) if change < 0.0 => (-change).clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Share of prior-period categories no longer purchased, on [0, 100].
fn category_contraction(facts: &EntityPeriodFacts) -> f64 {
    let prior = facts.prior.categories();
    if prior.is_empty() {
        return 0.0;
    }
    let current = facts.current.categories();
    let lost = prior.difference(&current).count();
    lost as f64 / prior.len() as f64 * 100.0
}
