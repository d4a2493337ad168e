//! Composite account health scoring.
//!
//! Four weighted components, each 0-100: peer percentile of revenue, an
//! engagement step function over ordering cadence, a margin step function
//! against the peer average, and peer percentile of category breadth. Risk
//! flags are appended for the reviewer but never move the numeric score.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::facts::{decimal_to_f64, EntityId, EntityPeriodFacts, PeriodFacts};
use crate::errors::DomainError;
use crate::percentile::percentile_rank;

/// Revenue decline beyond which the "Declining revenue" flag is raised.
const DECLINING_REVENUE_PCT: f64 = -15.0;
/// Average order gap beyond which purchase frequency is flagged.
const LOW_FREQUENCY_GAP_DAYS: f64 = 60.0;
/// Margin gap to peers beyond which margin pressure is flagged.
const MARGIN_PRESSURE_GAP_PP: f64 = -10.0;
/// Days without a purchase before the entity is flagged inactive.
const INACTIVE_AFTER_DAYS: i64 = 90;

/// Weights for the four health components. Must sum to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthWeights {
    pub revenue: f64,
    pub engagement: f64,
    pub margin: f64,
    pub category: f64,
}

impl Default for HealthWeights {
    fn default() -> Self {
        Self { revenue: 0.35, engagement: 0.25, margin: 0.20, category: 0.20 }
    }
}

impl HealthWeights {
    pub fn validate(&self) -> Result<(), DomainError> {
        let sum = self.revenue + self.engagement + self.margin + self.category;
        if !sum.is_finite() {
            return Err(DomainError::NonFiniteMetric { field: "health weights" });
        }
        if (sum - 1.0).abs() > 1e-6 {
            return Err(DomainError::InvariantViolation(format!(
                "health weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthTier {
    /// Tier is a pure function of the overall score; no risk flag can
    /// override it.
    pub fn from_overall(overall: u8) -> Self {
        match overall {
            80..=u8::MAX => Self::Excellent,
            60..=79 => Self::Good,
            40..=59 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthComponents {
    pub revenue: u8,
    pub engagement: u8,
    pub margin: u8,
    pub category: u8,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthScore {
    pub entity_id: EntityId,
    pub overall: u8,
    pub tier: HealthTier,
    pub components: HealthComponents,
    pub risk_flags: Vec<String>,
}

/// Peer-population metrics shared by every entity scored in one run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeerSnapshot {
    pub revenues: Vec<f64>,
    pub category_counts: Vec<f64>,
    pub margin_pcts: Vec<f64>,
    pub order_values: Vec<f64>,
}

impl PeerSnapshot {
    pub fn from_entities(entities: &[EntityPeriodFacts]) -> Self {
        let mut snapshot = Self::default();
        for entity in entities {
            snapshot.revenues.push(decimal_to_f64(entity.current.revenue));
            snapshot.category_counts.push(entity.current.category_count() as f64);
            if entity.current.revenue > rust_decimal::Decimal::ZERO {
                snapshot.margin_pcts.push(entity.current.margin_pct());
            }
            if let Some(value) = entity.current.average_order_value() {
                snapshot.order_values.push(value);
            }
        }
        snapshot
    }

    pub fn average_margin_pct(&self) -> Option<f64> {
        if self.margin_pcts.is_empty() {
            return None;
        }
        Some(self.margin_pcts.iter().sum::<f64>() / self.margin_pcts.len() as f64)
    }

    pub fn median_order_value(&self) -> Option<f64> {
        crate::percentile::median(&self.order_values)
    }
}

/// Stateless health scorer; weights are provided at construction.
#[derive(Clone, Debug, Default)]
pub struct HealthScorer {
    weights: HealthWeights,
}

impl HealthScorer {
    pub fn new(weights: HealthWeights) -> Self {
        Self { weights }
    }

    pub fn score(
        &self,
        facts: &EntityPeriodFacts,
        peers: &PeerSnapshot,
        as_of: NaiveDate,
    ) -> HealthScore {
        let revenue = percentile_rank(decimal_to_f64(facts.current.revenue), &peers.revenues);
        let avg_gap = average_order_gap_days(&facts.current);
        let engagement = engagement_step(avg_gap);

        let margin_gap = peers
            .average_margin_pct()
            .map(|peer_avg| facts.current.margin_pct() - peer_avg);
        let margin = margin_step(margin_gap);

        let category =
            percentile_rank(facts.current.category_count() as f64, &peers.category_counts);

        let overall = (f64::from(revenue) * self.weights.revenue
            + f64::from(engagement) * self.weights.engagement
            + f64::from(margin) * self.weights.margin
            + f64::from(category) * self.weights.category)
            .round() as u8;

        let components = HealthComponents { revenue, engagement, margin, category };
        let risk_flags = collect_risk_flags(facts, avg_gap, margin_gap, as_of);

        HealthScore {
            entity_id: facts.id.clone(),
            overall,
            tier: HealthTier::from_overall(overall),
            components,
            risk_flags,
        }
    }
}

/// Mean gap in days between consecutive orders in the window. `None` with
/// fewer than two orders (no measurable cadence).
fn average_order_gap_days(facts: &PeriodFacts) -> Option<f64> {
    if facts.order_dates.len() < 2 {
        return None;
    }
    let dates: Vec<NaiveDate> = facts.order_dates.iter().copied().collect();
    let total_gap: i64 = dates
        .windows(2)
        .map(|pair| pair[1].signed_duration_since(pair[0]).num_days())
        .sum();
    Some(total_gap as f64 / (dates.len() - 1) as f64)
}

fn engagement_step(avg_gap_days: Option<f64>) -> u8 {
    match avg_gap_days {
        Some(gap) if gap <= 7.0 => 100,
        Some(gap) if gap <= 14.0 => 80,
        Some(gap) if gap <= 30.0 => 60,
        Some(gap) if gap <= 60.0 => 40,
        _ => 20,
    }
}

fn margin_step(gap_pp: Option<f64>) -> u8 {
    match gap_pp {
        Some(gap) if gap >= 5.0 => 100,
        Some(gap) if gap >= 0.0 => 80,
        Some(gap) if gap >= -5.0 => 60,
        Some(gap) if gap >= -10.0 => 40,
        Some(_) => 20,
        // No peers with revenue: nothing to be behind.
        None => 80,
    }
}

fn collect_risk_flags(
    facts: &EntityPeriodFacts,
    avg_gap: Option<f64>,
    margin_gap: Option<f64>,
    as_of: NaiveDate,
) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(change) = facts.revenue_change_pct() {
        if change < DECLINING_REVENUE_PCT {
            flags.push("Declining revenue".to_owned());
        }
    }
    if matches!(avg_gap, Some(gap) if gap > LOW_FREQUENCY_GAP_DAYS) {
        flags.push("Low purchase frequency".to_owned());
    }
    if matches!(margin_gap, Some(gap) if gap < MARGIN_PRESSURE_GAP_PP) {
        flags.push("Margin pressure".to_owned());
    }
    if let Some(days) = facts.recency_days(as_of) {
        if days > INACTIVE_AFTER_DAYS {
            flags.push(format!("Inactive ({days} days)"));
        }
    }
    flags
}
