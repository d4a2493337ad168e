//! Types for the cross-sell engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::facts::EntityId;

/// One entry of the static co-occurrence rule table. Supplied as data so the
/// category taxonomy can be revised without touching the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSellRule {
    pub when_buying: String,
    pub suggest: String,
    #[serde(default)]
    pub because: String,
    /// Scales the revenue-fraction estimate for this rule.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSellSettings {
    pub adoption_threshold: f64,
    pub opportunity_fraction: f64,
    pub max_opportunities: usize,
}

impl Default for CrossSellSettings {
    fn default() -> Self {
        Self {
            adoption_threshold: super::DEFAULT_ADOPTION_THRESHOLD,
            opportunity_fraction: super::DEFAULT_OPPORTUNITY_FRACTION,
            max_opportunities: super::DEFAULT_MAX_OPPORTUNITIES,
        }
    }
}

/// One proposed category for one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrossSellOpportunity {
    pub entity_id: EntityId,
    pub current_categories: Vec<String>,
    pub recommended_category: String,
    pub estimated_revenue: Decimal,
    pub reasons: Vec<String>,
}
