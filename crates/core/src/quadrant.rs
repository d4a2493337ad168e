//! Value-by-health quadrant placement for a sibling set.
//!
//! Deliberately coarser than the strategic cascade: it compares locations
//! under one parent account against each other, not against the global peer
//! population, and answers only "which corner of the 2x2 does each sibling
//! sit in".

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::facts::{decimal_to_f64, EntityId};
use crate::percentile::median;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadrantThresholds {
    /// YoY revenue growth above which a sibling counts as growing.
    pub growth_pct: f64,
    /// Days since last order at or beyond which a sibling is no longer
    /// considered active.
    pub recency_days: u32,
}

impl Default for QuadrantThresholds {
    fn default() -> Self {
        Self { growth_pct: 5.0, recency_days: 90 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    DefendGrow,
    UrgentIntervention,
    NurtureUp,
    OptimizeExit,
}

/// Per-sibling inputs, pre-aggregated by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiblingMetrics {
    pub entity_id: EntityId,
    pub revenue: Decimal,
    /// `None` for siblings with no prior baseline; absence of evidence is
    /// not treated as decline.
    pub yoy_change_pct: Option<f64>,
    pub has_major_risk_flag: bool,
    /// `None` when the sibling has never ordered.
    pub days_since_last_order: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuadrantPlacement {
    pub entity_id: EntityId,
    pub quadrant: Quadrant,
    pub high_value: bool,
    pub healthy: bool,
    pub revenue: Decimal,
    /// The sibling-set median the value split was computed against.
    pub median_revenue: Decimal,
}

#[derive(Clone, Debug, Default)]
pub struct QuadrantMapper {
    thresholds: QuadrantThresholds,
}

impl QuadrantMapper {
    pub fn new(thresholds: QuadrantThresholds) -> Self {
        Self { thresholds }
    }

    pub fn map(&self, siblings: &[SiblingMetrics]) -> Vec<QuadrantPlacement> {
        let revenues: Vec<f64> =
            siblings.iter().map(|sibling| decimal_to_f64(sibling.revenue)).collect();
        let Some(median_revenue) = median(&revenues) else {
            return Vec::new();
        };
        let median_decimal = Decimal::from_f64_retain(median_revenue).unwrap_or_default();

        siblings
            .iter()
            .map(|sibling| {
                let high_value = decimal_to_f64(sibling.revenue) >= median_revenue;
                let growing = sibling
                    .yoy_change_pct
                    .map(|change| change > self.thresholds.growth_pct)
                    .unwrap_or(sibling.revenue > Decimal::ZERO);
                let recent = sibling
                    .days_since_last_order
                    .map(|days| days < self.thresholds.recency_days)
                    .unwrap_or(false);
                let healthy = growing && !sibling.has_major_risk_flag && recent;

                let quadrant = match (high_value, healthy) {
                    (true, true) => Quadrant::DefendGrow,
                    (true, false) => Quadrant::UrgentIntervention,
                    (false, true) => Quadrant::NurtureUp,
                    (false, false) => Quadrant::OptimizeExit,
                };

                QuadrantPlacement {
                    entity_id: sibling.entity_id.clone(),
                    quadrant,
                    high_value,
                    healthy,
                    revenue: sibling.revenue,
                    median_revenue: median_decimal,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::facts::EntityId;

    use super::{Quadrant, QuadrantMapper, SiblingMetrics};

    fn sibling(id: &str, revenue: i64, yoy: Option<f64>, flagged: bool, days: u32) -> SiblingMetrics {
        SiblingMetrics {
            entity_id: EntityId(id.to_owned()),
            revenue: Decimal::new(revenue, 0),
            yoy_change_pct: yoy,
            has_major_risk_flag: flagged,
            days_since_last_order: Some(days),
        }
    }

    #[test]
    fn four_siblings_cover_all_quadrants() {
        let mapper = QuadrantMapper::default();
        let placements = mapper.map(&[
            sibling("flagship", 90_000, Some(12.0), false, 10),
            sibling("slipping", 80_000, Some(-20.0), true, 150),
            sibling("sprout", 10_000, Some(30.0), false, 20),
            sibling("dormant", 5_000, Some(-40.0), false, 200),
        ]);

        let quadrant_of = |id: &str| {
            placements
                .iter()
                .find(|p| p.entity_id.0 == id)
                .map(|p| p.quadrant)
                .unwrap()
        };
        assert_eq!(quadrant_of("flagship"), Quadrant::DefendGrow);
        assert_eq!(quadrant_of("slipping"), Quadrant::UrgentIntervention);
        assert_eq!(quadrant_of("sprout"), Quadrant::NurtureUp);
        assert_eq!(quadrant_of("dormant"), Quadrant::OptimizeExit);
    }

    #[test]
    fn value_split_uses_the_sibling_median() {
        let mapper = QuadrantMapper::default();
        let placements = mapper.map(&[
            sibling("a", 10_000, Some(10.0), false, 5),
            sibling("b", 20_000, Some(10.0), false, 5),
            sibling("c", 30_000, Some(10.0), false, 5),
        ]);

        assert!(placements.iter().find(|p| p.entity_id.0 == "b").unwrap().high_value);
        assert!(!placements.iter().find(|p| p.entity_id.0 == "a").unwrap().high_value);
    }

    #[test]
    fn sibling_without_baseline_is_not_marked_declining() {
        let mapper = QuadrantMapper::default();
        let new_location = SiblingMetrics {
            entity_id: EntityId("new".to_owned()),
            revenue: Decimal::new(50_000, 0),
            yoy_change_pct: None,
            has_major_risk_flag: false,
            days_since_last_order: Some(7),
        };
        let placements = mapper.map(&[new_location, sibling("old", 50_000, Some(0.0), false, 7)]);

        assert!(placements.iter().find(|p| p.entity_id.0 == "new").unwrap().healthy);
        // Flat growth on the sibling with a baseline is below the +5% bar.
        assert!(!placements.iter().find(|p| p.entity_id.0 == "old").unwrap().healthy);
    }

    #[test]
    fn empty_sibling_set_maps_to_nothing() {
        let mapper = QuadrantMapper::default();
        assert!(mapper.map(&[]).is_empty());
    }
}
