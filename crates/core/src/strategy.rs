//! Strategic action bucketing.
//!
//! The cascade is an ordered list of named rules evaluated first-match-wins,
//! so the priority order is a visible, testable data structure rather than an
//! accident of code layout. The final rule always decides, which makes
//! classification a total function: no entity is ever left unbucketed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::attrition::AttritionStatus;
use crate::behavior::BehaviorSegment;
use crate::domain::facts::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyThresholds {
    pub urgent_revenue_at_risk: Decimal,
    pub urgent_attrition_score: u8,
    pub urgent_min_revenue: Decimal,
    pub defend_min_revenue: Decimal,
    pub defend_min_cross_sell: Decimal,
    pub defend_max_recency_days: u32,
    pub nurture_max_revenue: Decimal,
    pub nurture_min_cross_sell: Decimal,
    pub exit_max_revenue: Decimal,
    pub exit_min_attrition_score: u8,
    pub fallback_defend_min_revenue: Decimal,
    pub fallback_defend_max_recency_days: u32,
}

impl Default for StrategyThresholds {
    fn default() -> Self {
        Self {
            urgent_revenue_at_risk: Decimal::new(100_000, 0),
            urgent_attrition_score: 80,
            urgent_min_revenue: Decimal::new(50_000, 0),
            defend_min_revenue: Decimal::new(20_000, 0),
            defend_min_cross_sell: Decimal::new(10_000, 0),
            defend_max_recency_days: 60,
            nurture_max_revenue: Decimal::new(20_000, 0),
            nurture_min_cross_sell: Decimal::new(5_000, 0),
            exit_max_revenue: Decimal::new(5_000, 0),
            exit_min_attrition_score: 60,
            fallback_defend_min_revenue: Decimal::new(20_000, 0),
            fallback_defend_max_recency_days: 90,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategicBucket {
    UrgentIntervention,
    DefendAndGrow,
    NurtureUp,
    OptimizeExit,
}

impl StrategicBucket {
    /// Action-list ordering: most urgent first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::UrgentIntervention => 0,
            Self::DefendAndGrow => 1,
            Self::NurtureUp => 2,
            Self::OptimizeExit => 3,
        }
    }
}

/// Everything the cascade looks at for one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyInput {
    pub entity_id: EntityId,
    pub current_revenue: Decimal,
    pub revenue_at_risk: Decimal,
    pub attrition_score: u8,
    pub attrition_status: AttritionStatus,
    pub segment: BehaviorSegment,
    pub cross_sell_potential: Decimal,
    pub days_since_last_order: u32,
}

/// The metric values the decision was made from, kept with the assignment so
/// a reviewer can audit it without re-running the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub revenue_at_risk: Decimal,
    pub attrition_score: u8,
    pub cross_sell_potential: Decimal,
    pub days_since_last_order: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategicAction {
    pub entity_id: EntityId,
    pub bucket: StrategicBucket,
    /// Name of the cascade rule that fired.
    pub rule: String,
    pub reason: String,
    pub metrics: MetricsSnapshot,
}

pub struct StrategyRule {
    pub name: &'static str,
    pub decide: fn(&StrategyInput, &StrategyThresholds) -> Option<(StrategicBucket, String)>,
}

/// The cascade, in evaluation order. The trailing default always matches.
pub const RULES: &[StrategyRule] = &[
    StrategyRule { name: "urgent_intervention", decide: urgent_intervention },
    StrategyRule { name: "defend_and_grow", decide: defend_and_grow },
    StrategyRule { name: "nurture_up", decide: nurture_up },
    StrategyRule { name: "optimize_exit", decide: optimize_exit },
    StrategyRule { name: "default", decide: default_bucket },
];

fn urgent_intervention(
    input: &StrategyInput,
    t: &StrategyThresholds,
) -> Option<(StrategicBucket, String)> {
    if input.revenue_at_risk > t.urgent_revenue_at_risk {
        return Some((
            StrategicBucket::UrgentIntervention,
            format!(
                "${} of revenue is at risk (threshold ${})",
                input.revenue_at_risk.round_dp(0),
                t.urgent_revenue_at_risk
            ),
        ));
    }
    if input.attrition_score > t.urgent_attrition_score
        && input.current_revenue > t.urgent_min_revenue
    {
        return Some((
            StrategicBucket::UrgentIntervention,
            format!(
                "attrition score {} on a ${} account",
                input.attrition_score,
                input.current_revenue.round_dp(0)
            ),
        ));
    }
    if input.attrition_status == AttritionStatus::Churned {
        return Some((
            StrategicBucket::UrgentIntervention,
            format!(
                "churned after {} days without an order",
                input.days_since_last_order
            ),
        ));
    }
    None
}

fn defend_and_grow(
    input: &StrategyInput,
    t: &StrategyThresholds,
) -> Option<(StrategicBucket, String)> {
    (input.segment == BehaviorSegment::SteadyRepeater
        && input.current_revenue > t.defend_min_revenue
        && input.cross_sell_potential > t.defend_min_cross_sell
        && input.days_since_last_order < t.defend_max_recency_days)
        .then(|| {
            (
                StrategicBucket::DefendAndGrow,
                format!(
                    "steady repeater with ${} revenue and ${} cross-sell potential",
                    input.current_revenue.round_dp(0),
                    input.cross_sell_potential.round_dp(0)
                ),
            )
        })
}

fn nurture_up(input: &StrategyInput, t: &StrategyThresholds) -> Option<(StrategicBucket, String)> {
    if input.segment == BehaviorSegment::NewAccount {
        return Some((
            StrategicBucket::NurtureUp,
            "new account still establishing a purchasing pattern".to_owned(),
        ));
    }
    (input.current_revenue < t.nurture_max_revenue
        && input.cross_sell_potential > t.nurture_min_cross_sell)
        .then(|| {
            (
                StrategicBucket::NurtureUp,
                format!(
                    "${} account with ${} of untapped cross-sell potential",
                    input.current_revenue.round_dp(0),
                    input.cross_sell_potential.round_dp(0)
                ),
            )
        })
}

fn optimize_exit(
    input: &StrategyInput,
    t: &StrategyThresholds,
) -> Option<(StrategicBucket, String)> {
    (input.segment == BehaviorSegment::Irregular
        && input.current_revenue < t.exit_max_revenue
        && input.attrition_score > t.exit_min_attrition_score)
        .then(|| {
            (
                StrategicBucket::OptimizeExit,
                format!(
                    "irregular ${} account with attrition score {}",
                    input.current_revenue.round_dp(0),
                    input.attrition_score
                ),
            )
        })
}

fn default_bucket(
    input: &StrategyInput,
    t: &StrategyThresholds,
) -> Option<(StrategicBucket, String)> {
    if input.current_revenue > t.fallback_defend_min_revenue
        && input.days_since_last_order < t.fallback_defend_max_recency_days
    {
        Some((
            StrategicBucket::DefendAndGrow,
            format!(
                "active ${} account ordered {} days ago",
                input.current_revenue.round_dp(0),
                input.days_since_last_order
            ),
        ))
    } else {
        Some((
            StrategicBucket::NurtureUp,
            format!(
                "${} account with no stronger signal",
                input.current_revenue.round_dp(0)
            ),
        ))
    }
}

#[derive(Clone, Debug, Default)]
pub struct StrategyClassifier {
    thresholds: StrategyThresholds,
}

impl StrategyClassifier {
    pub fn new(thresholds: StrategyThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify(&self, input: &StrategyInput) -> StrategicAction {
        for rule in RULES {
            if let Some((bucket, reason)) = (rule.decide)(input, &self.thresholds) {
                return StrategicAction {
                    entity_id: input.entity_id.clone(),
                    bucket,
                    rule: rule.name.to_owned(),
                    reason,
                    metrics: MetricsSnapshot {
                        revenue_at_risk: input.revenue_at_risk,
                        attrition_score: input.attrition_score,
                        cross_sell_potential: input.cross_sell_potential,
                        days_since_last_order: input.days_since_last_order,
                    },
                };
            }
        }
        unreachable!("the trailing default rule always matches")
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::attrition::AttritionStatus;
    use crate::behavior::BehaviorSegment;
    use crate::domain::facts::EntityId;

    use super::{StrategicBucket, StrategyClassifier, StrategyInput};

    fn input() -> StrategyInput {
        StrategyInput {
            entity_id: EntityId("acct-2".to_owned()),
            current_revenue: Decimal::new(30_000, 0),
            revenue_at_risk: Decimal::ZERO,
            attrition_score: 20,
            attrition_status: AttritionStatus::Active,
            segment: BehaviorSegment::SteadyRepeater,
            cross_sell_potential: Decimal::new(12_000, 0),
            days_since_last_order: 14,
        }
    }

    #[test]
    fn urgent_rule_wins_even_when_defend_also_matches() {
        let classifier = StrategyClassifier::default();
        let mut candidate = input();
        candidate.revenue_at_risk = Decimal::new(150_000, 0);
        candidate.attrition_score = 90;

        // Steady repeater with healthy recency satisfies defend_and_grow
        // too; the cascade must still take the earlier rule.
        let action = classifier.classify(&candidate);
        assert_eq!(action.bucket, StrategicBucket::UrgentIntervention);
        assert_eq!(action.rule, "urgent_intervention");
        assert!(action.reason.contains("150000"));
    }

    #[test]
    fn churned_status_alone_is_urgent() {
        let classifier = StrategyClassifier::default();
        let mut candidate = input();
        candidate.segment = BehaviorSegment::Irregular;
        candidate.attrition_status = AttritionStatus::Churned;
        candidate.current_revenue = Decimal::new(8_000, 0);

        let action = classifier.classify(&candidate);
        assert_eq!(action.bucket, StrategicBucket::UrgentIntervention);
    }

    #[test]
    fn healthy_steady_repeater_is_defend_and_grow() {
        let classifier = StrategyClassifier::default();
        let action = classifier.classify(&input());
        assert_eq!(action.bucket, StrategicBucket::DefendAndGrow);
        assert_eq!(action.rule, "defend_and_grow");
    }

    #[test]
    fn new_account_is_nurtured() {
        let classifier = StrategyClassifier::default();
        let mut candidate = input();
        candidate.segment = BehaviorSegment::NewAccount;
        candidate.cross_sell_potential = Decimal::ZERO;

        let action = classifier.classify(&candidate);
        assert_eq!(action.bucket, StrategicBucket::NurtureUp);
    }

    #[test]
    fn small_risky_irregular_account_is_exit() {
        let classifier = StrategyClassifier::default();
        let mut candidate = input();
        candidate.segment = BehaviorSegment::Irregular;
        candidate.current_revenue = Decimal::new(3_000, 0);
        candidate.cross_sell_potential = Decimal::ZERO;
        candidate.attrition_score = 70;

        let action = classifier.classify(&candidate);
        assert_eq!(action.bucket, StrategicBucket::OptimizeExit);
    }

    #[test]
    fn fallback_splits_on_revenue_and_recency() {
        let classifier = StrategyClassifier::default();
        let mut active = input();
        active.segment = BehaviorSegment::Seasonal;
        active.cross_sell_potential = Decimal::ZERO;
        active.current_revenue = Decimal::new(45_000, 0);
        active.days_since_last_order = 30;
        let action = classifier.classify(&active);
        assert_eq!(action.bucket, StrategicBucket::DefendAndGrow);
        assert_eq!(action.rule, "default");

        let mut stale = active.clone();
        stale.days_since_last_order = 120;
        let action = classifier.classify(&stale);
        assert_eq!(action.bucket, StrategicBucket::NurtureUp);
        assert_eq!(action.rule, "default");
    }

    #[test]
    fn every_input_combination_lands_in_a_bucket() {
        let classifier = StrategyClassifier::default();
        let segments = [
            BehaviorSegment::NewAccount,
            BehaviorSegment::ProjectBuyer,
            BehaviorSegment::Seasonal,
            BehaviorSegment::SteadyRepeater,
            BehaviorSegment::Irregular,
        ];
        let statuses = [
            AttritionStatus::Active,
            AttritionStatus::Declining,
            AttritionStatus::AtRisk,
            AttritionStatus::Churned,
        ];
        for segment in segments {
            for status in statuses {
                for score in [0u8, 55, 85] {
                    for revenue in [0i64, 4_000, 30_000, 120_000] {
                        let candidate = StrategyInput {
                            entity_id: EntityId("sweep".to_owned()),
                            current_revenue: Decimal::new(revenue, 0),
                            revenue_at_risk: Decimal::new(revenue / 2, 0),
                            attrition_score: score,
                            attrition_status: status,
                            segment,
                            cross_sell_potential: Decimal::new(6_000, 0),
                            days_since_last_order: 45,
                        };
                        // Must not panic, and must produce a reason.
                        let action = classifier.classify(&candidate);
                        assert!(!action.reason.is_empty());
                    }
                }
            }
        }
    }
}
