//! Batch orchestration over a portfolio snapshot.
//!
//! Attrition and behavior are computed independently per entity; their
//! outputs plus the cross-sell estimate feed the strategic cascade, and the
//! winning actions are ranked into a bounded call list. The pipeline is a
//! plain synchronous loop over in-memory data; the caller owns any
//! parallelism or timeout around the whole invocation.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::attrition::{AttritionAnalyzer, AttritionScore, AttritionStatus};
use crate::behavior::{BehaviorClassifier, CustomerBehavior};
use crate::config::EngineConfig;
use crate::crosssell::{CrossSellEngine, CrossSellOpportunity};
use crate::domain::facts::{EntityId, EntityPeriodFacts};
use crate::errors::DomainError;
use crate::health::{HealthScore, HealthScorer, PeerSnapshot};
use crate::strategy::{StrategicAction, StrategyClassifier, StrategyInput};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Upper bound on the ranked action list handed downstream.
    pub max_actions: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { max_actions: 10 }
    }
}

/// Everything the fact provider hands over for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub as_of: NaiveDate,
    pub entities: Vec<EntityPeriodFacts>,
}

/// All derived signals for one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityInsight {
    pub entity_id: EntityId,
    pub name: String,
    pub attrition: AttritionScore,
    pub behavior: CustomerBehavior,
    pub health: HealthScore,
    pub opportunities: Vec<CrossSellOpportunity>,
    pub cross_sell_potential: Decimal,
    pub action: StrategicAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub as_of: NaiveDate,
    pub entity_count: usize,
    pub insights: Vec<EntityInsight>,
    /// Ranked, bounded action list: most urgent bucket first, largest
    /// revenue at risk first within a bucket.
    pub actions: Vec<StrategicAction>,
}

pub struct InsightPipeline {
    attrition: AttritionAnalyzer,
    behavior: BehaviorClassifier,
    health: HealthScorer,
    cross_sell: CrossSellEngine,
    strategy: StrategyClassifier,
    settings: PipelineSettings,
}

impl InsightPipeline {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            attrition: AttritionAnalyzer::new(config.attrition),
            behavior: BehaviorClassifier::new(config.behavior),
            health: HealthScorer::new(config.health),
            cross_sell: CrossSellEngine::new(
                config.cross_sell,
                config.cross_sell_rules.clone(),
            ),
            strategy: StrategyClassifier::new(config.strategy),
            settings: config.pipeline,
        }
    }

    pub fn analyze(&self, snapshot: &PortfolioSnapshot) -> Result<PortfolioReport, DomainError> {
        for entity in &snapshot.entities {
            entity.validate()?;
        }

        let peers = PeerSnapshot::from_entities(&snapshot.entities);
        let peer_median_order_value = peers.median_order_value();
        let category_sets: Vec<BTreeSet<String>> = snapshot
            .entities
            .iter()
            .map(|entity| {
                entity.current.categories().iter().map(|c| (*c).to_owned()).collect()
            })
            .collect();

        let mut insights = Vec::with_capacity(snapshot.entities.len());
        for (position, entity) in snapshot.entities.iter().enumerate() {
            let behavior = self.behavior.classify(entity, snapshot.as_of, peer_median_order_value);
            let attrition = self.attrition.analyze(entity, snapshot.as_of);
            let health = self.health.score(entity, &peers, snapshot.as_of);

            let opportunities = if behavior.cross_sell_eligible {
                let peer_sets: Vec<BTreeSet<String>> = category_sets
                    .iter()
                    .enumerate()
                    .filter(|(other, _)| *other != position)
                    .map(|(_, set)| set.clone())
                    .collect();
                self.cross_sell.recommend(entity, &peer_sets)
            } else {
                Vec::new()
            };
            let cross_sell_potential: Decimal =
                opportunities.iter().map(|o| o.estimated_revenue).sum();

            // Segments the classifier rules out of attrition scoring enter
            // the cascade as quiet accounts, not as risks.
            let (effective_score, effective_status, effective_at_risk) =
                if behavior.attrition_eligible {
                    (attrition.score, attrition.status, attrition.revenue_at_risk)
                } else {
                    (0, AttritionStatus::Active, Decimal::ZERO)
                };

            let action = self.strategy.classify(&StrategyInput {
                entity_id: entity.id.clone(),
                current_revenue: entity.current.revenue,
                revenue_at_risk: effective_at_risk,
                attrition_score: effective_score,
                attrition_status: effective_status,
                segment: behavior.segment,
                cross_sell_potential,
                days_since_last_order: attrition.recency_days,
            });

            insights.push(EntityInsight {
                entity_id: entity.id.clone(),
                name: entity.name.clone(),
                attrition,
                behavior,
                health,
                opportunities,
                cross_sell_potential,
                action,
            });
        }

        let actions = rank_actions(&insights, self.settings.max_actions);

        Ok(PortfolioReport {
            as_of: snapshot.as_of,
            entity_count: insights.len(),
            insights,
            actions,
        })
    }
}

fn rank_actions(insights: &[EntityInsight], max_actions: usize) -> Vec<StrategicAction> {
    let mut actions: Vec<StrategicAction> =
        insights.iter().map(|insight| insight.action.clone()).collect();
    actions.sort_by(|a, b| {
        a.bucket
            .priority()
            .cmp(&b.bucket.priority())
            .then_with(|| b.metrics.revenue_at_risk.cmp(&a.metrics.revenue_at_risk))
            .then_with(|| b.metrics.cross_sell_potential.cmp(&a.metrics.cross_sell_potential))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    actions.truncate(max_actions);
    actions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::config::EngineConfig;
    use crate::crosssell::CrossSellRule;
    use crate::domain::facts::{EntityId, EntityPeriodFacts, PeriodFacts, PeriodWindow};
    use crate::strategy::StrategicBucket;

    use super::{InsightPipeline, PortfolioSnapshot};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entity(
        id: &str,
        current_revenue: i64,
        prior_revenue: i64,
        current_orders: Vec<NaiveDate>,
        prior_orders: Vec<NaiveDate>,
        categories: &[&str],
    ) -> EntityPeriodFacts {
        let per_category = current_revenue / categories.len().max(1) as i64;
        EntityPeriodFacts {
            id: EntityId(id.to_owned()),
            name: format!("{id} Water Systems"),
            current_window: PeriodWindow { start: date(2025, 1, 1), end: date(2026, 1, 1) },
            prior_window: PeriodWindow { start: date(2024, 1, 1), end: date(2025, 1, 1) },
            current: PeriodFacts {
                revenue: Decimal::new(current_revenue, 0),
                gross_profit: Decimal::new(current_revenue / 5, 0),
                order_dates: current_orders.into_iter().collect(),
                category_revenue: categories
                    .iter()
                    .map(|name| ((*name).to_owned(), Decimal::new(per_category, 0)))
                    .collect(),
                ..PeriodFacts::default()
            },
            prior: PeriodFacts {
                revenue: Decimal::new(prior_revenue, 0),
                gross_profit: Decimal::new(prior_revenue / 5, 0),
                order_dates: prior_orders.into_iter().collect(),
                category_revenue: if prior_revenue > 0 {
                    BTreeMap::from([("chemicals".to_owned(), Decimal::new(prior_revenue, 0))])
                } else {
                    BTreeMap::new()
                },
                ..PeriodFacts::default()
            },
        }
    }

    fn snapshot() -> PortfolioSnapshot {
        let monthly_2025: Vec<NaiveDate> = (1..=12).map(|m| date(2025, m, 10)).collect();
        let monthly_2024: Vec<NaiveDate> = (1..=12).map(|m| date(2024, m, 10)).collect();
        PortfolioSnapshot {
            as_of: date(2025, 12, 20),
            entities: vec![
                // Healthy steady repeater with room to grow.
                entity(
                    "steady",
                    180_000,
                    170_000,
                    monthly_2025.clone(),
                    monthly_2024.clone(),
                    &["chemicals", "meters"],
                ),
                // Went quiet after a strong prior year.
                entity(
                    "vanished",
                    0,
                    140_000,
                    vec![],
                    (1..=8).map(|m| date(2024, m, 5)).collect(),
                    &[],
                ),
                // Just showed up.
                entity(
                    "fresh",
                    12_000,
                    0,
                    vec![date(2025, 11, 2), date(2025, 12, 1)],
                    vec![],
                    &["meters"],
                ),
                // Peer that makes valves a popular category.
                entity(
                    "broadline",
                    90_000,
                    85_000,
                    monthly_2025,
                    monthly_2024,
                    &["chemicals", "meters", "valves"],
                ),
            ],
        }
    }

    fn pipeline() -> InsightPipeline {
        let mut config = EngineConfig::default();
        config.cross_sell_rules = vec![CrossSellRule {
            when_buying: "chemicals".to_owned(),
            suggest: "dosing-pumps".to_owned(),
            because: "Chemical programs need dosing equipment".to_owned(),
            multiplier: 1.0,
        }];
        InsightPipeline::from_config(&config)
    }

    #[test]
    fn report_covers_every_entity_with_one_action_each() {
        let report = pipeline().analyze(&snapshot()).unwrap();
        assert_eq!(report.entity_count, 4);
        assert_eq!(report.insights.len(), 4);
        for insight in &report.insights {
            assert_eq!(insight.action.entity_id, insight.entity_id);
        }
    }

    #[test]
    fn churned_account_tops_the_action_list() {
        let report = pipeline().analyze(&snapshot()).unwrap();
        assert_eq!(report.actions[0].entity_id, EntityId("vanished".to_owned()));
        assert_eq!(report.actions[0].bucket, StrategicBucket::UrgentIntervention);
    }

    #[test]
    fn new_account_is_not_scored_as_decline() {
        let report = pipeline().analyze(&snapshot()).unwrap();
        let fresh = report
            .insights
            .iter()
            .find(|i| i.entity_id.0 == "fresh")
            .unwrap();
        assert_eq!(fresh.attrition.revenue_at_risk, Decimal::ZERO);
        assert_eq!(fresh.action.bucket, StrategicBucket::NurtureUp);
    }

    #[test]
    fn cross_sell_feeds_the_strategy_input() {
        let report = pipeline().analyze(&snapshot()).unwrap();
        let steady = report
            .insights
            .iter()
            .find(|i| i.entity_id.0 == "steady")
            .unwrap();
        assert!(!steady.opportunities.is_empty());
        assert_eq!(
            steady.cross_sell_potential,
            steady.opportunities.iter().map(|o| o.estimated_revenue).sum::<Decimal>()
        );
        assert_eq!(steady.action.bucket, StrategicBucket::DefendAndGrow);
    }

    #[test]
    fn action_list_is_bounded_by_configuration() {
        let mut config = EngineConfig::default();
        config.pipeline.max_actions = 2;
        let pipeline = InsightPipeline::from_config(&config);

        let report = pipeline.analyze(&snapshot()).unwrap();
        assert_eq!(report.actions.len(), 2);
        assert_eq!(report.insights.len(), 4, "insights are never truncated");
    }

    #[test]
    fn invalid_windows_fail_the_batch_loudly() {
        let mut bad = snapshot();
        bad.entities[0].prior_window =
            PeriodWindow { start: date(2024, 6, 1), end: date(2025, 6, 1) };

        let error = pipeline().analyze(&bad).unwrap_err();
        assert!(error.to_string().contains("overlaps"));
    }
}
