//! Cross-sell engine implementation.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;

use crate::domain::facts::EntityPeriodFacts;

use super::types::{CrossSellOpportunity, CrossSellRule, CrossSellSettings};

#[derive(Clone, Debug, Default)]
pub struct CrossSellEngine {
    settings: CrossSellSettings,
    rules: Vec<CrossSellRule>,
}

/// Candidate accumulator per category: best estimate plus merged reasons.
struct Candidate {
    estimate: Decimal,
    reasons: Vec<String>,
}

impl CrossSellEngine {
    pub fn new(settings: CrossSellSettings, rules: Vec<CrossSellRule>) -> Self {
        Self { settings, rules }
    }

    pub fn rules(&self) -> &[CrossSellRule] {
        &self.rules
    }

    /// Propose categories for one entity against its peer population's
    /// category sets. An empty peer population yields rule-table proposals
    /// only; that is a normal outcome, not an error.
    pub fn recommend(
        &self,
        facts: &EntityPeriodFacts,
        peer_category_sets: &[BTreeSet<String>],
    ) -> Vec<CrossSellOpportunity> {
        let owned = facts.current.categories();
        let revenue = facts.current.revenue;
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();

        let missing_popular = self.missing_popular(&owned, peer_category_sets);
        if !missing_popular.is_empty() {
            // Expansion potential is spread over however many categories are
            // missing rather than multiplied by each.
            let per_category = self.fraction_of(revenue)
                / Decimal::from(missing_popular.len() as u64);
            for (category, adoption_pct) in missing_popular {
                merge_candidate(
                    &mut candidates,
                    category.clone(),
                    per_category,
                    format!("{adoption_pct}% of comparable customers buy {category}"),
                );
            }
        }

        for rule in &self.rules {
            if !owned.contains(rule.when_buying.as_str())
                || owned.contains(rule.suggest.as_str())
            {
                continue;
            }
            let estimate = self.fraction_of(revenue) * decimal_from(rule.multiplier);
            let reason = if rule.because.is_empty() {
                format!("Customers buying {} typically also buy {}", rule.when_buying, rule.suggest)
            } else {
                rule.because.clone()
            };
            merge_candidate(&mut candidates, rule.suggest.clone(), estimate, reason);
        }

        let current_categories: Vec<String> =
            owned.iter().map(|category| (*category).to_owned()).collect();

        let mut opportunities: Vec<CrossSellOpportunity> = candidates
            .into_iter()
            .map(|(category, candidate)| CrossSellOpportunity {
                entity_id: facts.id.clone(),
                current_categories: current_categories.clone(),
                recommended_category: category,
                estimated_revenue: candidate.estimate.round_dp(2),
                reasons: candidate.reasons,
            })
            .collect();

        // Descending by estimate; category name breaks ties so output order
        // is stable run to run.
        opportunities.sort_by(|a, b| {
            b.estimated_revenue
                .cmp(&a.estimated_revenue)
                .then_with(|| a.recommended_category.cmp(&b.recommended_category))
        });
        opportunities.truncate(self.settings.max_opportunities);
        opportunities
    }

    /// Categories adopted by at least the threshold fraction of peers and
    /// absent from `owned`, with the adoption percentage for the reason text.
    fn missing_popular(
        &self,
        owned: &BTreeSet<&str>,
        peer_category_sets: &[BTreeSet<String>],
    ) -> Vec<(String, u8)> {
        if peer_category_sets.is_empty() {
            return Vec::new();
        }
        let peer_count = peer_category_sets.len() as f64;
        let mut adoption: BTreeMap<&str, usize> = BTreeMap::new();
        for peer in peer_category_sets {
            for category in peer {
                *adoption.entry(category.as_str()).or_default() += 1;
            }
        }
        adoption
            .into_iter()
            .filter_map(|(category, count)| {
                let fraction = count as f64 / peer_count;
                (fraction >= self.settings.adoption_threshold && !owned.contains(category))
                    .then(|| (category.to_owned(), (fraction * 100.0).round() as u8))
            })
            .collect()
    }

    fn fraction_of(&self, revenue: Decimal) -> Decimal {
        revenue * decimal_from(self.settings.opportunity_fraction)
    }
}

fn merge_candidate(
    candidates: &mut BTreeMap<String, Candidate>,
    category: String,
    estimate: Decimal,
    reason: String,
) {
    let entry = candidates
        .entry(category)
        .or_insert_with(|| Candidate { estimate: Decimal::ZERO, reasons: Vec::new() });
    entry.estimate = entry.estimate.max(estimate);
    entry.reasons.push(reason);
}

fn decimal_from(value: f64) -> Decimal {
    Decimal::from_f64_retain(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::facts::{EntityId, EntityPeriodFacts, PeriodFacts, PeriodWindow};

    use super::super::types::{CrossSellRule, CrossSellSettings};
    use super::CrossSellEngine;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entity_with(categories: &[&str], revenue: i64) -> EntityPeriodFacts {
        let per_category = revenue / categories.len().max(1) as i64;
        EntityPeriodFacts {
            id: EntityId("acct-5".to_owned()),
            name: "Summit Treatment".to_owned(),
            current_window: PeriodWindow { start: date(2025, 1, 1), end: date(2026, 1, 1) },
            prior_window: PeriodWindow { start: date(2024, 1, 1), end: date(2025, 1, 1) },
            current: PeriodFacts {
                revenue: Decimal::new(revenue, 0),
                category_revenue: categories
                    .iter()
                    .map(|name| ((*name).to_owned(), Decimal::new(per_category, 0)))
                    .collect(),
                ..PeriodFacts::default()
            },
            prior: PeriodFacts::default(),
        }
    }

    fn peer_sets(sets: &[&[&str]]) -> Vec<BTreeSet<String>> {
        sets.iter()
            .map(|set| set.iter().map(|name| (*name).to_owned()).collect())
            .collect()
    }

    fn rule(when_buying: &str, suggest: &str) -> CrossSellRule {
        CrossSellRule {
            when_buying: when_buying.to_owned(),
            suggest: suggest.to_owned(),
            because: String::new(),
            multiplier: 1.0,
        }
    }

    #[test]
    fn popular_missing_category_is_proposed() {
        let engine = CrossSellEngine::new(CrossSellSettings::default(), Vec::new());
        let facts = entity_with(&["chemicals"], 100_000);
        let peers = peer_sets(&[
            &["chemicals", "meters"],
            &["chemicals", "meters"],
            &["meters"],
            &["chemicals", "meters"],
        ]);

        let opportunities = engine.recommend(&facts, &peers);
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].recommended_category, "meters");
        // 15% of 100k, one missing category.
        assert_eq!(opportunities[0].estimated_revenue, Decimal::new(15_000, 0).round_dp(2));
    }

    #[test]
    fn estimate_is_spread_over_missing_categories() {
        let engine = CrossSellEngine::new(CrossSellSettings::default(), Vec::new());
        let facts = entity_with(&["chemicals"], 100_000);
        let peers = peer_sets(&[
            &["meters", "valves"],
            &["meters", "valves"],
            &["meters", "valves"],
        ]);

        let opportunities = engine.recommend(&facts, &peers);
        assert_eq!(opportunities.len(), 2);
        for opportunity in &opportunities {
            assert_eq!(opportunity.estimated_revenue, Decimal::new(7_500, 0).round_dp(2));
        }
    }

    #[test]
    fn recommended_category_is_never_already_owned() {
        let engine = CrossSellEngine::new(
            CrossSellSettings::default(),
            vec![rule("chemicals", "meters"), rule("chemicals", "valves")],
        );
        let facts = entity_with(&["chemicals", "meters"], 80_000);
        let peers = peer_sets(&[&["chemicals", "meters"], &["chemicals", "meters"]]);

        let opportunities = engine.recommend(&facts, &peers);
        for opportunity in &opportunities {
            assert!(
                !opportunity.current_categories.contains(&opportunity.recommended_category),
                "{} is already purchased",
                opportunity.recommended_category
            );
        }
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].recommended_category, "valves");
    }

    #[test]
    fn accepting_a_recommendation_retires_it() {
        let engine =
            CrossSellEngine::new(CrossSellSettings::default(), vec![rule("chemicals", "valves")]);
        let before = entity_with(&["chemicals"], 60_000);
        let peers = peer_sets(&[&["chemicals"], &["chemicals"]]);

        let first = engine.recommend(&before, &peers);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].recommended_category, "valves");

        let after = entity_with(&["chemicals", "valves"], 60_000);
        let second = engine.recommend(&after, &peers);
        assert!(second.is_empty(), "an adopted category must not be re-suggested");
    }

    #[test]
    fn empty_peer_population_still_applies_rules() {
        let engine =
            CrossSellEngine::new(CrossSellSettings::default(), vec![rule("chemicals", "meters")]);
        let facts = entity_with(&["chemicals"], 40_000);

        let opportunities = engine.recommend(&facts, &[]);
        assert_eq!(opportunities.len(), 1);
        assert_eq!(opportunities[0].recommended_category, "meters");
    }

    #[test]
    fn merged_sources_keep_the_higher_estimate_and_both_reasons() {
        let mut boosted = rule("chemicals", "meters");
        boosted.multiplier = 2.0;
        let engine = CrossSellEngine::new(CrossSellSettings::default(), vec![boosted]);
        let facts = entity_with(&["chemicals"], 100_000);
        let peers = peer_sets(&[&["meters"], &["meters"], &["meters"], &["meters"]]);

        let opportunities = engine.recommend(&facts, &peers);
        assert_eq!(opportunities.len(), 1);
        // Rule estimate 30k beats the popular-category estimate of 15k.
        assert_eq!(opportunities[0].estimated_revenue, Decimal::new(30_000, 0).round_dp(2));
        assert_eq!(opportunities[0].reasons.len(), 2);
    }

    #[test]
    fn output_is_sorted_and_capped() {
        let settings = CrossSellSettings { max_opportunities: 2, ..CrossSellSettings::default() };
        let engine = CrossSellEngine::new(
            settings,
            vec![rule("chemicals", "valves"), rule("chemicals", "meters")],
        );
        let facts = entity_with(&["chemicals"], 50_000);
        let peers = peer_sets(&[&["pumps"], &["pumps"], &["filters"], &["pumps"]]);

        let opportunities = engine.recommend(&facts, &peers);
        assert_eq!(opportunities.len(), 2);
        assert!(opportunities[0].estimated_revenue >= opportunities[1].estimated_revenue);
    }
}
