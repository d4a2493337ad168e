//! Buying-pattern segmentation.
//!
//! A project buyer who stops ordering once their project ends is not churn.
//! Conflating the two floods the action list with false alarms, so the
//! segment gates which entities are eligible for attrition scoring at all.
//! The cascade is evaluated in fixed priority order, first match wins.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::facts::{decimal_to_f64, EntityId, EntityPeriodFacts};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BehaviorThresholds {
    /// Below this many lifetime orders an entity is a new account.
    pub new_account_min_orders: u32,
    /// Upper bound on lifetime orders for the project-buyer pattern.
    pub project_buyer_max_orders: u32,
    /// Average order value must be at least this multiple of the peer median
    /// order value to read as "large, infrequent".
    pub project_order_size_multiple: f64,
    /// Orders clustering into at most this many calendar months reads as
    /// seasonal.
    pub seasonal_max_months: u32,
    /// Seasonal clustering must repeat across at least this many years.
    pub seasonal_min_years: u32,
    /// Fraction of months with at least one order for a steady repeater.
    pub steady_consistency: f64,
    /// Revenue share above which one category dominates.
    pub single_product_share: f64,
    /// Categories contributing at least `diverse_min_share` needed to count
    /// as diverse.
    pub diverse_min_categories: u32,
    pub diverse_min_share: f64,
}

impl Default for BehaviorThresholds {
    fn default() -> Self {
        Self {
            new_account_min_orders: 3,
            project_buyer_max_orders: 3,
            project_order_size_multiple: 3.0,
            seasonal_max_months: 4,
            seasonal_min_years: 2,
            steady_consistency: 0.75,
            single_product_share: 0.80,
            diverse_min_categories: 3,
            diverse_min_share: 0.10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorSegment {
    NewAccount,
    ProjectBuyer,
    Seasonal,
    SteadyRepeater,
    Irregular,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerBehavior {
    pub entity_id: EntityId,
    pub segment: BehaviorSegment,
    pub single_product: bool,
    pub diverse: bool,
    /// Fraction of current-window months with at least one order.
    pub order_consistency: f64,
    pub class_count: u32,
    pub attrition_eligible: bool,
    pub cross_sell_eligible: bool,
}

#[derive(Clone, Debug, Default)]
pub struct BehaviorClassifier {
    thresholds: BehaviorThresholds,
}

impl BehaviorClassifier {
    pub fn new(thresholds: BehaviorThresholds) -> Self {
        Self { thresholds }
    }

    /// `peer_median_order_value` feeds the project-buyer size test; when the
    /// peer population has no orders the infrequency conditions stand alone.
    pub fn classify(
        &self,
        facts: &EntityPeriodFacts,
        as_of: NaiveDate,
        peer_median_order_value: Option<f64>,
    ) -> CustomerBehavior {
        let t = &self.thresholds;
        let total_orders = facts.total_order_count() as u32;
        let order_consistency = order_consistency(facts);
        let order_months = order_month_set(facts);
        let order_years: BTreeSet<i32> = facts
            .current
            .order_dates
            .iter()
            .chain(facts.prior.order_dates.iter())
            .map(Datelike::year)
            .collect();

        let window_days = facts.current_window.len_days();
        let recently_started = facts
            .first_order()
            .map(|first| as_of.signed_duration_since(first).num_days() < window_days)
            .unwrap_or(true);

        let segment = if total_orders < t.new_account_min_orders || recently_started {
            BehaviorSegment::NewAccount
        } else if total_orders >= 1
            && total_orders <= t.project_buyer_max_orders
            && facts.current.order_dates.is_empty()
            && orders_are_large(facts, peer_median_order_value, t.project_order_size_multiple)
        {
            BehaviorSegment::ProjectBuyer
        } else if !order_months.is_empty()
            && order_months.len() as u32 <= t.seasonal_max_months
            && order_years.len() as u32 >= t.seasonal_min_years
        {
            BehaviorSegment::Seasonal
        } else if order_consistency >= t.steady_consistency {
            BehaviorSegment::SteadyRepeater
        } else {
            BehaviorSegment::Irregular
        };

        let (single_product, diverse) = product_mix_flags(facts, t);

        let off_season = segment == BehaviorSegment::Seasonal
            && !order_months.contains(&as_of.month());
        let attrition_eligible = segment != BehaviorSegment::ProjectBuyer && !off_season;
        let cross_sell_eligible = !single_product;

        CustomerBehavior {
            entity_id: facts.id.clone(),
            segment,
            single_product,
            diverse,
            order_consistency,
            class_count: facts.current.category_count() as u32,
            attrition_eligible,
            cross_sell_eligible,
        }
    }
}

/// Fraction of current-window months containing at least one order.
fn order_consistency(facts: &EntityPeriodFacts) -> f64 {
    let months = facts.current_window.month_span();
    if months == 0 {
        return 0.0;
    }
    let active_months: BTreeSet<(i32, u32)> = facts
        .current
        .order_dates
        .iter()
        .filter(|date| facts.current_window.contains(**date))
        .map(|date| (date.year(), date.month()))
        .collect();
    active_months.len() as f64 / f64::from(months)
}

fn order_month_set(facts: &EntityPeriodFacts) -> BTreeSet<u32> {
    facts
        .current
        .order_dates
        .iter()
        .chain(facts.prior.order_dates.iter())
        .map(Datelike::month)
        .collect()
}

fn orders_are_large(
    facts: &EntityPeriodFacts,
    peer_median_order_value: Option<f64>,
    multiple: f64,
) -> bool {
    let total_orders = facts.total_order_count();
    if total_orders == 0 {
        return false;
    }
    let total_revenue =
        decimal_to_f64(facts.current.revenue) + decimal_to_f64(facts.prior.revenue);
    let average = total_revenue / total_orders as f64;
    match peer_median_order_value {
        Some(peer_median) if peer_median > 0.0 => average >= peer_median * multiple,
        // No peer baseline to compare against: infrequency alone decides.
        _ => average > 0.0,
    }
}

fn product_mix_flags(facts: &EntityPeriodFacts, t: &BehaviorThresholds) -> (bool, bool) {
    let revenue = facts.current.revenue;
    if revenue <= Decimal::ZERO || facts.current.category_revenue.is_empty() {
        return (false, false);
    }
    let total = decimal_to_f64(revenue);
    let shares: Vec<f64> = facts
        .current
        .category_revenue
        .values()
        .map(|amount| decimal_to_f64(*amount) / total)
        .collect();

    let single_product = shares.iter().any(|share| *share >= t.single_product_share);
    let diverse = shares.iter().filter(|share| **share >= t.diverse_min_share).count() as u32
        >= t.diverse_min_categories;
    (single_product, diverse)
}
