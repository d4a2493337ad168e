//! Cross-sell opportunity estimation.
//!
//! Two proposal sources: categories that most peers buy but the entity does
//! not, and a static co-occurrence rule table supplied as configuration data
//! ("if buying X, suggest Y, because Z"). Proposals are merged, de-duplicated
//! against what the entity already buys, and capped for downstream display.

mod engine;
mod types;

pub use engine::CrossSellEngine;
pub use types::{CrossSellOpportunity, CrossSellRule, CrossSellSettings};

/// Fraction of peers that must buy a category before it counts as popular.
pub const DEFAULT_ADOPTION_THRESHOLD: f64 = 0.75;

/// Fraction of current revenue used as the expansion-potential proxy. A
/// heuristic, not a validated model; override it in configuration.
pub const DEFAULT_OPPORTUNITY_FRACTION: f64 = 0.15;

/// Maximum opportunities returned per entity.
pub const DEFAULT_MAX_OPPORTUNITIES: usize = 15;
