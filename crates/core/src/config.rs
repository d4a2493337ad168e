//! Engine configuration.
//!
//! Every scoring weight, threshold, and opportunity multiplier is data, not
//! a literal: the shipped defaults are heuristics with no validated business
//! model behind them and must be revisable without touching engine code. A
//! TOML file (with `${ENV_VAR}` interpolation) is merged over the built-in
//! defaults; the merged result is validated before use.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attrition::AttritionWeights;
use crate::behavior::BehaviorThresholds;
use crate::crosssell::{CrossSellRule, CrossSellSettings};
use crate::health::HealthWeights;
use crate::pipeline::PipelineSettings;
use crate::quadrant::QuadrantThresholds;
use crate::reconcile::ReconcilerSettings;
use crate::strategy::StrategyThresholds;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineConfig {
    pub logging: LoggingConfig,
    pub health: HealthWeights,
    pub attrition: AttritionWeights,
    pub behavior: BehaviorThresholds,
    pub cross_sell: CrossSellSettings,
    /// Skipped when empty so the TOML rendering stays valid (an empty array
    /// is a value and may not follow the tables above).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cross_sell_rules: Vec<CrossSellRule>,
    pub strategy: StrategyThresholds,
    pub quadrant: QuadrantThresholds,
    pub reconciler: ReconcilerSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Compact }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl EngineConfig {
    /// Load the effective configuration: defaults, then the file named in
    /// `options` (or the first default search path that exists) merged over
    /// them, then validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.clone()) {
            Some(path) => {
                let patch = read_patch(&path)?;
                patch.apply(&mut config);
            }
            None if options.require_file => {
                let expected =
                    options.config_path.unwrap_or_else(|| PathBuf::from("accountpulse.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let patch = read_patch(path)?;
        patch.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.health
            .validate()
            .and_then(|()| self.attrition.validate())
            .map_err(|error| ConfigError::Validation(error.to_string()))?;

        validate_fraction("cross_sell.adoption_threshold", self.cross_sell.adoption_threshold)?;
        validate_fraction("cross_sell.opportunity_fraction", self.cross_sell.opportunity_fraction)?;
        if self.cross_sell.max_opportunities == 0 {
            return Err(ConfigError::Validation(
                "cross_sell.max_opportunities must be at least 1".to_owned(),
            ));
        }
        validate_fraction("behavior.steady_consistency", self.behavior.steady_consistency)?;
        validate_fraction("behavior.single_product_share", self.behavior.single_product_share)?;
        validate_fraction("behavior.diverse_min_share", self.behavior.diverse_min_share)?;
        for rule in &self.cross_sell_rules {
            if rule.when_buying.is_empty() || rule.suggest.is_empty() {
                return Err(ConfigError::Validation(
                    "cross-sell rules need both a trigger and a suggested category".to_owned(),
                ));
            }
            if rule.when_buying == rule.suggest {
                return Err(ConfigError::Validation(format!(
                    "cross-sell rule for `{}` suggests the category it is triggered by",
                    rule.when_buying
                )));
            }
            if !rule.multiplier.is_finite() || rule.multiplier <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "cross-sell rule `{}` has a non-positive multiplier",
                    rule.when_buying
                )));
            }
        }
        for (name, value) in [
            ("strategy.urgent_revenue_at_risk", self.strategy.urgent_revenue_at_risk),
            ("strategy.urgent_min_revenue", self.strategy.urgent_min_revenue),
            ("strategy.defend_min_revenue", self.strategy.defend_min_revenue),
            ("strategy.defend_min_cross_sell", self.strategy.defend_min_cross_sell),
            ("strategy.nurture_max_revenue", self.strategy.nurture_max_revenue),
            ("strategy.nurture_min_cross_sell", self.strategy.nurture_min_cross_sell),
            ("strategy.exit_max_revenue", self.strategy.exit_max_revenue),
            ("strategy.fallback_defend_min_revenue", self.strategy.fallback_defend_min_revenue),
        ] {
            if value < Decimal::ZERO {
                return Err(ConfigError::Validation(format!("{name} must not be negative")));
            }
        }
        if !self.quadrant.growth_pct.is_finite() {
            return Err(ConfigError::Validation(
                "quadrant.growth_pct must be a finite percentage".to_owned(),
            ));
        }
        if !self.reconciler.value_tolerance_pct.is_finite()
            || self.reconciler.value_tolerance_pct < 0.0
        {
            return Err(ConfigError::Validation(
                "reconciler.value_tolerance_pct must be a non-negative percentage".to_owned(),
            ));
        }
        if self.pipeline.max_actions == 0 {
            return Err(ConfigError::Validation(
                "pipeline.max_actions must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn validate_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 || value > 1.0 {
        return Err(ConfigError::Validation(format!(
            "{name} must be a fraction in (0, 1], got {value}"
        )));
    }
    Ok(())
}

/// The explicitly named path if given, otherwise the first default search
/// path that exists on disk.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.exists().then_some(path),
        None => default_search_paths().into_iter().find(|path| path.exists()),
    }
}

fn default_search_paths() -> [PathBuf; 2] {
    [PathBuf::from("accountpulse.toml"), PathBuf::from("config/accountpulse.toml")]
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let interpolated = interpolate_env(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replace `${VAR}` expressions with the named environment variable.
fn interpolate_env(content: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_owned() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);
    Ok(output)
}

// ---------------------------------------------------------------------------
// File patch: every field optional, merged over the defaults
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigPatch {
    logging: Option<LoggingPatch>,
    health: Option<HealthPatch>,
    attrition: Option<AttritionPatch>,
    behavior: Option<BehaviorPatch>,
    cross_sell: Option<CrossSellPatch>,
    cross_sell_rules: Option<Vec<CrossSellRule>>,
    strategy: Option<StrategyPatch>,
    quadrant: Option<QuadrantPatch>,
    reconciler: Option<ReconcilerPatch>,
    pipeline: Option<PipelinePatch>,
}

impl ConfigPatch {
    fn apply(self, config: &mut EngineConfig) {
        if let Some(logging) = self.logging {
            apply_field(&mut config.logging.level, logging.level);
            apply_field(&mut config.logging.format, logging.format);
        }
        if let Some(health) = self.health {
            apply_field(&mut config.health.revenue, health.revenue);
            apply_field(&mut config.health.engagement, health.engagement);
            apply_field(&mut config.health.margin, health.margin);
            apply_field(&mut config.health.category, health.category);
        }
        if let Some(attrition) = self.attrition {
            apply_field(&mut config.attrition.recency, attrition.recency);
            apply_field(&mut config.attrition.monetary, attrition.monetary);
            apply_field(&mut config.attrition.frequency, attrition.frequency);
            apply_field(&mut config.attrition.category, attrition.category);
        }
        if let Some(behavior) = self.behavior {
            apply_field(&mut config.behavior.new_account_min_orders, behavior.new_account_min_orders);
            apply_field(&mut config.behavior.project_buyer_max_orders, behavior.project_buyer_max_orders);
            apply_field(
                &mut config.behavior.project_order_size_multiple,
                behavior.project_order_size_multiple,
            );
            apply_field(&mut config.behavior.seasonal_max_months, behavior.seasonal_max_months);
            apply_field(&mut config.behavior.seasonal_min_years, behavior.seasonal_min_years);
            apply_field(&mut config.behavior.steady_consistency, behavior.steady_consistency);
            apply_field(&mut config.behavior.single_product_share, behavior.single_product_share);
            apply_field(
                &mut config.behavior.diverse_min_categories,
                behavior.diverse_min_categories,
            );
            apply_field(&mut config.behavior.diverse_min_share, behavior.diverse_min_share);
        }
        if let Some(cross_sell) = self.cross_sell {
            apply_field(&mut config.cross_sell.adoption_threshold, cross_sell.adoption_threshold);
            apply_field(
                &mut config.cross_sell.opportunity_fraction,
                cross_sell.opportunity_fraction,
            );
            apply_field(&mut config.cross_sell.max_opportunities, cross_sell.max_opportunities);
        }
        if let Some(rules) = self.cross_sell_rules {
            config.cross_sell_rules = rules;
        }
        if let Some(strategy) = self.strategy {
            apply_field(&mut config.strategy.urgent_revenue_at_risk, strategy.urgent_revenue_at_risk);
            apply_field(&mut config.strategy.urgent_attrition_score, strategy.urgent_attrition_score);
            apply_field(&mut config.strategy.urgent_min_revenue, strategy.urgent_min_revenue);
            apply_field(&mut config.strategy.defend_min_revenue, strategy.defend_min_revenue);
            apply_field(&mut config.strategy.defend_min_cross_sell, strategy.defend_min_cross_sell);
            apply_field(
                &mut config.strategy.defend_max_recency_days,
                strategy.defend_max_recency_days,
            );
            apply_field(&mut config.strategy.nurture_max_revenue, strategy.nurture_max_revenue);
            apply_field(&mut config.strategy.nurture_min_cross_sell, strategy.nurture_min_cross_sell);
            apply_field(&mut config.strategy.exit_max_revenue, strategy.exit_max_revenue);
            apply_field(
                &mut config.strategy.exit_min_attrition_score,
                strategy.exit_min_attrition_score,
            );
            apply_field(
                &mut config.strategy.fallback_defend_min_revenue,
                strategy.fallback_defend_min_revenue,
            );
            apply_field(
                &mut config.strategy.fallback_defend_max_recency_days,
                strategy.fallback_defend_max_recency_days,
            );
        }
        if let Some(quadrant) = self.quadrant {
            apply_field(&mut config.quadrant.growth_pct, quadrant.growth_pct);
            apply_field(&mut config.quadrant.recency_days, quadrant.recency_days);
        }
        if let Some(reconciler) = self.reconciler {
            apply_field(&mut config.reconciler.value_tolerance_pct, reconciler.value_tolerance_pct);
            apply_field(&mut config.reconciler.extra_stopwords, reconciler.extra_stopwords);
        }
        if let Some(pipeline) = self.pipeline {
            apply_field(&mut config.pipeline.max_actions, pipeline.max_actions);
        }
    }
}

fn apply_field<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HealthPatch {
    revenue: Option<f64>,
    engagement: Option<f64>,
    margin: Option<f64>,
    category: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttritionPatch {
    recency: Option<f64>,
    monetary: Option<f64>,
    frequency: Option<f64>,
    category: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BehaviorPatch {
    new_account_min_orders: Option<u32>,
    project_buyer_max_orders: Option<u32>,
    project_order_size_multiple: Option<f64>,
    seasonal_max_months: Option<u32>,
    seasonal_min_years: Option<u32>,
    steady_consistency: Option<f64>,
    single_product_share: Option<f64>,
    diverse_min_categories: Option<u32>,
    diverse_min_share: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CrossSellPatch {
    adoption_threshold: Option<f64>,
    opportunity_fraction: Option<f64>,
    max_opportunities: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StrategyPatch {
    urgent_revenue_at_risk: Option<Decimal>,
    urgent_attrition_score: Option<u8>,
    urgent_min_revenue: Option<Decimal>,
    defend_min_revenue: Option<Decimal>,
    defend_min_cross_sell: Option<Decimal>,
    defend_max_recency_days: Option<u32>,
    nurture_max_revenue: Option<Decimal>,
    nurture_min_cross_sell: Option<Decimal>,
    exit_max_revenue: Option<Decimal>,
    exit_min_attrition_score: Option<u8>,
    fallback_defend_min_revenue: Option<Decimal>,
    fallback_defend_max_recency_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct QuadrantPatch {
    growth_pct: Option<f64>,
    recency_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReconcilerPatch {
    value_tolerance_pct: Option<f64>,
    extra_stopwords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelinePatch {
    max_actions: Option<usize>,
}
