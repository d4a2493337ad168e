pub mod attrition;
pub mod behavior;
pub mod config;
pub mod crosssell;
pub mod domain;
pub mod errors;
pub mod health;
pub mod percentile;
pub mod pipeline;
pub mod quadrant;
pub mod reconcile;
pub mod strategy;

pub use attrition::{AttritionAnalyzer, AttritionScore, AttritionStatus, AttritionWeights};
pub use behavior::{
    BehaviorClassifier, BehaviorSegment, BehaviorThresholds, CustomerBehavior,
};
pub use config::{EngineConfig, LoadOptions, LogFormat, LoggingConfig};
pub use crosssell::{CrossSellEngine, CrossSellOpportunity, CrossSellRule, CrossSellSettings};
pub use domain::facts::{EntityId, EntityPeriodFacts, PeriodFacts, PeriodWindow};
pub use errors::DomainError;
pub use health::{
    HealthComponents, HealthScore, HealthScorer, HealthTier, HealthWeights, PeerSnapshot,
};
pub use percentile::{median, percentile_rank};
pub use pipeline::{
    EntityInsight, InsightPipeline, PipelineSettings, PortfolioReport, PortfolioSnapshot,
};
pub use quadrant::{Quadrant, QuadrantMapper, QuadrantPlacement, QuadrantThresholds, SiblingMetrics};
pub use reconcile::{
    FuzzyReconciler, MatchResult, MatchType, ReconcilerSettings, ReconciliationReport,
    SourceRecord, TargetIndex, TargetRecord,
};
pub use strategy::{
    MetricsSnapshot, StrategicAction, StrategicBucket, StrategyClassifier, StrategyInput,
    StrategyThresholds,
};
