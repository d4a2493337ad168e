use std::collections::BTreeMap;
use std::path::Path;

use accountpulse_core::config::EngineConfig;
use accountpulse_core::domain::facts::{EntityId, EntityPeriodFacts, PeriodFacts, PeriodWindow};
use accountpulse_core::pipeline::{InsightPipeline, PortfolioSnapshot};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{escape_json, load_config, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(config_path: Option<&Path>, json_output: bool) -> CommandResult {
    let report = build_report(config_path);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(config_path: Option<&Path>) -> DoctorReport {
    let mut checks = Vec::new();

    match load_config(config_path) {
        Ok((config, source)) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: format!("configuration loaded from {source}"),
            });
            checks.push(check_rule_table(&config));
            checks.push(check_engine_selftest(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "cross_sell_rule_table",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "engine_selftest",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_rule_table(config: &EngineConfig) -> DoctorCheck {
    DoctorCheck {
        name: "cross_sell_rule_table",
        status: CheckStatus::Pass,
        details: format!(
            "{} rule(s) loaded; rule shape validated by the config contract",
            config.cross_sell_rules.len()
        ),
    }
}

/// Run the pipeline over a tiny built-in snapshot and confirm every entity
/// comes back bucketed.
fn check_engine_selftest(config: &EngineConfig) -> DoctorCheck {
    let pipeline = InsightPipeline::from_config(config);
    let snapshot = selftest_snapshot();
    match pipeline.analyze(&snapshot) {
        Ok(report) if report.insights.len() == snapshot.entities.len() => DoctorCheck {
            name: "engine_selftest",
            status: CheckStatus::Pass,
            details: format!(
                "scored {} fixture entities into {} action(s)",
                report.entity_count,
                report.actions.len()
            ),
        },
        Ok(report) => DoctorCheck {
            name: "engine_selftest",
            status: CheckStatus::Fail,
            details: format!(
                "expected {} insights, engine produced {}",
                snapshot.entities.len(),
                report.insights.len()
            ),
        },
        Err(error) => DoctorCheck {
            name: "engine_selftest",
            status: CheckStatus::Fail,
            details: format!("self-test snapshot failed to score: {error}"),
        },
    }
}

fn selftest_snapshot() -> PortfolioSnapshot {
    let date = |y: i32, m: u32, d: u32| {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
    };
    let entity = |id: &str, revenue: i64, orders: Vec<NaiveDate>| EntityPeriodFacts {
        id: EntityId(id.to_owned()),
        name: format!("{id} fixture"),
        current_window: PeriodWindow { start: date(2025, 1, 1), end: date(2026, 1, 1) },
        prior_window: PeriodWindow { start: date(2024, 1, 1), end: date(2025, 1, 1) },
        current: PeriodFacts {
            revenue: Decimal::new(revenue, 0),
            gross_profit: Decimal::new(revenue / 4, 0),
            order_dates: orders.into_iter().collect(),
            category_revenue: BTreeMap::from([(
                "chemicals".to_owned(),
                Decimal::new(revenue, 0),
            )]),
            ..PeriodFacts::default()
        },
        prior: PeriodFacts {
            revenue: Decimal::new(revenue, 0),
            order_dates: [date(2024, 5, 2)].into_iter().collect(),
            category_revenue: BTreeMap::from([(
                "chemicals".to_owned(),
                Decimal::new(revenue, 0),
            )]),
            ..PeriodFacts::default()
        },
    };

    PortfolioSnapshot {
        as_of: date(2025, 12, 31),
        entities: vec![
            entity("fixture-a", 48_000, (1..=12).map(|m| date(2025, m, 10)).collect()),
            entity("fixture-b", 6_000, vec![date(2025, 3, 1)]),
        ],
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::with_capacity(report.checks.len() + 1);
    lines.push(report.summary.clone());
    for check in &report.checks {
        let status = match check.status {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("  [{status}] {}: {}", check.name, check.details));
    }
    lines.join("\n")
}
