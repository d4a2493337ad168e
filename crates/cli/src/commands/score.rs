use std::path::Path;

use accountpulse_core::pipeline::{InsightPipeline, PortfolioReport, PortfolioSnapshot};
use serde::Serialize;

use super::{load_config, read_json_file, CommandResult};

#[derive(Debug, Serialize)]
struct ScorePayload {
    command: &'static str,
    status: &'static str,
    run_id: String,
    config_source: String,
    report: PortfolioReport,
}

pub fn run(
    snapshot_path: &Path,
    config_path: Option<&Path>,
    max_actions: Option<usize>,
) -> CommandResult {
    let (mut config, config_source) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::failure("score", "config_validation", error.to_string(), 2);
        }
    };
    if let Some(max_actions) = max_actions {
        config.pipeline.max_actions = max_actions;
        if let Err(error) = config.validate() {
            return CommandResult::failure("score", "config_validation", error.to_string(), 2);
        }
    }

    let snapshot: PortfolioSnapshot = match read_json_file(snapshot_path, "snapshot") {
        Ok(snapshot) => snapshot,
        Err(message) => return CommandResult::failure("score", "snapshot_input", message, 1),
    };

    let pipeline = InsightPipeline::from_config(&config);
    let report = match pipeline.analyze(&snapshot) {
        Ok(report) => report,
        Err(error) => {
            return CommandResult::failure("score", "invalid_facts", error.to_string(), 1);
        }
    };

    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        event_name = "engine.score.completed",
        run_id = %run_id,
        entities = report.entity_count,
        actions = report.actions.len(),
        "portfolio scoring completed"
    );

    CommandResult::success_payload(&ScorePayload {
        command: "score",
        status: "ok",
        run_id,
        config_source,
        report,
    })
}
