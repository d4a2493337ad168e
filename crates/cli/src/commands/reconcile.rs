use std::path::Path;

use accountpulse_core::reconcile::{
    FuzzyReconciler, ReconciliationReport, SourceRecord, TargetIndex, TargetRecord,
};
use serde::Serialize;

use super::{load_config, read_json_file, CommandResult};

#[derive(Debug, Serialize)]
struct ReconcilePayload {
    command: &'static str,
    status: &'static str,
    run_id: String,
    config_source: String,
    source_count: usize,
    target_count: usize,
    report: ReconciliationReport,
}

pub fn run(
    sources_path: &Path,
    targets_path: &Path,
    config_path: Option<&Path>,
) -> CommandResult {
    let (config, config_source) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::failure("reconcile", "config_validation", error.to_string(), 2);
        }
    };

    let sources: Vec<SourceRecord> = match read_json_file(sources_path, "source records") {
        Ok(records) => records,
        Err(message) => return CommandResult::failure("reconcile", "source_input", message, 1),
    };
    let targets: Vec<TargetRecord> = match read_json_file(targets_path, "target records") {
        Ok(records) => records,
        Err(message) => return CommandResult::failure("reconcile", "target_input", message, 1),
    };

    let source_count = sources.len();
    let target_count = targets.len();
    let index = TargetIndex::build(targets);
    let reconciler = FuzzyReconciler::new(config.reconciler);
    let report = reconciler.reconcile_batch(&sources, &index);

    let run_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        event_name = "engine.reconcile.completed",
        run_id = %run_id,
        matched = report.matched.len(),
        unmatched_sources = report.unmatched_sources.len(),
        unmatched_targets = report.unmatched_targets.len(),
        "reconciliation completed"
    );

    CommandResult::success_payload(&ReconcilePayload {
        command: "reconcile",
        status: "ok",
        run_id,
        config_source,
        source_count,
        target_count,
        report,
    })
}
