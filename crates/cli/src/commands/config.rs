use std::path::Path;

use serde::Serialize;

use super::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigPayload {
    command: &'static str,
    status: &'static str,
    /// Where the effective values came from: a file path or "defaults".
    config_source: String,
    effective: serde_json::Value,
    effective_toml: String,
}

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let (config, config_source) = match load_config(config_path) {
        Ok(loaded) => loaded,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2);
        }
    };

    let effective = match serde_json::to_value(&config) {
        Ok(value) => value,
        Err(error) => {
            return CommandResult::failure("config", "serialization", error.to_string(), 1);
        }
    };
    // The TOML rendering is copy-pasteable back into accountpulse.toml.
    let effective_toml = toml::to_string_pretty(&config).unwrap_or_default();

    CommandResult::success_payload(&ConfigPayload {
        command: "config",
        status: "ok",
        config_source,
        effective,
        effective_toml,
    })
}
