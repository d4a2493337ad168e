pub mod config;
pub mod doctor;
pub mod reconcile;
pub mod score;

use std::path::Path;

use accountpulse_core::config::{ConfigError, EngineConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success_payload<T: Serialize>(payload: &T) -> Self {
        let output = serde_json::to_string_pretty(payload).unwrap_or_else(|error| {
            format!(
                "{{\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        Self { exit_code: 0, output }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        let output = serde_json::to_string(&payload).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        Self { exit_code, output }
    }
}

pub(crate) fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Effective configuration plus where it came from, shared by every command.
pub(crate) fn load_config(
    explicit: Option<&Path>,
) -> Result<(EngineConfig, String), ConfigError> {
    let resolved =
        accountpulse_core::config::resolve_config_path(explicit.map(Path::to_path_buf));
    let config = match &resolved {
        Some(path) => EngineConfig::load_from_path(path)?,
        None => {
            if let Some(path) = explicit {
                return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
            }
            let config = EngineConfig::default();
            config.validate()?;
            config
        }
    };
    let source = resolved
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    Ok((config, source))
}

/// Read and deserialize a JSON input file, mapping both failure modes onto
/// one error message for the command payload.
pub(crate) fn read_json_file<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|error| format!("could not read {what} file `{}`: {error}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|error| format!("could not parse {what} file `{}`: {error}", path.display()))
}
