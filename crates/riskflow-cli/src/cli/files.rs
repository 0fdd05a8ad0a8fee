//! Loading graphs, fixtures, envelopes and configuration from disk.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;

use riskflow_core::collaborator::fixture::FixtureCollaborators;
use riskflow_types::config::EngineConfig;
use riskflow_types::workflow::WorkflowGraph;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "riskflow.toml";

/// Load the engine config. A missing default file yields the defaults; a
/// missing explicit file is an error.
pub fn load_engine_config(path: Option<&Path>) -> Result<EngineConfig> {
    let path = match path {
        Some(path) => path,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(EngineConfig::default());
            }
            default
        }
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Loading engine config");
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

/// Parse a graph definition. `.yaml`/`.yml` files are YAML, anything else JSON.
pub fn load_graph(path: &Path) -> Result<WorkflowGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    );
    if is_yaml {
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Invalid graph YAML in {}", path.display()))
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid graph JSON in {}", path.display()))
    }
}

pub fn load_fixtures(path: Option<&Path>) -> Result<FixtureCollaborators> {
    match path {
        Some(path) => read_json_file(path),
        None => Ok(FixtureCollaborators::new()),
    }
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Interpret an argument as a path to a JSON file when such a file exists,
/// otherwise as inline JSON.
pub fn json_arg(arg: &str) -> Result<Value> {
    let path = Path::new(arg);
    if path.is_file() {
        return read_json_file(path);
    }
    serde_json::from_str(arg).with_context(|| format!("'{arg}' is neither a file nor valid JSON"))
}

/// Like [`json_arg`] but requires a JSON object.
pub fn json_object_arg(arg: &str, what: &str) -> Result<Value> {
    let value = json_arg(arg)?;
    if !value.is_object() {
        bail!("{what} must be a JSON object");
    }
    Ok(value)
}
