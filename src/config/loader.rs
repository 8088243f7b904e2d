use anyhow::{Context, Result, anyhow};
use schemars::{Schema, schema_for};
use serde_valid::Validate;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::EngineConfig;
use crate::model::Script;

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<EngineConfig> {
    let cfg: EngineConfig =
        serde_json::from_str(s).context("Failed to parse JSON config string into EngineConfig")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<EngineConfig> {
    let cfg: EngineConfig =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!(target: "stepbot::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path_ref = path.as_ref();
    let bytes = tokio::fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;
    let cfg: EngineConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path_ref.display()))?;
    validate_config(&cfg)?;
    debug!(target: "stepbot::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load a script from a JSON file synchronously.
pub fn load_script_from_path<P: AsRef<Path>>(path: P) -> Result<Script> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open script file {}", path_ref.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file))
        .with_context(|| format!("Failed to parse script JSON from {}", path_ref.display()))
}

/// Load a script from a JSON file asynchronously.
///
/// Only parsing happens here; structural checks are the job of `validation::validate_script`.
pub async fn load_script_from_path_async<P: AsRef<Path>>(path: P) -> Result<Script> {
    let path_ref = path.as_ref();
    let bytes = tokio::fs::read(path_ref)
        .await
        .with_context(|| format!("Failed to read script file {}", path_ref.display()))?;
    let script: Script = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse script JSON from {}", path_ref.display()))?;
    debug!(
        target: "stepbot::config",
        script = %script.name, steps = script.steps.len(),
        "Loaded script from {}", path_ref.display()
    );
    Ok(script)
}

/// Parse a script from a JSON string.
pub fn load_script_from_str(s: &str) -> Result<Script> {
    serde_json::from_str(s).context("Failed to parse script JSON string")
}

/// Generate the JSON Schema for the engine configuration.
pub fn generate_schema() -> Schema {
    schema_for!(EngineConfig)
}

/// Generate the JSON Schema for scripts (for editors and external tooling).
pub fn generate_script_schema() -> Schema {
    schema_for!(Script)
}

/// Write a schema to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(schema: &Schema, mut writer: W) -> Result<()> {
    let json = serde_json::to_string_pretty(schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Check field ranges (declared on the models with `serde_valid`).
pub fn validate_config(cfg: &EngineConfig) -> Result<()> {
    cfg.validate()
        .map_err(|errors| anyhow!("Invalid configuration: {errors}"))
}
