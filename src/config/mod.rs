//! Configuration module for Stepbot.
//!
//! This module wires together the engine configuration models and the loading /
//! validation helpers used by the binary. Scripts are loaded through the same loader.
//!
//! Example:
//! use stepbot::config::{EngineConfig, load_from_path};
//!
//! let cfg = load_from_path("config/engine.json")?;

pub mod loader;
pub mod models;

// Re-export core data models
pub use models::{EngineConfig, ExecutorConfig, InputConfig, LogLevel, LoggingConfig, ObserverConfig};

// Re-export loader utilities
pub use loader::{
    generate_schema, generate_script_schema, load_from_path, load_from_path_async,
    load_from_reader, load_from_str, load_script_from_path, load_script_from_path_async, load_script_from_str,
    validate_config, write_schema_to_writer,
};
