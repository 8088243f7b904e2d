#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Stepbot: a desktop-automation script engine built on Enigo.
//!
//! A script is a tree of steps (actions, conditionals, groups and background
//! observers). The executor loops over it until stopped, resolving on-screen elements
//! by coordinate or by template matching, while observers watch the screen and run
//! their own steps when their condition appears.
//!
//! Modules:
//! - `model`: Script data model (serde/JSON).
//! - `config`: Engine configuration models, loader, and schema helpers.
//! - `executor`: Script execution engine (lifecycle, conditions, dispatch, input).
//! - `observer`: Background observer registry and polling.
//! - `validation`: Static script checks.
//! - `vision`: Screen capture and template matching.
//! - `journal`: Structured execution events.
//! - `control`: Line-based pause/resume/stop commands.
//! - `utils`: Key parsing and tree traversal helpers.
//!
//! Use `stepbot::prelude::*` to bring commonly used items into scope quickly.

/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: stdin control channel.
pub mod control;
/// Public module: typed engine errors.
pub mod error;
/// Public module: execution engine.
pub mod executor;
/// Public module: execution event journal.
pub mod journal;
/// Public module: script data model.
pub mod model;
/// Public module: background observers.
pub mod observer;
/// Public module: utilities (key parsing, tree traversal).
pub mod utils;
/// Public module: script validation.
pub mod validation;
/// Public module: screen capture and matching.
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Initialize tracing (logging).
/// - An explicit `level` wins.
/// - Otherwise honors the `RUST_LOG` environment variable if it names a level.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing(level: Option<config::LogLevel>) {
    use tracing::Level;
    use tracing_subscriber::fmt;

    let level = level
        .or_else(|| {
            std::env::var("RUST_LOG")
                .ok()
                .and_then(|s| config::LogLevel::parse(&s))
        })
        .map(Level::from)
        .unwrap_or(Level::INFO);

    // Ignore the error if the global subscriber was already set.
    let _ = fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use stepbot::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use crate::error::{EngineError, EngineResult};
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;
    pub use tokio::time::sleep;

    // External crates (namespaced) if callers want direct access
    pub use crate as stepbot;
    pub use enigo;

    // Core types
    pub use crate::executor::{ExecutionState, ScriptExecutor};
    pub use crate::model::{Action, Condition, ElementIdentifier, Script, Step, StepId};

    // Frequently used internal modules
    pub use crate::{config, executor, model, observer, utils, validation};
}
