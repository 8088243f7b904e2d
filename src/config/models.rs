use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::time::Duration;

use crate::model::ScriptSettings;

/// Root engine configuration for Stepbot.
///
/// Deserialized from a JSON file; every section and field has a default, so `{}` is a
/// valid configuration. It captures the knobs the runtime needs:
/// - `executor`: foreground loop timing
/// - `observer`: background polling timing
/// - `input`: input-injection pacing and dry-run mode
/// - `logging`: log level and journal size
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    #[validate]
    pub executor: ExecutorConfig,

    #[serde(default)]
    #[validate]
    pub observer: ObserverConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    #[validate]
    pub logging: LoggingConfig,
}

/// Foreground loop timing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct ExecutorConfig {
    /// How often a paused loop re-checks its state, in milliseconds (default: 100).
    #[serde(default = "default_pause_poll_ms")]
    #[validate(minimum = 1)]
    pub pause_poll_ms: u64,

    /// Extra sleep between iterations, in milliseconds (default: 0).
    #[serde(default)]
    pub iteration_delay_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pause_poll_ms: default_pause_poll_ms(),
            iteration_delay_ms: 0,
        }
    }
}

impl ExecutorConfig {
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    pub fn iteration_delay(&self) -> Duration {
        Duration::from_millis(self.iteration_delay_ms)
    }
}

/// Background observer polling.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct ObserverConfig {
    /// Delay between the end of one tick and the start of the next, in milliseconds
    /// (default: 1000). A script's own `observerCheckDelay` setting wins.
    #[serde(default = "default_check_delay_ms")]
    #[validate(minimum = 1)]
    pub check_delay_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            check_delay_ms: default_check_delay_ms(),
        }
    }
}

impl ObserverConfig {
    pub fn check_delay(&self) -> Duration {
        Duration::from_millis(self.check_delay_ms)
    }

    /// Tick delay for one script: its `observerCheckDelay` when set and non-zero,
    /// otherwise the configured delay.
    pub fn check_delay_for(&self, settings: &ScriptSettings) -> Duration {
        settings
            .observer_check_delay
            .filter(|ms| *ms > 0)
            .map_or_else(|| self.check_delay(), Duration::from_millis)
    }
}

/// Pacing of simulated input. Down/up event pairs are separated by these delays so
/// target applications register them reliably.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct InputConfig {
    /// Log actions instead of simulating input (default: false).
    #[serde(default)]
    pub dry_run: bool,
    /// Time a mouse button is held during a click (default: 50).
    #[serde(default = "default_click_hold_ms")]
    pub click_hold_ms: u64,
    /// Gap between the two clicks of a double click (default: 100).
    #[serde(default = "default_double_click_gap_ms")]
    pub double_click_gap_ms: u64,
    /// Settle time after reaching the drag origin (default: 100).
    #[serde(default = "default_drag_settle_ms")]
    pub drag_settle_ms: u64,
    /// Time a key is held during a key press (default: 50).
    #[serde(default = "default_key_hold_ms")]
    pub key_hold_ms: u64,
    /// Gap between keys of a combination (default: 20).
    #[serde(default = "default_key_gap_ms")]
    pub key_gap_ms: u64,
    /// Delay between typed characters (default: 20).
    #[serde(default = "default_type_delay_ms")]
    pub type_delay_ms: u64,
    /// Random extra delay in `[0, jitter_ms]` added between typed characters (default: 0).
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            click_hold_ms: default_click_hold_ms(),
            double_click_gap_ms: default_double_click_gap_ms(),
            drag_settle_ms: default_drag_settle_ms(),
            key_hold_ms: default_key_hold_ms(),
            key_gap_ms: default_key_gap_ms(),
            type_delay_ms: default_type_delay_ms(),
            jitter_ms: 0,
        }
    }
}

/// Logging and journal settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace|debug|info|warn|error). Falls back to `RUST_LOG`, then `info`.
    #[serde(default)]
    pub level: Option<LogLevel>,

    /// Number of execution events kept in memory (default: 1000).
    #[serde(default = "default_max_entries")]
    #[validate(minimum = 1)]
    pub max_entries: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            max_entries: default_max_entries(),
        }
    }
}

/// Logging level enumeration.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name; `warning` is accepted as `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

fn default_pause_poll_ms() -> u64 {
    100
}
fn default_check_delay_ms() -> u64 {
    1000
}
fn default_click_hold_ms() -> u64 {
    50
}
fn default_double_click_gap_ms() -> u64 {
    100
}
fn default_drag_settle_ms() -> u64 {
    100
}
fn default_key_hold_ms() -> u64 {
    50
}
fn default_key_gap_ms() -> u64 {
    20
}
fn default_type_delay_ms() -> u64 {
    20
}
fn default_max_entries() -> usize {
    1000
}
