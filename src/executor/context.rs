use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::model::{Script, StepId};

/// Lifecycle state of the executor.
///
/// `Stopped` is transient: it marks a run that has been asked to end and settles
/// to `Idle` once the foreground task has unwound.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionState::Idle => "IDLE",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Paused => "PAUSED",
            ExecutionState::Stopped => "STOPPED",
        })
    }
}

/// Snapshot of the executor's progress.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionContext {
    /// Script of the current (or last) run.
    #[serde(skip)]
    pub script: Option<Arc<Script>>,
    /// Last foreground step entered. Observer actions never update it.
    pub current_step_id: Option<StepId>,
    pub state: ExecutionState,
    /// Iterations started in the current run, including one cut short by a pause.
    pub iteration_count: u64,
}

impl ExecutionContext {
    pub fn script_name(&self) -> Option<&str> {
        self.script.as_deref().map(|s| s.name.as_str())
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state={} script={} iteration={} step={}",
            self.state,
            self.script_name().unwrap_or("-"),
            self.iteration_count,
            self.current_step_id
                .as_ref()
                .map_or("-", |id| id.as_str())
        )
    }
}
