//! Execution journal: the structured record of what a run did.
//!
//! The executor reports lifecycle changes, step outcomes and observer triggers to an
//! [`EventSink`]. [`ExecutionJournal`] is the in-memory implementation: a ring buffer
//! that drops its oldest entry once `capacity` is reached.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::model::StepId;
use crate::utils::lock;

/// Default number of entries kept by [`ExecutionJournal`].
pub const DEFAULT_CAPACITY: usize = 1000;

/// Something observable that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    ScriptStarted { name: String },
    ScriptStopped,
    ScriptPaused,
    ScriptResumed,
    StepSucceeded { step: String, duration_ms: u64 },
    StepFailed { step: String, duration_ms: u64, error: String },
    ObserverTriggered { observer_id: StepId },
}

impl ExecutionEvent {
    pub(crate) fn step_succeeded(step: impl Into<String>, elapsed: Duration) -> Self {
        Self::StepSucceeded {
            step: step.into(),
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub(crate) fn step_failed(
        step: impl Into<String>,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self::StepFailed {
            step: step.into(),
            duration_ms: elapsed.as_millis() as u64,
            error: error.into(),
        }
    }
}

impl fmt::Display for ExecutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScriptStarted { name } => write!(f, "Script started: {name}"),
            Self::ScriptStopped => f.write_str("Script stopped"),
            Self::ScriptPaused => f.write_str("Script paused"),
            Self::ScriptResumed => f.write_str("Script resumed"),
            Self::StepSucceeded { step, duration_ms } => {
                write!(f, "{step} succeeded in {duration_ms}ms")
            }
            Self::StepFailed {
                step,
                duration_ms,
                error,
            } => write!(f, "{step} failed after {duration_ms}ms: {error}"),
            Self::ObserverTriggered { observer_id } => {
                write!(f, "Observer triggered: {observer_id}")
            }
        }
    }
}

/// A timestamped event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    #[serde(flatten)]
    pub event: ExecutionEvent,
}

/// Receiver of execution events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: ExecutionEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: ExecutionEvent) {}
}

/// Bounded in-memory event log.
#[derive(Debug)]
pub struct ExecutionJournal {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ExecutionJournal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Copy of the current entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).iter().cloned().collect()
    }

    /// Just the events, oldest first.
    pub fn events(&self) -> Vec<ExecutionEvent> {
        lock(&self.entries).iter().map(|e| e.event.clone()).collect()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

impl Default for ExecutionJournal {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventSink for ExecutionJournal {
    fn record(&self, event: ExecutionEvent) {
        let mut entries = lock(&self.entries);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(LogEntry {
            timestamp: Local::now(),
            event,
        });
    }
}
