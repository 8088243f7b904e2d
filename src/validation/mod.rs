/*!
Static script validation.

Validation is advisory: the executor runs whatever it is given. Callers (the CLI,
an editor) decide whether errors block a run.

- `script`: whole-tree checks (name, duplicate ids/labels, jump targets).
- `step`: per-step structural rules, applied recursively.
*/

pub mod script;
pub mod step;

use serde::Serialize;
use std::fmt;

pub use script::validate_script;
pub use step::validate_step;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub message: String,
    pub field: Option<String>,
    pub severity: Severity,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>, field: &str) -> Self {
        Self {
            message: message.into(),
            field: Some(field.to_owned()),
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>, field: &str) -> Self {
        Self {
            message: message.into(),
            field: Some(field.to_owned()),
            severity: Severity::Warning,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.field {
            Some(field) => write!(f, "{level} [{field}]: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

/// All findings for a script or step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// True when there are no issues at all (warnings included).
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: ValidationResult) {
        self.issues.extend(other.issues);
    }

    /// Whether any issue message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.issues.iter().any(|i| i.message.contains(needle))
    }
}
