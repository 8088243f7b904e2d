use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::action::Action;
use super::condition::Condition;

/// Identifier of a step, unique within one script tree.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One node of the script tree.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Action(ActionStep),
    Conditional(ConditionalBlock),
    Observer(ObserverBlock),
    Group(GroupBlock),
}

/// Leaf step executing a single action.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Milliseconds to wait before the action. Unset takes the script default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_before: Option<u64>,
    /// Milliseconds to wait after the action. Unset takes the script default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after: Option<u64>,
    pub action: Action,
}

/// Runs `then_steps` when the condition holds, `else_steps` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBlock {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after: Option<u64>,
    pub condition: Condition,
    #[serde(default)]
    pub then_steps: Vec<Step>,
    #[serde(default)]
    pub else_steps: Vec<Step>,
}

/// Registers a background watcher; `action_steps` run whenever the condition fires.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObserverBlock {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after: Option<u64>,
    pub condition: Condition,
    #[serde(default)]
    pub action_steps: Vec<Step>,
}

/// Purely organizational sequential container.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupBlock {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Step {
    pub fn action(id: impl Into<String>, action: Action) -> Self {
        Step::Action(ActionStep {
            id: StepId::new(id),
            label: None,
            delay_before: None,
            delay_after: None,
            action,
        })
    }

    pub fn conditional(
        id: impl Into<String>,
        condition: Condition,
        then_steps: Vec<Step>,
        else_steps: Vec<Step>,
    ) -> Self {
        Step::Conditional(ConditionalBlock {
            id: StepId::new(id),
            label: None,
            delay_before: None,
            delay_after: None,
            condition,
            then_steps,
            else_steps,
        })
    }

    pub fn observer(id: impl Into<String>, condition: Condition, action_steps: Vec<Step>) -> Self {
        Step::Observer(ObserverBlock {
            id: StepId::new(id),
            label: None,
            delay_before: None,
            delay_after: None,
            condition,
            action_steps,
        })
    }

    pub fn group(id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Step::Group(GroupBlock {
            id: StepId::new(id),
            label: None,
            delay_before: None,
            delay_after: None,
            name: name.into(),
            steps,
        })
    }

    /// Builder-style label setter.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = Some(label.into());
        match &mut self {
            Step::Action(s) => s.label = label,
            Step::Conditional(s) => s.label = label,
            Step::Observer(s) => s.label = label,
            Step::Group(s) => s.label = label,
        }
        self
    }

    /// Set whichever delays are still unset.
    pub fn fill_delays(&mut self, before: u64, after: u64) {
        let (b, a) = match self {
            Step::Action(s) => (&mut s.delay_before, &mut s.delay_after),
            Step::Conditional(s) => (&mut s.delay_before, &mut s.delay_after),
            Step::Observer(s) => (&mut s.delay_before, &mut s.delay_after),
            Step::Group(s) => (&mut s.delay_before, &mut s.delay_after),
        };
        b.get_or_insert(before);
        a.get_or_insert(after);
    }

    pub fn id(&self) -> &StepId {
        match self {
            Step::Action(s) => &s.id,
            Step::Conditional(s) => &s.id,
            Step::Observer(s) => &s.id,
            Step::Group(s) => &s.id,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Step::Action(s) => s.label.as_deref(),
            Step::Conditional(s) => s.label.as_deref(),
            Step::Observer(s) => s.label.as_deref(),
            Step::Group(s) => s.label.as_deref(),
        }
    }

    /// Delay before the step in milliseconds; unset counts as zero.
    pub fn delay_before(&self) -> u64 {
        let delay = match self {
            Step::Action(s) => s.delay_before,
            Step::Conditional(s) => s.delay_before,
            Step::Observer(s) => s.delay_before,
            Step::Group(s) => s.delay_before,
        };
        delay.unwrap_or(0)
    }

    /// Delay after the step in milliseconds; unset counts as zero.
    pub fn delay_after(&self) -> u64 {
        let delay = match self {
            Step::Action(s) => s.delay_after,
            Step::Conditional(s) => s.delay_after,
            Step::Observer(s) => s.delay_after,
            Step::Group(s) => s.delay_after,
        };
        delay.unwrap_or(0)
    }

    /// Label if present, otherwise the id. Used in log records.
    pub fn display_name(&self) -> String {
        match self.label() {
            Some(label) if !label.trim().is_empty() => label.to_owned(),
            _ => self.id().to_string(),
        }
    }

    /// Variant name (`"action"`, `"conditional"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Step::Action(_) => "action",
            Step::Conditional(_) => "conditional",
            Step::Observer(_) => "observer",
            Step::Group(_) => "group",
        }
    }

    /// Direct children in declaration order, then-steps before else-steps.
    pub(crate) fn children_mut(&mut self) -> Vec<&mut Step> {
        match self {
            Step::Action(_) => Vec::new(),
            Step::Conditional(b) => b.then_steps.iter_mut().chain(b.else_steps.iter_mut()).collect(),
            Step::Observer(b) => b.action_steps.iter_mut().collect(),
            Step::Group(b) => b.steps.iter_mut().collect(),
        }
    }

    /// Child lists as separate sibling levels (a conditional has two).
    pub fn child_lists(&self) -> Vec<&[Step]> {
        match self {
            Step::Action(_) => Vec::new(),
            Step::Conditional(b) => vec![b.then_steps.as_slice(), b.else_steps.as_slice()],
            Step::Observer(b) => vec![b.action_steps.as_slice()],
            Step::Group(b) => vec![b.steps.as_slice()],
        }
    }
}
