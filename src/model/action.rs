use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::condition::ElementIdentifier;
use super::step::StepId;

/// A single concrete thing a step does.
///
/// Serialized with a `category` tag selecting the family and a `type` tag selecting
/// the action inside it: `{ "category": "system", "type": "wait", "milliseconds": 250 }`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Action {
    Mouse(MouseAction),
    Keyboard(KeyboardAction),
    System(SystemAction),
    Flow(FlowAction),
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MouseAction {
    LeftClick { target: ElementIdentifier },
    RightClick { target: ElementIdentifier },
    DoubleClick { target: ElementIdentifier },
    MoveTo { target: ElementIdentifier },
    Drag {
        from: ElementIdentifier,
        to: ElementIdentifier,
    },
    /// Scroll the wheel `amount` notches at the current cursor position.
    Scroll {
        amount: i32,
        direction: ScrollDirection,
    },
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyboardAction {
    TypeText { text: String },
    PressKey { key: String },
    PressKeyCombination { keys: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemAction {
    Wait {
        milliseconds: u64,
    },
    LaunchApplication {
        path: String,
        #[serde(default)]
        args: Vec<String>,
    },
    CloseApplication {
        #[serde(rename = "processName")]
        process_name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowAction {
    Stop,
    JumpTo {
        #[serde(rename = "targetStepId")]
        target_step_id: StepId,
    },
    Continue,
}

impl Action {
    pub fn wait(milliseconds: u64) -> Self {
        Action::System(SystemAction::Wait { milliseconds })
    }

    pub fn left_click(target: ElementIdentifier) -> Self {
        Action::Mouse(MouseAction::LeftClick { target })
    }

    /// Short display name, used in logs when a step has no label.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Mouse(m) => match m {
                MouseAction::LeftClick { .. } => "LeftClick",
                MouseAction::RightClick { .. } => "RightClick",
                MouseAction::DoubleClick { .. } => "DoubleClick",
                MouseAction::MoveTo { .. } => "MoveTo",
                MouseAction::Drag { .. } => "Drag",
                MouseAction::Scroll { .. } => "Scroll",
            },
            Action::Keyboard(k) => match k {
                KeyboardAction::TypeText { .. } => "TypeText",
                KeyboardAction::PressKey { .. } => "PressKey",
                KeyboardAction::PressKeyCombination { .. } => "PressKeyCombination",
            },
            Action::System(s) => match s {
                SystemAction::Wait { .. } => "Wait",
                SystemAction::LaunchApplication { .. } => "LaunchApplication",
                SystemAction::CloseApplication { .. } => "CloseApplication",
            },
            Action::Flow(f) => match f {
                FlowAction::Stop => "Stop",
                FlowAction::JumpTo { .. } => "JumpTo",
                FlowAction::Continue => "Continue",
            },
        }
    }

    /// Element identifiers this action needs resolved, in dispatch order.
    pub fn targets(&self) -> Vec<&ElementIdentifier> {
        match self {
            Action::Mouse(
                MouseAction::LeftClick { target }
                | MouseAction::RightClick { target }
                | MouseAction::DoubleClick { target }
                | MouseAction::MoveTo { target },
            ) => vec![target],
            Action::Mouse(MouseAction::Drag { from, to }) => vec![from, to],
            _ => Vec::new(),
        }
    }

    pub fn targets_mut(&mut self) -> Vec<&mut ElementIdentifier> {
        match self {
            Action::Mouse(
                MouseAction::LeftClick { target }
                | MouseAction::RightClick { target }
                | MouseAction::DoubleClick { target }
                | MouseAction::MoveTo { target },
            ) => vec![target],
            Action::Mouse(MouseAction::Drag { from, to }) => vec![from, to],
            _ => Vec::new(),
        }
    }

    /// Whether this action drives the physical mouse or keyboard.
    pub fn is_input(&self) -> bool {
        matches!(self, Action::Mouse(_) | Action::Keyboard(_))
    }
}
