//! Script model for Stepbot.
//!
//! The model is plain data: a `Script` owns a tree of `Step`s, each step either
//! performs an `Action`, branches on a `Condition`, registers a background observer
//! or groups child steps. Nothing here has behavior beyond small accessors; the
//! executor, validator and observer subsystem interpret the tree.
//!
//! All types serialize to JSON with a `type` tag per variant (actions additionally
//! carry a `category` tag), e.g.:
//!
//! ```json
//! {
//!   "type": "action",
//!   "id": "click-ok",
//!   "action": { "category": "mouse", "type": "left_click",
//!               "target": { "type": "by_coordinate", "x": 10, "y": 20 } }
//! }
//! ```

pub mod action;
pub mod condition;
pub mod script;
pub mod step;

pub use action::{Action, FlowAction, KeyboardAction, MouseAction, ScrollDirection, SystemAction};
pub use condition::{Condition, Coordinate, ElementIdentifier, ImagePattern};
pub use script::{Script, ScriptSettings};
pub use step::{ActionStep, ConditionalBlock, GroupBlock, ObserverBlock, Step, StepId};
