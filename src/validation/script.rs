use std::collections::HashSet;

use super::{ValidationIssue, ValidationResult, validate_step};
use crate::model::{Action, FlowAction, Script, Step};
use crate::utils::tree;

/// Validate a whole script.
///
/// Reports every issue found instead of stopping at the first one.
pub fn validate_script(script: &Script) -> ValidationResult {
    let mut result = ValidationResult::default();

    if script.name.trim().is_empty() {
        result.push(ValidationIssue::error("Script must have a name", "name"));
    }
    if script.steps.is_empty() {
        result.push(ValidationIssue::warning(
            "Script should contain at least one step",
            "steps",
        ));
    }

    let default_threshold = script.settings.default_image_match_threshold;
    if !(0.0..=1.0).contains(&default_threshold) {
        result.push(ValidationIssue::error(
            format!("Default match threshold must be between 0 and 1, got {default_threshold}"),
            "defaultImageMatchThreshold",
        ));
    }

    let mut ids = HashSet::new();
    let mut labels = HashSet::new();
    for visit in tree::walk(&script.steps) {
        let step = visit.step;
        if !ids.insert(step.id()) {
            result.push(ValidationIssue::error(
                format!("Duplicate step ID: {}", step.id()),
                "id",
            ));
        }
        match step.label() {
            Some(label) if label.trim().is_empty() => {
                result.push(ValidationIssue::error("Label cannot be empty", "label"));
            }
            Some(label) => {
                if !labels.insert(label) {
                    result.push(ValidationIssue::error(
                        format!("Duplicate label: {label}"),
                        "label",
                    ));
                }
            }
            None => {}
        }
    }

    // Jump targets may point anywhere in the tree, including later steps.
    for visit in tree::walk(&script.steps) {
        if let Step::Action(s) = visit.step {
            if let Action::Flow(FlowAction::JumpTo { target_step_id }) = &s.action {
                if !ids.contains(target_step_id) {
                    result.push(ValidationIssue::error(
                        format!("Jump target step not found: {target_step_id}"),
                        "targetStepId",
                    ));
                }
            }
        }
    }

    for step in &script.steps {
        result.extend(validate_step(step));
    }

    result
}
