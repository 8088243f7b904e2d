use super::{ValidationIssue, ValidationResult};
use crate::model::{Action, Condition, ElementIdentifier, KeyboardAction, Step};
use crate::utils::tree;

/// Structural rules for `step` and all of its descendants.
///
/// - group blocks need a non-blank name (error)
/// - empty conditional (both branches), observer or group bodies are warnings
/// - image thresholds must lie in `[0, 1]` (error)
/// - key combinations must not be empty (error)
pub fn validate_step(step: &Step) -> ValidationResult {
    let mut result = ValidationResult::default();
    for visit in tree::walk(std::slice::from_ref(step)) {
        check_one(visit.step, &mut result);
    }
    result
}

fn check_one(step: &Step, result: &mut ValidationResult) {
    match step {
        Step::Action(s) => {
            for target in s.action.targets() {
                check_identifier(target, result);
            }
            if let Action::Keyboard(KeyboardAction::PressKeyCombination { keys }) = &s.action {
                if keys.is_empty() {
                    result.push(ValidationIssue::error(
                        format!("Key combination is empty in step {}", s.id),
                        "keys",
                    ));
                }
            }
        }
        Step::Conditional(b) => {
            check_condition(&b.condition, result);
            if b.then_steps.is_empty() && b.else_steps.is_empty() {
                result.push(ValidationIssue::warning(
                    "Conditional block must have at least one branch with steps",
                    "thenSteps/elseSteps",
                ));
            }
        }
        Step::Observer(b) => {
            check_condition(&b.condition, result);
            if b.action_steps.is_empty() {
                result.push(ValidationIssue::warning(
                    "Observer block must have at least one action step",
                    "actionSteps",
                ));
            }
        }
        Step::Group(b) => {
            if b.name.trim().is_empty() {
                result.push(ValidationIssue::error("Group block must have a name", "name"));
            }
            if b.steps.is_empty() {
                result.push(ValidationIssue::warning(
                    "Group block should contain at least one step",
                    "steps",
                ));
            }
        }
    }
}

fn check_condition(condition: &Condition, result: &mut ValidationResult) {
    condition.for_each_identifier(&mut |id| check_identifier(id, result));
}

fn check_identifier(identifier: &ElementIdentifier, result: &mut ValidationResult) {
    if let ElementIdentifier::ByImage(pattern) = identifier {
        if let Some(threshold) = pattern.match_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                result.push(ValidationIssue::error(
                    format!("Match threshold must be between 0 and 1, got {threshold}"),
                    "matchThreshold",
                ));
            }
        }
    }
}
