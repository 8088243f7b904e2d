use std::collections::HashMap;

use crate::model::{Step, StepId};
use crate::utils::tree;

/// Priority of an observer at `depth` (top level is 0) and `position` among its siblings.
///
/// Deeper observers outrank shallower ones; within a level, earlier siblings win.
pub fn calculate_priority(depth: usize, position: usize) -> i32 {
    let depth = i32::try_from(depth).unwrap_or(i32::MAX / 1000);
    let position = i32::try_from(position).unwrap_or(999);
    depth.saturating_mul(1000).saturating_sub(position)
}

/// Priority for every observer block in the tree, keyed by id.
///
/// When ids repeat (an invalid script) the first occurrence wins.
pub fn observer_priorities(steps: &[Step]) -> HashMap<StepId, i32> {
    let mut priorities = HashMap::new();
    for visit in tree::walk(steps) {
        if let Step::Observer(block) = visit.step {
            priorities
                .entry(block.id.clone())
                .or_insert_with(|| calculate_priority(visit.depth, visit.position));
        }
    }
    priorities
}
