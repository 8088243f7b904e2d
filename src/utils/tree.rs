//! Generic traversal over a step tree.
//!
//! Traversal uses an explicit stack, so arbitrarily deep trees do not grow the call stack.

use crate::model::Step;

/// A step reached during traversal together with its place in the tree.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    pub step: &'a Step,
    /// Nesting depth; top-level steps are at depth 0.
    pub depth: usize,
    /// 0-based index among the siblings of the same child list.
    pub position: usize,
}

/// Pre-order iterator over every step in `steps` and their descendants.
pub struct Walk<'a> {
    stack: Vec<Visit<'a>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = Visit<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let visit = self.stack.pop()?;
        // Push in reverse so children come out in declaration order.
        for list in visit.step.child_lists().into_iter().rev() {
            for (position, step) in list.iter().enumerate().rev() {
                self.stack.push(Visit {
                    step,
                    depth: visit.depth + 1,
                    position,
                });
            }
        }
        Some(visit)
    }
}

/// Walk `steps` in pre-order (parents before children, siblings in declaration order).
pub fn walk(steps: &[Step]) -> Walk<'_> {
    let stack = steps
        .iter()
        .enumerate()
        .rev()
        .map(|(position, step)| Visit {
            step,
            depth: 0,
            position,
        })
        .collect();
    Walk { stack }
}

/// Call `f` on every step in the tree, parents before children.
pub fn for_each_mut(steps: &mut [Step], mut f: impl FnMut(&mut Step)) {
    let mut stack: Vec<&mut Step> = steps.iter_mut().rev().collect();
    while let Some(step) = stack.pop() {
        f(&mut *step);
        stack.extend(step.children_mut().into_iter().rev());
    }
}
