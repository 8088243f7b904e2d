//! Utilities for Stepbot.
//!
//! Submodules:
//! - `keys`: Key-name parsing into Enigo keys (`"ctrl"`, `"F5"`, `"a"`, ...).
//! - `tree`: Pre-order traversal helpers over a step tree.

pub mod keys;
pub mod tree;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
