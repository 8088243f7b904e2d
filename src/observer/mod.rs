//! Background observers.
//!
//! An observer block in a script does not run inline. The executor registers it here
//! and a polling task keeps checking its condition; when it holds, the registered
//! listener (the executor) runs the observer's action steps.

pub mod manager;
pub mod priority;

pub use manager::{ObserverListener, ObserverManager, ObserverState};
pub use priority::{calculate_priority, observer_priorities};
