#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Stepbot.

This module wires together:
- `runtime`: the `ScriptExecutor` lifecycle (start/pause/resume/stop) and the step tree walk
- `condition`: condition evaluation with short-circuiting `And`/`Or`
- `resolver`: element lookup (fixed coordinates, or template matching on a fresh capture)
- `dispatcher`: turning one action plus resolved coordinates into input or OS calls
- `actions`: low-level input injection through Enigo (respecting dry-run)
- `context`: execution state and context snapshots

Typical usage:
- Build the collaborators, hand them to `ScriptExecutor::new`.
- Call `start` with a script from inside a tokio runtime; drive it with `pause`, `resume`, `stop`.

Example:
```no_run
use std::sync::Arc;
use std::time::Duration;
use stepbot::config::InputConfig;
use stepbot::executor::{
    EnigoDriver, InputActionDispatcher, ResolverConditionEvaluator, ScreenElementResolver,
    ScriptExecutor,
};
use stepbot::model::Script;
use stepbot::observer::ObserverManager;

# async fn demo(script: Script) -> Result<(), Box<dyn std::error::Error>> {
let input = Arc::new(EnigoDriver::new(InputConfig { dry_run: true, ..Default::default() })?);
let resolver = Arc::new(ScreenElementResolver::new(stepbot::vision::default_vision()));
let evaluator = Arc::new(ResolverConditionEvaluator::new(resolver.clone()));
let observers = ObserverManager::new(evaluator.clone(), Duration::from_millis(1000));
let executor = ScriptExecutor::new(
    Arc::new(InputActionDispatcher::new(input)),
    resolver,
    evaluator,
    observers,
);
executor.start(script);
# Ok(())
# }
```
*/

pub mod actions;
pub mod condition;
pub mod context;
pub mod dispatcher;
pub mod resolver;
pub mod runtime;

// Re-exports for convenient access from `stepbot::executor::*`
pub use actions::{EnigoDriver, InputDriver};
pub use condition::{ConditionEvaluator, ResolverConditionEvaluator};
pub use context::{ExecutionContext, ExecutionState};
pub use dispatcher::{ActionDispatcher, InputActionDispatcher, ResolvedTarget};
pub use resolver::{ElementResolver, ScreenElementResolver};
pub use runtime::{ExecutorBuilder, ScriptExecutor};
