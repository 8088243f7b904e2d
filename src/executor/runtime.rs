use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::condition::ConditionEvaluator;
use super::context::{ExecutionContext, ExecutionState};
use super::dispatcher::{ActionDispatcher, ResolvedTarget};
use super::resolver::ElementResolver;
use crate::config::ExecutorConfig;
use crate::journal::{EventSink, ExecutionEvent, NullSink};
use crate::model::{
    Action, ActionStep, Coordinate, ElementIdentifier, FlowAction, ObserverBlock, Script, Step,
    StepId,
};
use crate::observer::{ObserverListener, ObserverManager, calculate_priority, observer_priorities};
use crate::utils::lock;

type StepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Which task a step runs on. Only the foreground run moves `current_step_id`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Lane {
    Foreground,
    Observer,
}

/// One `start`..settle cycle.
struct Run {
    script: Arc<Script>,
    priorities: HashMap<StepId, i32>,
    cancel: CancellationToken,
}

struct Shared {
    context: ExecutionContext,
    run: Option<Arc<Run>>,
}

struct ExecutorInner {
    dispatcher: Arc<dyn ActionDispatcher>,
    resolver: Arc<dyn ElementResolver>,
    evaluator: Arc<dyn ConditionEvaluator>,
    observers: Arc<ObserverManager>,
    events: Arc<dyn EventSink>,
    options: ExecutorConfig,
    shared: Mutex<Shared>,
}

/// Runs a script in an endless loop until stopped.
///
/// The executor is a cheap handle; clones control the same run. `start` spawns the
/// foreground loop on the current tokio runtime and returns immediately. Observer
/// blocks met by the loop are handed to the [`ObserverManager`], whose polling task
/// calls back into the executor to run their action steps.
///
/// Lifecycle: `Idle -> Running <-> Paused -> Stopped -> Idle`. Invalid transitions are
/// logged and ignored.
#[derive(Clone)]
pub struct ScriptExecutor {
    inner: Arc<ExecutorInner>,
}

/// Assembles a [`ScriptExecutor`] from its collaborators.
pub struct ExecutorBuilder {
    dispatcher: Arc<dyn ActionDispatcher>,
    resolver: Arc<dyn ElementResolver>,
    evaluator: Arc<dyn ConditionEvaluator>,
    observers: Arc<ObserverManager>,
    events: Arc<dyn EventSink>,
    options: ExecutorConfig,
}

impl ExecutorBuilder {
    /// Where lifecycle and step events go (default: discarded).
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn options(mut self, options: ExecutorConfig) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ScriptExecutor {
        let inner = Arc::new(ExecutorInner {
            dispatcher: self.dispatcher,
            resolver: self.resolver,
            evaluator: self.evaluator,
            observers: self.observers,
            events: self.events,
            options: self.options,
            shared: Mutex::new(Shared {
                context: ExecutionContext::default(),
                run: None,
            }),
        });
        let listener: Weak<dyn ObserverListener> = Arc::downgrade(&inner) as Weak<ExecutorInner>;
        inner.observers.set_listener(listener);
        ScriptExecutor { inner }
    }
}

impl ScriptExecutor {
    pub fn new(
        dispatcher: Arc<dyn ActionDispatcher>,
        resolver: Arc<dyn ElementResolver>,
        evaluator: Arc<dyn ConditionEvaluator>,
        observers: Arc<ObserverManager>,
    ) -> Self {
        Self::builder(dispatcher, resolver, evaluator, observers).build()
    }

    pub fn builder(
        dispatcher: Arc<dyn ActionDispatcher>,
        resolver: Arc<dyn ElementResolver>,
        evaluator: Arc<dyn ConditionEvaluator>,
        observers: Arc<ObserverManager>,
    ) -> ExecutorBuilder {
        ExecutorBuilder {
            dispatcher,
            resolver,
            evaluator,
            observers,
            events: Arc::new(NullSink),
            options: ExecutorConfig::default(),
        }
    }

    /// Start running `script`. Only valid from `Idle`; returns whether a run started.
    ///
    /// The run works on a copy with the script's settings applied to every step that
    /// leaves a delay or image threshold unset.
    pub fn start(&self, script: impl Into<Arc<Script>>) -> bool {
        let script: Arc<Script> = script.into();
        let script = {
            let mut prepared = Script::clone(&script);
            prepared.apply_settings();
            Arc::new(prepared)
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            error!(
                target: "stepbot::executor",
                script = %script.name,
                "Cannot start: no tokio runtime is running"
            );
            return false;
        };

        let run = {
            let mut shared = lock(&self.inner.shared);
            if shared.context.state != ExecutionState::Idle {
                warn!(
                    target: "stepbot::executor",
                    state = %shared.context.state,
                    "Cannot start: executor is not idle"
                );
                return false;
            }
            let run = Arc::new(Run {
                priorities: observer_priorities(&script.steps),
                script: script.clone(),
                cancel: CancellationToken::new(),
            });
            shared.context = ExecutionContext {
                script: Some(script.clone()),
                current_step_id: None,
                state: ExecutionState::Running,
                iteration_count: 0,
            };
            shared.run = Some(run.clone());
            run
        };

        info!(
            target: "stepbot::executor",
            script = %script.name, steps = script.steps.len(),
            observers = run.priorities.len(),
            "Script started"
        );
        self.inner.events.record(ExecutionEvent::ScriptStarted {
            name: script.name.clone(),
        });

        let inner = self.inner.clone();
        handle.spawn(async move {
            tokio::select! {
                biased;
                _ = run.cancel.cancelled() => {}
                _ = inner.run_loop(&run) => {}
            }
            inner.settle(&run);
        });
        true
    }

    /// `Running -> Paused`. The current iteration ends at the next step boundary.
    pub fn pause(&self) -> bool {
        self.inner
            .transition(ExecutionState::Running, ExecutionState::Paused, ExecutionEvent::ScriptPaused)
    }

    /// `Paused -> Running`. The loop restarts from the first top-level step.
    pub fn resume(&self) -> bool {
        self.inner
            .transition(ExecutionState::Paused, ExecutionState::Running, ExecutionEvent::ScriptResumed)
    }

    /// End the current run from any state. Safe to call repeatedly and from inside a
    /// running step.
    pub fn stop(&self) {
        self.inner.stop();
    }

    pub fn state(&self) -> ExecutionState {
        lock(&self.inner.shared).context.state
    }

    /// Snapshot of the execution context.
    pub fn context(&self) -> ExecutionContext {
        lock(&self.inner.shared).context.clone()
    }

    pub fn observers(&self) -> &Arc<ObserverManager> {
        &self.inner.observers
    }
}

impl ExecutorInner {
    fn transition(&self, from: ExecutionState, to: ExecutionState, event: ExecutionEvent) -> bool {
        {
            let mut shared = lock(&self.shared);
            if shared.context.state != from {
                warn!(
                    target: "stepbot::executor",
                    state = %shared.context.state, requested = %to,
                    "Ignoring invalid state transition"
                );
                return false;
            }
            shared.context.state = to;
        }
        info!(target: "stepbot::executor", state = %to, "{event}");
        self.events.record(event);
        true
    }

    fn stop(&self) {
        let stopped = {
            let mut shared = lock(&self.shared);
            match shared.run.clone() {
                Some(run) => {
                    let was = shared.context.state;
                    shared.context.state = ExecutionState::Stopped;
                    run.cancel.cancel();
                    was != ExecutionState::Stopped
                }
                None => {
                    shared.context.state = ExecutionState::Idle;
                    false
                }
            }
        };
        self.observers.clear_all();
        if stopped {
            info!(target: "stepbot::executor", "Script stopped");
            self.events.record(ExecutionEvent::ScriptStopped);
        } else {
            debug!(target: "stepbot::executor", "Stop requested with no active run");
        }
    }

    /// Called once the foreground task is gone.
    fn settle(&self, run: &Arc<Run>) {
        // An observer block may have registered while the stop was in flight.
        self.observers.clear_all();
        let mut shared = lock(&self.shared);
        if shared.run.as_ref().is_some_and(|r| Arc::ptr_eq(r, run)) {
            shared.run = None;
            shared.context.state = ExecutionState::Idle;
        }
        debug!(
            target: "stepbot::executor",
            iterations = shared.context.iteration_count,
            "Executor settled"
        );
    }

    fn state(&self) -> ExecutionState {
        lock(&self.shared).context.state
    }

    fn should_abort(&self, run: &Run) -> bool {
        run.cancel.is_cancelled() || self.state() == ExecutionState::Paused
    }

    async fn run_loop(&self, run: &Run) {
        loop {
            if run.cancel.is_cancelled() {
                return;
            }
            if self.state() == ExecutionState::Paused {
                tokio::time::sleep(self.options.pause_poll()).await;
                continue;
            }

            for step in &run.script.steps {
                if self.should_abort(run) {
                    break;
                }
                self.execute_step(run, step, Lane::Foreground).await;
            }
            // A stop mid-iteration does not complete it.
            if run.cancel.is_cancelled() {
                return;
            }

            let iteration = {
                let mut shared = lock(&self.shared);
                shared.context.iteration_count += 1;
                shared.context.iteration_count
            };
            trace!(target: "stepbot::executor", iteration, "Iteration finished");

            tokio::task::yield_now().await;
            let delay = self.options.iteration_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn execute_steps(&self, run: &Run, steps: &[Step], lane: Lane) {
        for step in steps {
            if self.should_abort(run) {
                return;
            }
            self.execute_step(run, step, lane).await;
        }
    }

    fn execute_step<'a>(&'a self, run: &'a Run, step: &'a Step, lane: Lane) -> StepFuture<'a> {
        Box::pin(async move {
            if lane == Lane::Foreground {
                lock(&self.shared).context.current_step_id = Some(step.id().clone());
            }
            trace!(
                target: "stepbot::executor",
                step = %step.id(), kind = step.kind(), ?lane,
                "Executing step"
            );
            sleep_ms(step.delay_before()).await;

            match step {
                Step::Action(s) => self.execute_action(step, s).await,
                Step::Conditional(block) => match self.evaluator.evaluate(&block.condition).await {
                    Ok(true) => self.execute_steps(run, &block.then_steps, lane).await,
                    Ok(false) => self.execute_steps(run, &block.else_steps, lane).await,
                    Err(e) => warn!(
                        target: "stepbot::executor",
                        step = %step.display_name(), error = %e,
                        "Condition evaluation failed; skipping block"
                    ),
                },
                Step::Observer(block) => self.register(run, block),
                Step::Group(block) => self.execute_steps(run, &block.steps, lane).await,
            }

            sleep_ms(step.delay_after()).await;
        })
    }

    fn register(&self, run: &Run, block: &ObserverBlock) {
        if run.cancel.is_cancelled() {
            return;
        }
        let priority = run
            .priorities
            .get(&block.id)
            .copied()
            .unwrap_or_else(|| calculate_priority(0, 0));
        self.observers
            .register_observer(Arc::new(block.clone()), priority);
    }

    async fn execute_action(&self, step: &Step, s: &ActionStep) {
        let started = Instant::now();
        let target = self.resolve_targets(&s.action).await;
        let ok = self.dispatcher.execute(&s.action, &target).await;
        let elapsed = started.elapsed();

        if ok {
            debug!(
                target: "stepbot::executor",
                step = %step.display_name(), action = s.action.name(),
                duration_ms = elapsed.as_millis() as u64,
                "Step succeeded"
            );
            self.events
                .record(ExecutionEvent::step_succeeded(step.display_name(), elapsed));
        } else {
            error!(
                target: "stepbot::executor",
                step = %step.display_name(), action = s.action.name(),
                duration_ms = elapsed.as_millis() as u64,
                "Step failed"
            );
            self.events.record(ExecutionEvent::step_failed(
                step.display_name(),
                elapsed,
                format!("{} failed", s.action.name()),
            ));
        }

        match &s.action {
            Action::Flow(FlowAction::Stop) => {
                info!(target: "stepbot::executor", step = %step.id(), "Stop requested by script");
                self.stop();
            }
            Action::Flow(FlowAction::JumpTo { target_step_id }) => warn!(
                target: "stepbot::executor",
                step = %step.id(), target = %target_step_id,
                "JumpTo is not implemented; continuing with the next step"
            ),
            _ => {}
        }
    }

    async fn resolve_targets(&self, action: &Action) -> ResolvedTarget {
        let targets = action.targets();
        let mut resolved = ResolvedTarget::none();
        if let Some(first) = targets.first() {
            resolved.at = self.resolve(first).await;
        }
        if let Some(second) = targets.get(1) {
            resolved.to = self.resolve(second).await;
        }
        resolved
    }

    async fn resolve(&self, identifier: &ElementIdentifier) -> Option<Coordinate> {
        match self.resolver.find(identifier).await {
            Ok(Some(c)) => Some(c),
            Ok(None) => {
                debug!(target: "stepbot::executor", "Target element not found");
                None
            }
            Err(e) => {
                warn!(target: "stepbot::executor", error = %e, "Failed to resolve target");
                None
            }
        }
    }
}

#[async_trait]
impl ObserverListener for ExecutorInner {
    async fn on_observer_triggered(&self, observer: Arc<ObserverBlock>) {
        let run = {
            let shared = lock(&self.shared);
            match shared.context.state {
                ExecutionState::Running => shared.run.clone(),
                _ => None,
            }
        };
        let Some(run) = run else {
            debug!(
                target: "stepbot::executor",
                observer = %observer.id,
                "Ignoring observer trigger while not running"
            );
            return;
        };

        info!(
            target: "stepbot::executor",
            observer = %observer.id, actions = observer.action_steps.len(),
            "Observer triggered"
        );
        self.events.record(ExecutionEvent::ObserverTriggered {
            observer_id: observer.id.clone(),
        });
        self.execute_steps(&run, &observer.action_steps, Lane::Observer)
            .await;
    }
}

async fn sleep_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::condition::ResolverConditionEvaluator;
    use crate::journal::ExecutionJournal;
    use crate::model::{Condition, KeyboardAction};
    use crate::testing::{MockResolver, RecordingDispatcher, wait_until};

    struct Harness {
        executor: ScriptExecutor,
        dispatcher: Arc<RecordingDispatcher>,
        resolver: Arc<MockResolver>,
        observers: Arc<ObserverManager>,
        journal: Arc<ExecutionJournal>,
    }

    fn harness() -> Harness {
        let resolver = Arc::new(MockResolver::default());
        let evaluator = Arc::new(ResolverConditionEvaluator::new(resolver.clone()));
        let observers = ObserverManager::new(evaluator.clone(), Duration::from_millis(10));
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let journal = Arc::new(ExecutionJournal::new(100));
        let executor = ScriptExecutor::builder(
            dispatcher.clone(),
            resolver.clone(),
            evaluator,
            observers.clone(),
        )
        .events(journal.clone())
        .options(ExecutorConfig {
            pause_poll_ms: 10,
            iteration_delay_ms: 0,
        })
        .build();
        Harness {
            executor,
            dispatcher,
            resolver,
            observers,
            journal,
        }
    }

    fn mark(id: &str) -> Step {
        Step::action(
            id,
            Action::Keyboard(KeyboardAction::TypeText { text: id.into() }),
        )
    }

    fn flow(id: &str, action: FlowAction) -> Step {
        Step::action(id, Action::Flow(action))
    }

    const SETTLE: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn start_requires_idle() {
        let h = harness();
        assert_eq!(h.executor.state(), ExecutionState::Idle);
        let script = Arc::new(Script::new("s", vec![Step::action("w", Action::wait(20))]));

        assert!(h.executor.start(script.clone()));
        assert_eq!(h.executor.state(), ExecutionState::Running);
        assert!(!h.executor.start(script.clone()));
        assert_eq!(h.executor.state(), ExecutionState::Running);

        assert!(!h.executor.resume());
        assert!(h.executor.pause());
        assert!(!h.executor.start(script));
        assert_eq!(h.executor.state(), ExecutionState::Paused);

        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
    }

    #[test]
    fn start_outside_a_runtime_stays_idle() {
        let h = harness();
        assert!(!h.executor.start(Script::new("s", vec![mark("a")])));
        assert_eq!(h.executor.state(), ExecutionState::Idle);
    }

    #[tokio::test]
    async fn resume_restarts_from_first_top_level_step() {
        let h = harness();
        let script = Script::new(
            "pausable",
            vec![mark("a"), Step::action("wait", Action::wait(150)), mark("b")],
        );
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.dispatcher.count("a") == 1).await);
        assert!(h.executor.pause());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(h.dispatcher.executed(), vec!["a", "Wait"]);
        assert_eq!(h.executor.context().iteration_count, 1);

        assert!(h.executor.resume());
        assert!(wait_until(SETTLE, || h.dispatcher.count("a") == 2).await);
        assert_eq!(h.dispatcher.executed()[..3], ["a", "Wait", "a"]);

        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert_eq!(h.dispatcher.count("b"), 0);
    }

    #[tokio::test]
    async fn stop_settles_to_idle_and_allows_restart() {
        let h = harness();
        let script = Arc::new(Script::new(
            "loop",
            vec![mark("a"), Step::action("wait", Action::wait(20))],
        ));

        assert!(h.executor.start(script.clone()));
        assert!(wait_until(SETTLE, || h.dispatcher.count("a") >= 1).await);
        h.executor.stop();
        assert_eq!(h.executor.state(), ExecutionState::Stopped);
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);

        // Stopping again is harmless and keeps the executor idle.
        h.executor.stop();
        assert_eq!(h.executor.state(), ExecutionState::Idle);

        let before = h.dispatcher.count("a");
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.dispatcher.count("a") > before).await);
        assert_eq!(h.executor.context().script_name(), Some("loop"));
        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);

        let stops = h
            .journal
            .events()
            .into_iter()
            .filter(|e| *e == ExecutionEvent::ScriptStopped)
            .count();
        assert_eq!(stops, 2);
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_the_run() {
        let h = harness();
        h.dispatcher.fail_on("broken");
        let script = Script::new("iso", vec![mark("broken"), mark("fine")]);

        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.dispatcher.count("fine") >= 2).await);
        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);

        let events = h.journal.events();
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutionEvent::StepFailed { step, .. } if step == "broken"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutionEvent::StepSucceeded { step, .. } if step == "fine"
        )));
    }

    #[tokio::test]
    async fn flow_stop_ends_the_run_without_deadlock() {
        let h = harness();
        let script = Script::new(
            "stopper",
            vec![mark("a"), flow("halt", FlowAction::Stop), mark("b")],
        );
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert_eq!(h.dispatcher.executed(), vec!["a", "Stop"]);
        let context = h.executor.context();
        assert_eq!(context.current_step_id, Some(StepId::new("halt")));
        assert_eq!(context.iteration_count, 0);
    }

    #[tokio::test]
    async fn runs_use_script_default_delays() {
        let h = harness();
        let mut script = Script::new("defaults", vec![mark("a"), flow("halt", FlowAction::Stop)]);
        script.settings.default_delay_before = 40;

        let started = Instant::now();
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert!(started.elapsed() >= Duration::from_millis(80));

        let ran = h.executor.context().script.unwrap();
        assert_eq!(ran.steps[0].delay_before(), 40);
        assert_eq!(ran.steps[1].delay_before(), 40);
    }

    #[tokio::test]
    async fn jump_is_logged_and_skipped() {
        let h = harness();
        let script = Script::new(
            "jumper",
            vec![
                mark("a"),
                flow(
                    "jump",
                    FlowAction::JumpTo {
                        target_step_id: StepId::new("a"),
                    },
                ),
                mark("b"),
                flow("halt", FlowAction::Stop),
            ],
        );
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert_eq!(h.dispatcher.executed(), vec!["a", "JumpTo", "b", "Stop"]);
    }

    #[tokio::test]
    async fn conditionals_and_groups() {
        let h = harness();
        let seen = crate::model::ElementIdentifier::at(3, 3);
        h.resolver.set_visible(&seen, true);
        let script = Script::new(
            "branches",
            vec![
                Step::conditional(
                    "c1",
                    Condition::exists(seen.clone()),
                    vec![mark("then1")],
                    vec![mark("else1")],
                ),
                Step::group(
                    "g",
                    "Group",
                    vec![Step::conditional(
                        "c2",
                        Condition::not_exists(seen),
                        vec![mark("then2")],
                        vec![mark("else2")],
                    )],
                ),
                flow("halt", FlowAction::Stop),
            ],
        );
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert_eq!(h.dispatcher.executed(), vec!["then1", "else2", "Stop"]);
    }

    #[tokio::test]
    async fn observer_fires_during_main_wait_and_nothing_runs_after_stop() {
        let h = harness();
        let popup = crate::model::ElementIdentifier::at(5, 5);
        h.resolver.set_visible(&popup, true);
        let script = Script::new(
            "watch",
            vec![
                Step::observer(
                    "popup",
                    Condition::exists(popup),
                    vec![mark("dismiss"), flow("obs-halt", FlowAction::Stop)],
                ),
                Step::action("main-wait", Action::wait(1_500)),
                mark("after"),
            ],
        );

        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert_eq!(h.dispatcher.executed(), vec!["Wait", "dismiss", "Stop"]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.dispatcher.executed(), vec!["Wait", "dismiss", "Stop"]);
        assert!(h.observers.is_empty());
        assert!(!h.observers.is_polling());
        assert_eq!(
            h.executor.context().current_step_id,
            Some(StepId::new("main-wait"))
        );
        assert!(h.journal.events().contains(&ExecutionEvent::ObserverTriggered {
            observer_id: StepId::new("popup"),
        }));
    }

    #[tokio::test]
    async fn observers_are_ignored_while_paused() {
        let h = harness();
        let popup = crate::model::ElementIdentifier::at(7, 7);
        let script = Script::new(
            "paused-watch",
            vec![
                Step::observer("popup", Condition::exists(popup.clone()), vec![mark("dismiss")]),
                Step::action("wait", Action::wait(20)),
            ],
        );
        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.observers.len() == 1).await);
        assert!(h.executor.pause());

        h.resolver.set_visible(&popup, true);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.dispatcher.count("dismiss"), 0);

        assert!(h.executor.resume());
        assert!(wait_until(SETTLE, || h.dispatcher.count("dismiss") >= 1).await);
        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
    }

    #[tokio::test]
    async fn deepest_triggered_observer_wins_each_tick() {
        let h = harness();
        let popup = crate::model::ElementIdentifier::at(4, 4);
        h.resolver.set_visible(&popup, true);
        let watch = |id: &str| {
            Step::observer(
                id,
                Condition::exists(popup.clone()),
                vec![mark(&format!("{id}-hit"))],
            )
        };
        let script = Script::new(
            "depths",
            vec![
                watch("shallow"),
                Step::group(
                    "outer",
                    "Outer",
                    vec![
                        watch("middle"),
                        Step::group("inner", "Inner", vec![watch("deep")]),
                    ],
                ),
                Step::action("main-wait", Action::wait(100)),
            ],
        );

        assert!(h.executor.start(script));
        assert!(wait_until(SETTLE, || h.dispatcher.count("deep-hit") >= 3).await);
        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);

        assert_eq!(h.dispatcher.count("shallow-hit"), 0);
        assert_eq!(h.dispatcher.count("middle-hit"), 0);
        let deep = ExecutionEvent::ObserverTriggered {
            observer_id: StepId::new("deep"),
        };
        let triggered: Vec<ExecutionEvent> = h
            .journal
            .events()
            .into_iter()
            .filter(|e| matches!(e, ExecutionEvent::ObserverTriggered { .. }))
            .collect();
        assert!(triggered.len() >= 3);
        assert!(triggered.iter().all(|e| *e == deep));
    }

    #[tokio::test]
    async fn external_stop_ends_observer_actions_while_condition_holds() {
        let h = harness();
        let popup = crate::model::ElementIdentifier::at(9, 9);
        h.resolver.set_visible(&popup, true);
        let script = Script::new(
            "external-stop",
            vec![
                Step::observer(
                    "popup",
                    Condition::exists(popup),
                    vec![Step::action("obs-wait", Action::wait(10))],
                ),
                Step::action("main-wait", Action::wait(20)),
            ],
        );
        let succeeded = |step: &str| {
            h.journal
                .events()
                .iter()
                .filter(|e| matches!(e, ExecutionEvent::StepSucceeded { step: s, .. } if s == step))
                .count()
        };

        assert!(h.executor.start(script));
        assert!(
            wait_until(SETTLE, || succeeded("obs-wait") >= 1 && succeeded("main-wait") >= 1)
                .await
        );
        h.executor.stop();
        assert!(wait_until(SETTLE, || h.executor.state() == ExecutionState::Idle).await);
        assert!(h.observers.is_empty());
        assert!(!h.observers.is_polling());

        let observer_runs = succeeded("obs-wait");
        let dispatched = h.dispatcher.executed().len();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(succeeded("obs-wait"), observer_runs);
        assert_eq!(h.dispatcher.executed().len(), dispatched);
    }
}
