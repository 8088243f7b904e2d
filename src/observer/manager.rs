use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::executor::condition::ConditionEvaluator;
use crate::model::{ObserverBlock, StepId};
use crate::utils::lock;

/// Receives the observer that fired during a tick.
#[async_trait]
pub trait ObserverListener: Send + Sync {
    async fn on_observer_triggered(&self, observer: Arc<ObserverBlock>);
}

/// Registry entry.
#[derive(Debug, Clone)]
pub struct ObserverState {
    pub observer: Arc<ObserverBlock>,
    pub is_active: bool,
    pub priority: i32,
    /// Order of first registration, used to break priority ties.
    sequence: u64,
}

#[derive(Default)]
struct Registry {
    observers: HashMap<StepId, ObserverState>,
    next_sequence: u64,
    polling: Option<CancellationToken>,
}

/// Background watcher registry.
///
/// Observers are checked by one polling task that starts on the first registration
/// and runs until `clear_all`. Each tick evaluates active observers from highest to
/// lowest priority and fires at most one of them. The next tick starts `check_delay`
/// after the previous one (listener included) has finished.
pub struct ObserverManager {
    evaluator: Arc<dyn ConditionEvaluator>,
    check_delay: Duration,
    registry: Mutex<Registry>,
    listener: Mutex<Option<Weak<dyn ObserverListener>>>,
}

impl ObserverManager {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>, check_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            evaluator,
            check_delay,
            registry: Mutex::new(Registry::default()),
            listener: Mutex::new(None),
        })
    }

    pub fn check_delay(&self) -> Duration {
        self.check_delay
    }

    /// Install the listener. Only a weak reference is kept.
    pub fn set_listener(&self, listener: Weak<dyn ObserverListener>) {
        *lock(&self.listener) = Some(listener);
    }

    /// Insert or replace the observer with the same id, then make sure polling runs.
    ///
    /// Replacing keeps the original registration order for tie-breaking.
    pub fn register_observer(self: &Arc<Self>, observer: Arc<ObserverBlock>, priority: i32) {
        let mut registry = lock(&self.registry);
        let existing = registry.observers.get(&observer.id).map(|s| s.sequence);
        let sequence = match existing {
            Some(sequence) => sequence,
            None => {
                registry.next_sequence += 1;
                registry.next_sequence
            }
        };
        debug!(
            target: "stepbot::observer",
            observer = %observer.id, priority,
            "Registering observer"
        );
        registry.observers.insert(
            observer.id.clone(),
            ObserverState {
                observer,
                is_active: true,
                priority,
                sequence,
            },
        );

        let running = registry
            .polling
            .as_ref()
            .is_some_and(|token| !token.is_cancelled());
        if !running {
            registry.polling = self.spawn_polling();
        }
    }

    /// Remove an observer; unknown ids are ignored.
    pub fn unregister_observer(&self, id: &StepId) -> bool {
        let removed = lock(&self.registry).observers.remove(id).is_some();
        if removed {
            debug!(target: "stepbot::observer", observer = %id, "Unregistered observer");
        }
        removed
    }

    /// Enable or disable an observer without removing it. Returns false for unknown ids.
    pub fn set_observer_active(&self, id: &StepId, active: bool) -> bool {
        match lock(&self.registry).observers.get_mut(id) {
            Some(state) => {
                state.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Empty the registry and stop the polling task.
    pub fn clear_all(&self) {
        let mut registry = lock(&self.registry);
        let count = registry.observers.len();
        registry.observers.clear();
        if let Some(token) = registry.polling.take() {
            token.cancel();
        }
        drop(registry);
        info!(target: "stepbot::observer", cleared = count, "Cleared all observers");
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.registry)
            .polling
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Snapshot of an observer's registry entry.
    pub fn state(&self, id: &StepId) -> Option<ObserverState> {
        lock(&self.registry).observers.get(id).cloned()
    }

    /// Run one tick by hand: find the first observer whose condition holds, notify the
    /// listener and return it.
    pub async fn check_observers(&self) -> Option<Arc<ObserverBlock>> {
        let fired = self.find_triggered().await?;
        let listener = lock(&self.listener).as_ref().and_then(Weak::upgrade);
        match listener {
            Some(listener) => listener.on_observer_triggered(fired.clone()).await,
            None => trace!(
                target: "stepbot::observer",
                observer = %fired.id,
                "Observer fired without a listener"
            ),
        }
        Some(fired)
    }

    async fn find_triggered(&self) -> Option<Arc<ObserverBlock>> {
        let mut candidates: Vec<ObserverState> = lock(&self.registry)
            .observers
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });

        for state in candidates {
            match self.evaluator.evaluate(&state.observer.condition).await {
                Ok(true) => {
                    debug!(
                        target: "stepbot::observer",
                        observer = %state.observer.id, priority = state.priority,
                        "Observer condition met"
                    );
                    return Some(state.observer);
                }
                Ok(false) => {}
                Err(e) => warn!(
                    target: "stepbot::observer",
                    observer = %state.observer.id, error = %e,
                    "Observer check failed"
                ),
            }
        }
        None
    }

    fn spawn_polling(self: &Arc<Self>) -> Option<CancellationToken> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                target: "stepbot::observer",
                "No async runtime available; observers will only be checked manually"
            );
            return None;
        };
        let token = CancellationToken::new();
        handle.spawn(poll_loop(Arc::downgrade(self), token.clone(), self.check_delay));
        debug!(
            target: "stepbot::observer",
            delay_ms = self.check_delay.as_millis() as u64,
            "Observer polling started"
        );
        Some(token)
    }
}

async fn poll_loop(manager: Weak<ObserverManager>, token: CancellationToken, delay: Duration) {
    loop {
        let Some(m) = manager.upgrade() else { break };
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = m.check_observers() => {}
        }
        drop(m);

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!(target: "stepbot::observer", "Observer polling stopped");
}
