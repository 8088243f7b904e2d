//! Hand-written collaborators for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::executor::dispatcher::{ActionDispatcher, ResolvedTarget};
use crate::executor::resolver::ElementResolver;
use crate::model::{Action, Coordinate, ElementIdentifier, KeyboardAction, ObserverBlock, StepId, SystemAction};
use crate::observer::ObserverListener;
use crate::utils::lock;

fn key(identifier: &ElementIdentifier) -> String {
    match identifier {
        ElementIdentifier::ByCoordinate(c) => format!("xy:{},{}", c.x, c.y),
        ElementIdentifier::ByImage(p) => format!("img:{}", p.base64_data),
    }
}

/// Resolver whose screen is a set of visible identifiers.
///
/// Identifiers are absent unless marked visible; coordinates resolve to themselves,
/// images to the origin.
#[derive(Default)]
pub(crate) struct MockResolver {
    visible: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockResolver {
    pub(crate) fn set_visible(&self, identifier: &ElementIdentifier, visible: bool) {
        let mut set = lock(&self.visible);
        if visible {
            set.insert(key(identifier));
        } else {
            set.remove(&key(identifier));
        }
    }

    pub(crate) fn fail_on(&self, identifier: &ElementIdentifier) {
        lock(&self.failing).insert(key(identifier));
    }

    pub(crate) fn calls_for(&self, identifier: &ElementIdentifier) -> usize {
        lock(&self.calls).get(&key(identifier)).copied().unwrap_or(0)
    }

    pub(crate) fn calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }
}

#[async_trait]
impl ElementResolver for MockResolver {
    async fn find(&self, identifier: &ElementIdentifier) -> EngineResult<Option<Coordinate>> {
        let k = key(identifier);
        *lock(&self.calls).entry(k.clone()).or_default() += 1;
        if lock(&self.failing).contains(&k) {
            return Err(EngineError::Capture("mock capture failure".into()));
        }
        if !lock(&self.visible).contains(&k) {
            return Ok(None);
        }
        Ok(Some(match identifier {
            ElementIdentifier::ByCoordinate(c) => *c,
            ElementIdentifier::ByImage(_) => Coordinate::new(0, 0),
        }))
    }
}

/// Dispatcher that records a marker per action.
///
/// The marker is the text of a `TypeText` action and the action name otherwise.
/// `Wait` really sleeps so timing-based tests behave like production.
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    executed: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingDispatcher {
    pub(crate) fn fail_on(&self, marker: &str) {
        lock(&self.failing).insert(marker.to_owned());
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        lock(&self.executed).clone()
    }

    pub(crate) fn count(&self, marker: &str) -> usize {
        lock(&self.executed).iter().filter(|m| *m == marker).count()
    }
}

#[async_trait]
impl ActionDispatcher for RecordingDispatcher {
    async fn execute(&self, action: &Action, _target: &ResolvedTarget) -> bool {
        let marker = match action {
            Action::Keyboard(KeyboardAction::TypeText { text }) => text.clone(),
            other => other.name().to_owned(),
        };
        lock(&self.executed).push(marker.clone());
        if let Action::System(SystemAction::Wait { milliseconds }) = action {
            tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
        }
        !lock(&self.failing).contains(&marker)
    }
}

/// Listener that remembers which observers fired.
#[derive(Default)]
pub(crate) struct RecordingListener {
    triggered: Mutex<Vec<StepId>>,
}

impl RecordingListener {
    pub(crate) fn triggered(&self) -> Vec<StepId> {
        lock(&self.triggered).clone()
    }
}

#[async_trait]
impl ObserverListener for RecordingListener {
    async fn on_observer_triggered(&self, observer: Arc<ObserverBlock>) {
        lock(&self.triggered).push(observer.id.clone());
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub(crate) async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
