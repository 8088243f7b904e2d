use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::actions::InputDriver;
use crate::error::{EngineError, EngineResult};
use crate::model::{Action, Coordinate, KeyboardAction, MouseAction, SystemAction};

/// Coordinates resolved for an action's targets. `to` is only used by drags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub at: Option<Coordinate>,
    pub to: Option<Coordinate>,
}

impl ResolvedTarget {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(c: Coordinate) -> Self {
        Self {
            at: Some(c),
            to: None,
        }
    }
}

/// Performs one action. Never fails past this boundary: problems are logged and
/// reported as `false`.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn execute(&self, action: &Action, target: &ResolvedTarget) -> bool;
}

/// Dispatcher that drives an [`InputDriver`] and the host OS.
///
/// Every mouse and keyboard action holds one input lock for its whole duration, so
/// sequences started by the foreground run and by observers never interleave.
pub struct InputActionDispatcher {
    input: Arc<dyn InputDriver>,
    input_lock: Mutex<()>,
}

impl InputActionDispatcher {
    pub fn new(input: Arc<dyn InputDriver>) -> Self {
        Self {
            input,
            input_lock: Mutex::new(()),
        }
    }

    async fn perform(&self, action: &Action, target: &ResolvedTarget) -> EngineResult<()> {
        let _input = if action.is_input() {
            Some(self.input_lock.lock().await)
        } else {
            None
        };
        match action {
            Action::Mouse(mouse) => self.mouse(mouse, target, action.name()).await,
            Action::Keyboard(KeyboardAction::TypeText { text }) => self.input.type_text(text).await,
            Action::Keyboard(KeyboardAction::PressKey { key }) => self.input.press_key(key).await,
            Action::Keyboard(KeyboardAction::PressKeyCombination { keys }) => {
                if keys.is_empty() {
                    return Err(EngineError::EmptyKeyCombination);
                }
                self.input.press_key_combination(keys).await
            }
            Action::System(system) => run_system(system).await,
            Action::Flow(_) => Ok(()),
        }
    }

    async fn mouse(
        &self,
        mouse: &MouseAction,
        target: &ResolvedTarget,
        name: &'static str,
    ) -> EngineResult<()> {
        let at = || target.at.ok_or(EngineError::MissingTarget { action: name });
        match mouse {
            MouseAction::LeftClick { .. } => self.input.left_click(at()?).await,
            MouseAction::RightClick { .. } => self.input.right_click(at()?).await,
            MouseAction::DoubleClick { .. } => self.input.double_click(at()?).await,
            MouseAction::MoveTo { .. } => self.input.move_to(at()?).await,
            MouseAction::Drag { .. } => {
                let from = at()?;
                let to = target.to.ok_or(EngineError::MissingTarget { action: name })?;
                self.input.drag_to(from, to).await
            }
            MouseAction::Scroll { amount, direction } => {
                self.input.scroll(*amount, *direction).await
            }
        }
    }
}

#[async_trait]
impl ActionDispatcher for InputActionDispatcher {
    async fn execute(&self, action: &Action, target: &ResolvedTarget) -> bool {
        match self.perform(action, target).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    target: "stepbot::dispatcher",
                    action = action.name(), error = %e,
                    "Action failed"
                );
                false
            }
        }
    }
}

async fn run_system(action: &SystemAction) -> EngineResult<()> {
    match action {
        SystemAction::Wait { milliseconds } => {
            tokio::time::sleep(Duration::from_millis(*milliseconds)).await;
            Ok(())
        }
        SystemAction::LaunchApplication { path, args } => {
            let child = Command::new(path).args(args).spawn()?;
            info!(
                target: "stepbot::dispatcher",
                %path, pid = child.id(),
                "Launched application"
            );
            Ok(())
        }
        SystemAction::CloseApplication { process_name } => {
            let status = close_command(process_name).status().await?;
            debug!(target: "stepbot::dispatcher", %process_name, ?status, "Close command finished");
            if status.success() {
                Ok(())
            } else {
                Err(EngineError::Process(std::io::Error::other(format!(
                    "closing '{process_name}' exited with {status}"
                ))))
            }
        }
    }
}

fn close_command(process_name: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("taskkill");
        cmd.args(["/IM", process_name, "/F"]);
        cmd
    } else {
        let mut cmd = Command::new("pkill");
        cmd.args(["-x", process_name]);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementIdentifier, FlowAction, ScrollDirection};
    use std::sync::Mutex as StdMutex;

    /// Records driver calls by name.
    #[derive(Default)]
    struct CallLog(StdMutex<Vec<String>>);

    impl CallLog {
        fn push(&self, call: String) -> EngineResult<()> {
            self.0.lock().unwrap().push(call);
            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InputDriver for CallLog {
        async fn move_to(&self, at: Coordinate) -> EngineResult<()> {
            self.push(format!("move {at}"))
        }
        async fn left_click(&self, at: Coordinate) -> EngineResult<()> {
            self.push(format!("left {at}"))
        }
        async fn right_click(&self, at: Coordinate) -> EngineResult<()> {
            self.push(format!("right {at}"))
        }
        async fn double_click(&self, at: Coordinate) -> EngineResult<()> {
            self.push(format!("double {at}"))
        }
        async fn drag_to(&self, from: Coordinate, to: Coordinate) -> EngineResult<()> {
            self.push(format!("drag {from} {to}"))
        }
        async fn scroll(&self, amount: i32, direction: ScrollDirection) -> EngineResult<()> {
            self.push(format!("scroll {amount} {direction:?}"))
        }
        async fn type_text(&self, text: &str) -> EngineResult<()> {
            self.push(format!("type {text}"))
        }
        async fn press_key(&self, key: &str) -> EngineResult<()> {
            self.push(format!("key {key}"))
        }
        async fn press_key_combination(&self, keys: &[String]) -> EngineResult<()> {
            self.push(format!("combo {}", keys.join("+")))
        }
    }

    fn dispatcher() -> (Arc<CallLog>, InputActionDispatcher) {
        let log = Arc::new(CallLog::default());
        (log.clone(), InputActionDispatcher::new(log))
    }

    #[tokio::test]
    async fn mouse_actions_need_a_target() {
        let (log, d) = dispatcher();
        let click = Action::left_click(ElementIdentifier::at(1, 2));
        assert!(!d.execute(&click, &ResolvedTarget::none()).await);
        assert!(d.execute(&click, &ResolvedTarget::at(Coordinate::new(1, 2))).await);

        let drag = Action::Mouse(MouseAction::Drag {
            from: ElementIdentifier::at(0, 0),
            to: ElementIdentifier::at(5, 5),
        });
        let half = ResolvedTarget::at(Coordinate::new(0, 0));
        assert!(!d.execute(&drag, &half).await);
        let full = ResolvedTarget {
            at: Some(Coordinate::new(0, 0)),
            to: Some(Coordinate::new(5, 5)),
        };
        assert!(d.execute(&drag, &full).await);

        assert_eq!(log.calls(), vec!["left (1, 2)", "drag (0, 0) (5, 5)"]);
    }

    #[tokio::test]
    async fn scroll_needs_no_target() {
        let (log, d) = dispatcher();
        let scroll = Action::Mouse(MouseAction::Scroll {
            amount: 3,
            direction: ScrollDirection::Down,
        });
        assert!(d.execute(&scroll, &ResolvedTarget::none()).await);
        assert_eq!(log.calls(), vec!["scroll 3 Down"]);
    }

    #[tokio::test]
    async fn keyboard_and_flow() {
        let (log, d) = dispatcher();
        let none = ResolvedTarget::none();
        let combo = |keys: &[&str]| {
            Action::Keyboard(KeyboardAction::PressKeyCombination {
                keys: keys.iter().map(|k| k.to_string()).collect(),
            })
        };
        assert!(d.execute(&combo(&["ctrl", "s"]), &none).await);
        assert!(!d.execute(&combo(&[]), &none).await);
        assert!(d.execute(&Action::Flow(FlowAction::Stop), &none).await);
        assert!(d.execute(&Action::Flow(FlowAction::Continue), &none).await);
        assert_eq!(log.calls(), vec!["combo ctrl+s"]);
    }

    #[tokio::test]
    async fn only_input_actions_take_the_input_lock() {
        let (log, d) = dispatcher();
        let none = ResolvedTarget::none();
        let typing = Action::Keyboard(KeyboardAction::TypeText { text: "x".into() });

        let held = d.input_lock.lock().await;
        assert!(d.execute(&Action::wait(1), &none).await);
        let blocked = tokio::time::timeout(Duration::from_millis(50), d.execute(&typing, &none)).await;
        assert!(blocked.is_err());
        drop(held);

        assert!(d.execute(&typing, &none).await);
        assert_eq!(log.calls(), vec!["type x"]);
    }

    #[tokio::test]
    async fn wait_sleeps() {
        let (_log, d) = dispatcher();
        let started = std::time::Instant::now();
        assert!(d.execute(&Action::wait(30), &ResolvedTarget::none()).await);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn launching_a_missing_program_fails() {
        let (_log, d) = dispatcher();
        let launch = Action::System(SystemAction::LaunchApplication {
            path: "/definitely/not/a/program".into(),
            args: vec![],
        });
        assert!(!d.execute(&launch, &ResolvedTarget::none()).await);
    }
}
