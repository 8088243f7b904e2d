use async_trait::async_trait;
use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Axis, Button, Coordinate as EnigoCoordinate, Direction, Enigo, Key, Settings};
use rand::random_range;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, trace};

use crate::config::InputConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{Coordinate, ScrollDirection};
use crate::utils::keys::parse_key;

/// Low-level input injection.
///
/// Coordinates are absolute screen pixels. Key names go through
/// [`parse_key`](crate::utils::keys::parse_key).
#[async_trait]
pub trait InputDriver: Send + Sync {
    async fn move_to(&self, at: Coordinate) -> EngineResult<()>;
    async fn left_click(&self, at: Coordinate) -> EngineResult<()>;
    async fn right_click(&self, at: Coordinate) -> EngineResult<()>;
    async fn double_click(&self, at: Coordinate) -> EngineResult<()>;
    async fn drag_to(&self, from: Coordinate, to: Coordinate) -> EngineResult<()>;
    async fn scroll(&self, amount: i32, direction: ScrollDirection) -> EngineResult<()>;
    async fn type_text(&self, text: &str) -> EngineResult<()>;
    async fn press_key(&self, key: &str) -> EngineResult<()>;
    async fn press_key_combination(&self, keys: &[String]) -> EngineResult<()>;
}

#[derive(Debug)]
enum Job {
    MoveTo(Coordinate),
    Click(Button, Coordinate),
    DoubleClick(Coordinate),
    Drag(Coordinate, Coordinate),
    Scroll(i32, ScrollDirection),
    TypeText(String),
    PressKey(String),
    PressKeyCombination(Vec<String>),
}

struct Request {
    job: Job,
    reply: oneshot::Sender<EngineResult<()>>,
}

/// [`InputDriver`] backed by Enigo.
///
/// Enigo is not shareable across threads, so a single worker thread owns it and
/// executes jobs one at a time. The Enigo handle is created on first use; in dry-run
/// mode it is never created and every job is only logged.
pub struct EnigoDriver {
    jobs: mpsc::Sender<Request>,
    dry_run: bool,
}

impl EnigoDriver {
    pub fn new(config: InputConfig) -> EngineResult<Self> {
        let (jobs, rx) = mpsc::channel::<Request>();
        let dry_run = config.dry_run;
        thread::Builder::new()
            .name("stepbot-input".into())
            .spawn(move || InputWorker::new(config).run(rx))
            .map_err(|e| EngineError::InputUnavailable(format!("failed to spawn input worker: {e}")))?;
        Ok(Self { jobs, dry_run })
    }

    /// Returns whether input is only logged.
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    async fn submit(&self, job: Job) -> EngineResult<()> {
        let (reply, done) = oneshot::channel();
        self.jobs
            .send(Request { job, reply })
            .map_err(|_| EngineError::InputUnavailable("input worker has stopped".into()))?;
        done.await
            .map_err(|_| EngineError::InputUnavailable("input worker dropped the request".into()))?
    }
}

#[async_trait]
impl InputDriver for EnigoDriver {
    async fn move_to(&self, at: Coordinate) -> EngineResult<()> {
        self.submit(Job::MoveTo(at)).await
    }

    async fn left_click(&self, at: Coordinate) -> EngineResult<()> {
        self.submit(Job::Click(Button::Left, at)).await
    }

    async fn right_click(&self, at: Coordinate) -> EngineResult<()> {
        self.submit(Job::Click(Button::Right, at)).await
    }

    async fn double_click(&self, at: Coordinate) -> EngineResult<()> {
        self.submit(Job::DoubleClick(at)).await
    }

    async fn drag_to(&self, from: Coordinate, to: Coordinate) -> EngineResult<()> {
        self.submit(Job::Drag(from, to)).await
    }

    async fn scroll(&self, amount: i32, direction: ScrollDirection) -> EngineResult<()> {
        self.submit(Job::Scroll(amount, direction)).await
    }

    async fn type_text(&self, text: &str) -> EngineResult<()> {
        self.submit(Job::TypeText(text.to_owned())).await
    }

    async fn press_key(&self, key: &str) -> EngineResult<()> {
        self.submit(Job::PressKey(key.to_owned())).await
    }

    async fn press_key_combination(&self, keys: &[String]) -> EngineResult<()> {
        self.submit(Job::PressKeyCombination(keys.to_vec())).await
    }
}

/// Owner of the Enigo handle; lives on the input thread.
struct InputWorker {
    config: InputConfig,
    enigo: Option<Enigo>,
}

impl InputWorker {
    fn new(config: InputConfig) -> Self {
        Self {
            config,
            enigo: None,
        }
    }

    fn run(mut self, jobs: mpsc::Receiver<Request>) {
        debug!(target: "stepbot::actions", dry_run = self.config.dry_run, "Input worker started");
        while let Ok(Request { job, reply }) = jobs.recv() {
            let result = self.perform(job);
            // The caller may have been cancelled; nobody is waiting then.
            let _ = reply.send(result);
        }
        debug!(target: "stepbot::actions", "Input worker stopped");
    }

    fn perform(&mut self, job: Job) -> EngineResult<()> {
        if self.config.dry_run {
            return dry_run(&job);
        }
        trace!(target: "stepbot::actions", ?job, "perform");
        match job {
            Job::MoveTo(at) => self.move_to(at),
            Job::Click(button, at) => {
                self.move_to(at)?;
                self.click(button)
            }
            Job::DoubleClick(at) => {
                self.move_to(at)?;
                self.click(Button::Left)?;
                self.pause(self.config.double_click_gap_ms);
                self.click(Button::Left)
            }
            Job::Drag(from, to) => {
                self.move_to(from)?;
                self.pause(self.config.drag_settle_ms);
                self.enigo()?.button(Button::Left, Direction::Press)?;
                self.pause(50);
                let moved = self.move_to(to);
                self.pause(50);
                // Always release, even if the move failed.
                self.enigo()?.button(Button::Left, Direction::Release)?;
                moved
            }
            Job::Scroll(amount, direction) => {
                let (length, axis) = match direction {
                    ScrollDirection::Up => (amount.saturating_neg(), Axis::Vertical),
                    ScrollDirection::Down => (amount, Axis::Vertical),
                    ScrollDirection::Left => (amount.saturating_neg(), Axis::Horizontal),
                    ScrollDirection::Right => (amount, Axis::Horizontal),
                };
                self.enigo()?.scroll(length, axis)?;
                Ok(())
            }
            Job::TypeText(text) => {
                let mut buf = [0u8; 4];
                for ch in text.chars() {
                    self.enigo()?.text(ch.encode_utf8(&mut buf))?;
                    let jitter = match self.config.jitter_ms {
                        0 => 0,
                        max => random_range(0..=max),
                    };
                    self.pause(self.config.type_delay_ms + jitter);
                }
                Ok(())
            }
            Job::PressKey(name) => {
                let key = key_from(&name)?;
                self.enigo()?.key(key, Direction::Press)?;
                self.pause(self.config.key_hold_ms);
                self.enigo()?.key(key, Direction::Release)?;
                Ok(())
            }
            Job::PressKeyCombination(names) => {
                let keys = combination(&names)?;
                let mut pressed = Vec::with_capacity(keys.len());
                let mut outcome = Ok(());
                for key in &keys {
                    if let Err(e) = self.enigo()?.key(*key, Direction::Press) {
                        outcome = Err(e.into());
                        break;
                    }
                    pressed.push(*key);
                    self.pause(self.config.key_gap_ms);
                }
                self.pause(50);
                for key in pressed.iter().rev() {
                    self.enigo()?.key(*key, Direction::Release)?;
                }
                outcome
            }
        }
    }

    fn move_to(&mut self, at: Coordinate) -> EngineResult<()> {
        self.enigo()?.move_mouse(at.x, at.y, EnigoCoordinate::Abs)?;
        Ok(())
    }

    fn click(&mut self, button: Button) -> EngineResult<()> {
        self.enigo()?.button(button, Direction::Press)?;
        self.pause(self.config.click_hold_ms);
        self.enigo()?.button(button, Direction::Release)?;
        Ok(())
    }

    fn pause(&self, ms: u64) {
        if ms > 0 {
            thread::sleep(Duration::from_millis(ms));
        }
    }

    fn enigo(&mut self) -> EngineResult<&mut Enigo> {
        if self.enigo.is_none() {
            trace!(target: "stepbot::actions", "Initializing Enigo");
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| EngineError::InputUnavailable(e.to_string()))?;
            self.enigo = Some(enigo);
        }
        self.enigo
            .as_mut()
            .ok_or_else(|| EngineError::InputUnavailable("Enigo not initialized".into()))
    }
}

fn dry_run(job: &Job) -> EngineResult<()> {
    match job {
        Job::PressKey(name) => {
            key_from(name)?;
        }
        Job::PressKeyCombination(names) => {
            combination(names)?;
        }
        _ => {}
    }
    info!(target: "stepbot::actions", ?job, "DRY-RUN input");
    Ok(())
}

fn key_from(name: &str) -> EngineResult<Key> {
    parse_key(name).ok_or_else(|| EngineError::UnknownKey(name.to_owned()))
}

/// Parse every key before anything is pressed.
fn combination(names: &[String]) -> EngineResult<Vec<Key>> {
    if names.is_empty() {
        return Err(EngineError::EmptyKeyCombination);
    }
    names.iter().map(|n| key_from(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dry_driver() -> EnigoDriver {
        EnigoDriver::new(InputConfig {
            dry_run: true,
            ..InputConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn dry_run_accepts_everything_valid() {
        let driver = dry_driver();
        assert!(driver.is_dry_run());
        let at = Coordinate::new(3, 4);
        driver.move_to(at).await.unwrap();
        driver.left_click(at).await.unwrap();
        driver.double_click(at).await.unwrap();
        driver.drag_to(at, Coordinate::new(9, 9)).await.unwrap();
        driver.scroll(3, ScrollDirection::Up).await.unwrap();
        driver.type_text("hello").await.unwrap();
        driver.press_key("enter").await.unwrap();
        driver
            .press_key_combination(&["ctrl".into(), "c".into()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn key_errors_surface_in_dry_run() {
        let driver = dry_driver();
        assert!(matches!(
            driver.press_key("hyperdrive").await,
            Err(EngineError::UnknownKey(k)) if k == "hyperdrive"
        ));
        assert!(matches!(
            driver.press_key_combination(&[]).await,
            Err(EngineError::EmptyKeyCombination)
        ));
        assert!(matches!(
            driver
                .press_key_combination(&["ctrl".into(), "nope".into()])
                .await,
            Err(EngineError::UnknownKey(_))
        ));
    }
}
