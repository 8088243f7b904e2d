use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::error::EngineResult;
use crate::model::{Coordinate, ElementIdentifier, ImagePattern};
use crate::utils::lock;
use crate::vision::{ScreenVision, decode_pattern};

/// Turns an [`ElementIdentifier`] into a screen coordinate.
///
/// `Ok(None)` means "not on screen" and is not an error. `Err` is reserved for
/// backend failures (bad pattern data, capture failure).
#[async_trait]
pub trait ElementResolver: Send + Sync {
    async fn find(&self, identifier: &ElementIdentifier) -> EngineResult<Option<Coordinate>>;
}

/// Resolver that captures the screen and template-matches image patterns.
///
/// Capture and matching run on the blocking pool. Only one lookup touches the screen
/// at a time, whichever task (foreground or observer) asks.
pub struct ScreenElementResolver {
    vision: Arc<dyn ScreenVision>,
    guard: Arc<Mutex<()>>,
}

impl ScreenElementResolver {
    pub fn new(vision: Arc<dyn ScreenVision>) -> Self {
        Self {
            vision,
            guard: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl ElementResolver for ScreenElementResolver {
    async fn find(&self, identifier: &ElementIdentifier) -> EngineResult<Option<Coordinate>> {
        match identifier {
            ElementIdentifier::ByCoordinate(c) => Ok(Some(*c)),
            ElementIdentifier::ByImage(pattern) => {
                let vision = self.vision.clone();
                let guard = self.guard.clone();
                let pattern = pattern.clone();
                tokio::task::spawn_blocking(move || locate(&*vision, &guard, &pattern)).await?
            }
        }
    }
}

fn locate(
    vision: &dyn ScreenVision,
    guard: &Mutex<()>,
    pattern: &ImagePattern,
) -> EngineResult<Option<Coordinate>> {
    let template = decode_pattern(pattern)?;
    let _held = lock(guard);
    let screen = vision.capture_full_screen()?;
    let found = vision.find_match(&screen, &template, pattern.threshold())?;
    match &found {
        Some(m) => debug!(
            target: "stepbot::resolver",
            x = m.coordinate.x, y = m.coordinate.y, confidence = m.confidence,
            "Image pattern found"
        ),
        None => trace!(
            target: "stepbot::resolver",
            threshold = pattern.threshold(),
            "Image pattern not found"
        ),
    }
    Ok(found.map(|m| m.coordinate))
}
