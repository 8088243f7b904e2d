//! Screen capture backends.
//!
//! With the `screen-capture` feature enabled, [`XcapVision`] grabs the primary
//! monitor through `xcap`. Without it, [`UnavailableVision`] reports every capture as
//! failed, which makes image-based element lookups resolve to errors (logged by the
//! executor) while coordinate-based lookups keep working.

use std::sync::Arc;

use image::RgbaImage;
use tracing::warn;

use super::ScreenVision;
use crate::error::{EngineError, EngineResult};

/// Vision backend used when no capture backend is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableVision;

impl ScreenVision for UnavailableVision {
    fn capture_full_screen(&self) -> EngineResult<RgbaImage> {
        warn!(
            target: "stepbot::vision",
            "Screen capture requested but stepbot was built without the `screen-capture` feature"
        );
        Err(EngineError::Capture(
            "no capture backend (enable the `screen-capture` feature)".into(),
        ))
    }
}

/// Primary-monitor capture through `xcap`.
#[cfg(feature = "screen-capture")]
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapVision;

#[cfg(feature = "screen-capture")]
impl ScreenVision for XcapVision {
    fn capture_full_screen(&self) -> EngineResult<RgbaImage> {
        let monitors = xcap::Monitor::all()
            .map_err(|e| EngineError::Capture(format!("failed to enumerate monitors: {e}")))?;

        let mut primary = None;
        let mut first = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                primary = Some(monitor);
                break;
            }
            if first.is_none() {
                first = Some(monitor);
            }
        }
        let monitor = primary
            .or(first)
            .ok_or_else(|| EngineError::Capture("no monitor found".into()))?;

        monitor
            .capture_image()
            .map_err(|e| EngineError::Capture(format!("failed to capture monitor: {e}")))
    }
}

/// The best vision backend available in this build.
pub fn default_vision() -> Arc<dyn ScreenVision> {
    #[cfg(feature = "screen-capture")]
    {
        Arc::new(XcapVision)
    }
    #[cfg(not(feature = "screen-capture"))]
    {
        Arc::new(UnavailableVision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_backend_fails_capture() {
        let err = UnavailableVision.capture_full_screen().unwrap_err();
        assert!(matches!(err, EngineError::Capture(_)));
    }
}
