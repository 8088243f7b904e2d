/*!
Screen vision for Stepbot.

The engine never interprets pixels itself. It talks to a [`ScreenVision`]
implementation through two operations:

- `capture_full_screen`: grab the current frame.
- `find_match`: locate the single best occurrence of a template inside a frame and
  accept it only if its confidence is `>=` the threshold.

Submodules:
- `matcher`: `TM_CCOEFF_NORMED` template matching on top of `imageproc`.
- `capture`: screen capture backends (`xcap`, behind the `screen-capture` feature).
*/

pub mod capture;
pub mod matcher;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::RgbaImage;

use crate::error::{EngineError, EngineResult};
use crate::model::{Coordinate, ImagePattern};

pub use capture::{UnavailableVision, default_vision};
#[cfg(feature = "screen-capture")]
pub use capture::XcapVision;

/// Outcome of a template search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Center of the matched region; this is what element lookup resolves to.
    pub coordinate: Coordinate,
    /// Normalized similarity in `[0, 1]`.
    pub confidence: f64,
    pub top_left: Coordinate,
    pub bottom_right: Coordinate,
}

/// Screen capture + template matching capability.
pub trait ScreenVision: Send + Sync {
    /// Capture the whole primary screen.
    fn capture_full_screen(&self) -> EngineResult<RgbaImage>;

    /// Best match of `template` in `screen`, or `None` when the best confidence is
    /// below `threshold`.
    fn find_match(
        &self,
        screen: &RgbaImage,
        template: &RgbaImage,
        threshold: f64,
    ) -> EngineResult<Option<MatchResult>> {
        Ok(matcher::best_match(screen, template)?.filter(|m| m.confidence >= threshold))
    }
}

/// Decode the base64 image carried by a pattern.
pub fn decode_pattern(pattern: &ImagePattern) -> EngineResult<RgbaImage> {
    let bytes = STANDARD
        .decode(pattern.base64_data.trim())
        .map_err(|e| EngineError::InvalidPattern(format!("base64: {e}")))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| EngineError::InvalidPattern(format!("image: {e}")))?;
    Ok(image.to_rgba8())
}

/// Encode an image as base64 PNG, the format [`ImagePattern`] carries.
pub fn encode_png_base64(image: &RgbaImage) -> EngineResult<String> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .map_err(|e| EngineError::InvalidPattern(format!("png encode: {e}")))?;
    Ok(STANDARD.encode(bytes.into_inner()))
}
