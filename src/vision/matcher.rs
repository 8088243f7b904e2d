//! Template matching with the `TM_CCOEFF_NORMED` score.
//!
//! Both images are converted to 8-bit luma. For every placement of the template the
//! score is
//!
//! ```text
//!            Σ (T - mean T)(I - mean I)
//! R = ---------------------------------------
//!     sqrt(Σ (T - mean T)² · Σ (I - mean I)²)
//! ```
//!
//! The raw cross term `Σ T·I` comes from `imageproc`'s parallel template matcher and the
//! window sums from integral images; the mean correction is applied per placement.
//! Negative correlation is reported as confidence 0.

use image::{GrayImage, ImageBuffer, Luma, RgbaImage, imageops};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template_parallel};
use tracing::{debug, warn};

use super::MatchResult;
use crate::error::EngineResult;
use crate::model::Coordinate;

/// Variance below this is treated as a flat (featureless) patch.
const FLAT_EPSILON: f64 = 1e-6;

/// Find the single best placement of `template` inside `screen`.
///
/// Returns `Ok(None)` when the template is empty or larger than the screen.
pub fn best_match(screen: &RgbaImage, template: &RgbaImage) -> EngineResult<Option<MatchResult>> {
    let screen = imageops::grayscale(screen);
    let template = imageops::grayscale(template);
    Ok(best_match_gray(&screen, &template))
}

fn best_match_gray(screen: &GrayImage, template: &GrayImage) -> Option<MatchResult> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 {
        warn!(target: "stepbot::vision", "Template is empty");
        return None;
    }
    if tw > sw || th > sh {
        warn!(
            target: "stepbot::vision",
            template_w = tw, template_h = th, screen_w = sw, screen_h = sh,
            "Template is larger than screenshot"
        );
        return None;
    }

    let n = f64::from(tw) * f64::from(th);
    let (t_sum, t_sq) = template.pixels().fold((0.0, 0.0), |(s, q), p| {
        let v = f64::from(p.0[0]);
        (s + v, q + v * v)
    });
    let t_mean = t_sum / n;
    let t_var = t_sq - t_sum * t_sum / n;

    let cross = match_template_parallel(screen, template, MatchTemplateMethod::CrossCorrelation);
    let windows = WindowSums::new(screen);

    let scores: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(cross.width(), cross.height(), |x, y| {
            let (sum, sum_sq) = windows.window(x, y, tw, th);
            let w_var = sum_sq - sum * sum / n;
            let score = if t_var < FLAT_EPSILON || w_var < FLAT_EPSILON {
                if t_var < FLAT_EPSILON && w_var < FLAT_EPSILON && (sum / n - t_mean).abs() < 1.0 {
                    1.0
                } else {
                    0.0
                }
            } else {
                // Σ (T - mean T)(I - mean I) = Σ T·I - mean T · Σ I
                let centered = f64::from(cross.get_pixel(x, y).0[0]) - t_mean * sum;
                (centered / (t_var * w_var).sqrt()).clamp(0.0, 1.0)
            };
            Luma([score as f32])
        });

    let extremes = find_extremes(&scores);
    let (x, y) = extremes.max_value_location;
    let confidence = f64::from(extremes.max_value);
    let result = MatchResult {
        coordinate: Coordinate::new((x + tw / 2) as i32, (y + th / 2) as i32),
        confidence,
        top_left: Coordinate::new(x as i32, y as i32),
        bottom_right: Coordinate::new((x + tw) as i32, (y + th) as i32),
    };
    debug!(
        target: "stepbot::vision",
        confidence, x = result.coordinate.x, y = result.coordinate.y,
        "Best template match"
    );
    Some(result)
}

/// Window sums of pixel values and squared pixel values over a screen.
struct WindowSums {
    sum: ImageBuffer<Luma<u64>, Vec<u64>>,
    sum_sq: ImageBuffer<Luma<u64>, Vec<u64>>,
}

impl WindowSums {
    fn new(image: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(image),
            sum_sq: integral_squared_image::<_, u64>(image),
        }
    }

    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> (f64, f64) {
        // Integral images are one pixel larger than the source: I(x, y) sums F over x' < x, y' < y.
        let rect = |t: &ImageBuffer<Luma<u64>, Vec<u64>>| {
            let at = |x: u32, y: u32| t.get_pixel(x, y).0[0] as f64;
            at(x + w, y + h) - at(x, y + h) - at(x + w, y) + at(x, y)
        };
        (rect(&self.sum), rect(&self.sum_sq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Deterministic noise so every window is distinct.
    fn noise(width: u32, height: u32, seed: u32) -> RgbaImage {
        let mut state = seed;
        RgbaImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let v = (state >> 16) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn crop(img: &RgbaImage, x: u32, y: u32, w: u32, h: u32) -> RgbaImage {
        imageops::crop_imm(img, x, y, w, h).to_image()
    }

    #[test]
    fn finds_exact_subimage() {
        let screen = noise(40, 30, 7);
        let template = crop(&screen, 11, 9, 6, 5);
        let m = best_match(&screen, &template).unwrap().unwrap();
        assert_eq!(m.top_left, Coordinate::new(11, 9));
        assert_eq!(m.coordinate, Coordinate::new(14, 11));
        assert_eq!(m.bottom_right, Coordinate::new(17, 14));
        assert!(m.confidence > 0.999, "confidence {}", m.confidence);
    }

    #[test]
    fn brightness_and_contrast_changes_still_match() {
        let screen = noise(40, 30, 11);
        let template = RgbaImage::from_fn(6, 5, |x, y| {
            let v = screen.get_pixel(20 + x, 4 + y).0[0] / 2 + 60;
            Rgba([v, v, v, 255])
        });
        let m = best_match(&screen, &template).unwrap().unwrap();
        assert_eq!(m.top_left, Coordinate::new(20, 4));
        assert!(m.confidence > 0.95, "confidence {}", m.confidence);
    }

    #[test]
    fn oversized_template_matches_nothing() {
        let screen = noise(5, 5, 1);
        let template = noise(6, 2, 2);
        assert!(best_match(&screen, &template).unwrap().is_none());
    }

    #[test]
    fn threshold_is_inclusive_on_find_match() {
        use crate::vision::ScreenVision;

        struct Fixed;
        impl ScreenVision for Fixed {
            fn capture_full_screen(&self) -> EngineResult<RgbaImage> {
                Ok(noise(8, 8, 3))
            }
        }

        let screen = noise(20, 20, 5);
        let template = crop(&screen, 2, 3, 4, 4);
        let best = best_match(&screen, &template).unwrap().unwrap();
        let at = Fixed
            .find_match(&screen, &template, best.confidence)
            .unwrap();
        assert_eq!(at, Some(best));
        let above = Fixed
            .find_match(&screen, &template, best.confidence + 1e-6)
            .unwrap();
        assert!(above.is_none());
    }

    #[test]
    fn flat_regions_compare_by_mean() {
        let screen = RgbaImage::from_pixel(6, 6, Rgba([200, 200, 200, 255]));
        let same = RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 255]));
        let darker = RgbaImage::from_pixel(2, 2, Rgba([20, 20, 20, 255]));
        assert_eq!(best_match(&screen, &same).unwrap().unwrap().confidence, 1.0);
        assert_eq!(best_match(&screen, &darker).unwrap().unwrap().confidence, 0.0);
    }
}
