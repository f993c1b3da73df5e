//! Canvas and subject placement arithmetic
//!
//! The canvas takes the background's aspect ratio with its long edge fixed at
//! [`CANVAS_LONG_EDGE`]. The subject is fitted to the canvas height, then
//! narrowed to the canvas width if it would overflow. Everything here is pure.

use crate::error::{ImaginariumError, Result};
use crate::types::{clamp_scale, Dimensions};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Long edge of the composited canvas in pixels
pub const CANVAS_LONG_EDGE: u32 = 1280;

/// Canvas size and the unscaled subject placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedGeometry {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub subject_width: u32,
    pub subject_height: u32,
}

impl ResolvedGeometry {
    #[must_use]
    pub fn canvas(&self) -> Dimensions {
        Dimensions::new(self.canvas_width, self.canvas_height)
    }

    /// Offset range the placement sliders allow: half the canvas each way
    #[must_use]
    pub fn offset_bounds(&self) -> OffsetBounds {
        let half_w = round_half_up(f64::from(self.canvas_width) / 2.0) as i32;
        let half_h = round_half_up(f64::from(self.canvas_height) / 2.0) as i32;
        OffsetBounds {
            x: (-half_w, half_w),
            y: (-half_h, half_h),
        }
    }
}

/// Inclusive `(min, max)` offset ranges per axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetBounds {
    pub x: (i32, i32),
    pub y: (i32, i32),
}

impl OffsetBounds {
    /// Clamp an offset pair into range
    #[must_use]
    pub fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        (x.clamp(self.x.0, self.x.1), y.clamp(self.y.0, self.y.1))
    }
}

/// Subject size after the user's scale factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledPlacement {
    pub scaled_width: u32,
    pub scaled_height: u32,
}

/// Anchor corner for the final crop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gravity {
    NorthWest,
    SouthWest,
    NorthEast,
    SouthEast,
}

impl Gravity {
    /// Renderer keyword for this gravity
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NorthWest => "north_west",
            Self::SouthWest => "south_west",
            Self::NorthEast => "north_east",
            Self::SouthEast => "south_east",
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve canvas and subject placement sizes
///
/// # Errors
/// - `InvalidDimensions` if either image has a zero side
pub fn resolve(background: Dimensions, subject: Dimensions) -> Result<ResolvedGeometry> {
    background.validate()?;
    subject.validate()?;

    let long = f64::from(CANVAS_LONG_EDGE);
    let bg_ar = background.aspect_ratio();
    let (canvas_width, canvas_height) = if bg_ar >= 1.0 {
        (CANVAS_LONG_EDGE, round_px(long / bg_ar))
    } else {
        (round_px(long * bg_ar), CANVAS_LONG_EDGE)
    };

    let subject_ar = subject.aspect_ratio();
    let mut subject_height = canvas_height;
    let mut subject_width = round_px(f64::from(subject_height) * subject_ar);
    if subject_width > canvas_width {
        subject_width = canvas_width;
        subject_height = round_px(f64::from(subject_width) / subject_ar);
    }

    Ok(ResolvedGeometry {
        canvas_width,
        canvas_height,
        subject_width,
        subject_height,
    })
}

/// Apply the user's scale factor to the subject placement
///
/// Scale is clamped to 0.2..=5.0.
///
/// # Errors
/// - `InvalidDimensions` if `scale` is NaN or infinite
pub fn apply_scale(subject_width: u32, subject_height: u32, scale: f64) -> Result<ScaledPlacement> {
    if !scale.is_finite() {
        return Err(ImaginariumError::invalid_dimensions(format!(
            "scale {scale} is not a finite number"
        )));
    }
    let scale = clamp_scale(scale);

    Ok(ScaledPlacement {
        scaled_width: round_half_up(f64::from(subject_width) * scale) as u32,
        scaled_height: round_half_up(f64::from(subject_height) * scale) as u32,
    })
}

/// Map offset signs to a crop anchor; zero counts as non-negative
#[must_use]
pub fn gravity(offset_x: i32, offset_y: i32) -> Gravity {
    match (offset_x >= 0, offset_y >= 0) {
        (true, true) => Gravity::NorthWest,
        (true, false) => Gravity::SouthWest,
        (false, true) => Gravity::NorthEast,
        (false, false) => Gravity::SouthEast,
    }
}

/// Half-up rounding, matching the renderer's client library
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Derived edges never collapse below one pixel
fn round_px(value: f64) -> u32 {
    (round_half_up(value) as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions::new(width, height)
    }

    #[test]
    fn test_square_background_clamps_wide_subject() {
        let geometry = resolve(dims(1000, 1000), dims(2000, 1000)).unwrap();
        assert_eq!(geometry.canvas_width, 1280);
        assert_eq!(geometry.canvas_height, 1280);
        // 2560 wide at full canvas height, clamped back to the canvas width
        assert_eq!(geometry.subject_width, 1280);
        assert_eq!(geometry.subject_height, 640);
    }

    #[test]
    fn test_portrait_background() {
        let geometry = resolve(dims(1280, 1920), dims(613, 407)).unwrap();
        assert_eq!(geometry.canvas_height, 1280);
        assert_eq!(geometry.canvas_width, 853);
        assert_eq!(geometry.subject_width, 853);
        assert_eq!(geometry.subject_height, 566);
    }

    #[test]
    fn test_landscape_background_with_tall_subject() {
        let geometry = resolve(dims(1920, 1080), dims(400, 800)).unwrap();
        assert_eq!(geometry.canvas_width, 1280);
        assert_eq!(geometry.canvas_height, 720);
        assert_eq!(geometry.subject_height, 720);
        assert_eq!(geometry.subject_width, 360);
    }

    #[test]
    fn test_long_edge_is_always_1280() {
        let sizes = [
            (1, 1),
            (3, 7),
            (7, 3),
            (1000, 1334),
            (1778, 1000),
            (4096, 17),
            (17, 4096),
            (12345, 6789),
        ];
        for (w, h) in sizes {
            let g = resolve(dims(w, h), dims(10, 10)).unwrap();
            assert!(g.canvas_width <= CANVAS_LONG_EDGE && g.canvas_height <= CANVAS_LONG_EDGE);
            assert_eq!(g.canvas_width.max(g.canvas_height), CANVAS_LONG_EDGE);

            // Aspect ratio preserved to within a pixel on the short edge
            let expected_short = if w >= h {
                1280.0 * f64::from(h) / f64::from(w)
            } else {
                1280.0 * f64::from(w) / f64::from(h)
            };
            let short = f64::from(g.canvas_width.min(g.canvas_height));
            assert!((short - expected_short.max(1.0)).abs() <= 1.0, "{w}x{h}");
        }
    }

    #[test]
    fn test_subject_never_exceeds_canvas() {
        for (sw, sh) in [(1, 1000), (1000, 1), (640, 480), (5000, 5000)] {
            let g = resolve(dims(1600, 900), dims(sw, sh)).unwrap();
            assert!(g.subject_width <= g.canvas_width);
            assert!(g.subject_height <= g.canvas_height);
        }
    }

    #[test]
    fn test_zero_dimensions_fail_fast() {
        assert!(matches!(
            resolve(dims(0, 100), dims(10, 10)),
            Err(ImaginariumError::InvalidDimensions(_))
        ));
        assert!(matches!(
            resolve(dims(100, 100), dims(10, 0)),
            Err(ImaginariumError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let a = resolve(dims(1333, 777), dims(421, 999)).unwrap();
        let b = resolve(dims(1333, 777), dims(421, 999)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_apply_scale() {
        assert_eq!(
            apply_scale(100, 50, 2.0).unwrap(),
            ScaledPlacement {
                scaled_width: 200,
                scaled_height: 100
            }
        );
        assert_eq!(
            apply_scale(100, 50, 0.5).unwrap(),
            ScaledPlacement {
                scaled_width: 50,
                scaled_height: 25
            }
        );
    }

    #[test]
    fn test_apply_scale_clamps_out_of_range() {
        let big = apply_scale(100, 50, 10.0).unwrap();
        assert_eq!((big.scaled_width, big.scaled_height), (500, 250));

        let small = apply_scale(100, 50, 0.01).unwrap();
        assert_eq!((small.scaled_width, small.scaled_height), (20, 10));
    }

    #[test]
    fn test_apply_scale_rejects_nan() {
        assert!(apply_scale(100, 50, f64::NAN).is_err());
        assert!(apply_scale(100, 50, f64::INFINITY).is_err());
    }

    #[test]
    fn test_gravity_quadrants() {
        assert_eq!(gravity(0, 0), Gravity::NorthWest);
        assert_eq!(gravity(-1, 0), Gravity::NorthEast);
        assert_eq!(gravity(0, -1), Gravity::SouthWest);
        assert_eq!(gravity(-1, -1), Gravity::SouthEast);
        assert_eq!(gravity(25, 40), Gravity::NorthWest);
        assert_eq!(gravity(-1, -1).to_string(), "south_east");
    }

    #[test]
    fn test_offset_bounds() {
        let g = resolve(dims(1280, 1920), dims(613, 407)).unwrap();
        let bounds = g.offset_bounds();
        assert_eq!(bounds.x, (-427, 427));
        assert_eq!(bounds.y, (-640, 640));
        assert_eq!(bounds.clamp(1000, -1000), (427, -640));
    }

    #[test]
    fn test_round_half_up() {
        assert!((round_half_up(2.5) - 3.0).abs() < f64::EPSILON);
        assert!((round_half_up(-2.5) - -2.0).abs() < f64::EPSILON);
        assert!((round_half_up(2.4) - 2.0).abs() < f64::EPSILON);
    }
}
