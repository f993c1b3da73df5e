//! Core data types for background-replacement compositing

use crate::error::{ImaginariumError, Result};
use serde::{Deserialize, Serialize};

/// Smallest subject scale the compositor accepts
pub const MIN_SCALE: f64 = 0.2;
/// Largest subject scale the compositor accepts
pub const MAX_SCALE: f64 = 5.0;
/// Brightness deltas are clamped to `-BRIGHTNESS_LIMIT..=BRIGHTNESS_LIMIT`
pub const BRIGHTNESS_LIMIT: i32 = 99;
/// Lower bound of the background blur radius
pub const MIN_BLUR: u32 = 1;
/// Upper bound of the background blur radius
pub const MAX_BLUR: u32 = 2000;

/// Natural pixel size of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build from signed values as they arrive from JSON or provider metadata
    ///
    /// # Errors
    /// - Either side is zero, negative or does not fit in `u32`
    pub fn from_signed(width: i64, height: i64) -> Result<Self> {
        let dims = Self {
            width: u32::try_from(width).map_err(|_| {
                ImaginariumError::invalid_dimensions(format!("width {width} is out of range"))
            })?,
            height: u32::try_from(height).map_err(|_| {
                ImaginariumError::invalid_dimensions(format!("height {height} is out of range"))
            })?,
        };
        dims.validate()?;
        Ok(dims)
    }

    /// Both sides must be non-zero
    ///
    /// # Errors
    /// - Width or height is zero
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ImaginariumError::invalid_dimensions(format!(
                "{}x{} has a zero side",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Width divided by height
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.width) / f64::from(self.height)
    }
}

/// An image hosted by the external provider
///
/// Immutable once issued: the provider owns the binary and hands back this
/// handle plus the natural size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub public_id: String,
    pub width: u32,
    pub height: u32,
    pub secure_url: String,
}

impl ImageAsset {
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

/// Everything the user controls when compositing a subject onto a background
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionInputs {
    pub background: ImageAsset,
    pub subject: ImageAsset,
    pub scale: f64,
    pub offset_x: i32,
    pub offset_y: i32,
    /// Applied to the final composited image
    pub subject_brightness: i32,
    pub background_brightness: i32,
    pub background_blur: u32,
}

impl CompositionInputs {
    /// Inputs with every slider at its default position
    #[must_use]
    pub fn new(background: ImageAsset, subject: ImageAsset) -> Self {
        Self {
            background,
            subject,
            scale: 1.0,
            offset_x: 0,
            offset_y: 0,
            subject_brightness: 0,
            background_brightness: 0,
            background_blur: MIN_BLUR,
        }
    }

    #[must_use]
    pub fn builder(background: ImageAsset, subject: ImageAsset) -> CompositionInputsBuilder {
        CompositionInputsBuilder {
            inputs: Self::new(background, subject),
        }
    }

    /// Produce the next inputs value for a single user change
    ///
    /// Values are clamped to the ranges the sliders allow, so the result is
    /// always within bounds.
    #[must_use]
    pub fn apply(&self, change: InputChange) -> Self {
        let mut next = self.clone();
        match change {
            InputChange::Scale(scale) => next.scale = clamp_scale(scale),
            InputChange::OffsetX(x) => next.offset_x = x,
            InputChange::OffsetY(y) => next.offset_y = y,
            InputChange::SubjectBrightness(b) => next.subject_brightness = clamp_brightness(b),
            InputChange::BackgroundBrightness(b) => {
                next.background_brightness = clamp_brightness(b);
            },
            InputChange::BackgroundBlur(blur) => next.background_blur = clamp_blur(blur),
            InputChange::Background(asset) => next.background = asset,
            InputChange::Subject(asset) => next.subject = asset,
        }
        next
    }

    /// Check ranges and image sizes
    ///
    /// # Errors
    /// - Zero-sized background or subject
    /// - Non-finite scale
    /// - Brightness or blur outside the slider ranges
    pub fn validate(&self) -> Result<()> {
        self.background.dimensions().validate()?;
        self.subject.dimensions().validate()?;

        if !self.scale.is_finite() {
            return Err(ImaginariumError::invalid_dimensions(format!(
                "scale {} is not a finite number",
                self.scale
            )));
        }

        for (name, value) in [
            ("subject brightness", self.subject_brightness),
            ("background brightness", self.background_brightness),
        ] {
            if value.abs() > BRIGHTNESS_LIMIT {
                return Err(ImaginariumError::config_value_error(
                    name,
                    value,
                    "-99..99",
                    Some(0),
                ));
            }
        }

        if !(MIN_BLUR..=MAX_BLUR).contains(&self.background_blur) {
            return Err(ImaginariumError::config_value_error(
                "background blur",
                self.background_blur,
                "1..2000",
                Some(MIN_BLUR),
            ));
        }

        Ok(())
    }
}

/// A single slider or picker change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum InputChange {
    Scale(f64),
    OffsetX(i32),
    OffsetY(i32),
    SubjectBrightness(i32),
    BackgroundBrightness(i32),
    BackgroundBlur(u32),
    Background(ImageAsset),
    Subject(ImageAsset),
}

/// Builder for `CompositionInputs`
#[derive(Debug)]
pub struct CompositionInputsBuilder {
    inputs: CompositionInputs,
}

impl CompositionInputsBuilder {
    /// Set subject scale (clamped to 0.2..=5.0)
    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.inputs.scale = clamp_scale(scale);
        self
    }

    /// Set both offsets
    #[must_use]
    pub fn offset(mut self, x: i32, y: i32) -> Self {
        self.inputs.offset_x = x;
        self.inputs.offset_y = y;
        self
    }

    /// Set final image brightness (clamped to -99..=99)
    #[must_use]
    pub fn subject_brightness(mut self, brightness: i32) -> Self {
        self.inputs.subject_brightness = clamp_brightness(brightness);
        self
    }

    /// Set background brightness (clamped to -99..=99)
    #[must_use]
    pub fn background_brightness(mut self, brightness: i32) -> Self {
        self.inputs.background_brightness = clamp_brightness(brightness);
        self
    }

    /// Set background blur (clamped to 1..=2000)
    #[must_use]
    pub fn background_blur(mut self, blur: u32) -> Self {
        self.inputs.background_blur = clamp_blur(blur);
        self
    }

    /// Build the inputs, validating image sizes and scale
    ///
    /// # Errors
    /// - Any validation failure from [`CompositionInputs::validate`]
    pub fn build(self) -> Result<CompositionInputs> {
        self.inputs.validate()?;
        Ok(self.inputs)
    }
}

/// NaN passes through unchanged so validation can reject it
pub(crate) fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        scale
    } else {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    }
}

fn clamp_brightness(value: i32) -> i32 {
    value.clamp(-BRIGHTNESS_LIMIT, BRIGHTNESS_LIMIT)
}

fn clamp_blur(value: u32) -> u32 {
    value.clamp(MIN_BLUR, MAX_BLUR)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::ImageAsset;

    pub(crate) fn asset(public_id: &str, width: u32, height: u32) -> ImageAsset {
        ImageAsset {
            public_id: public_id.to_string(),
            width,
            height,
            secure_url: format!("https://res.example.com/{public_id}.png"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::asset;
    use super::*;

    #[test]
    fn test_default_inputs() {
        let inputs = CompositionInputs::new(asset("bg", 1280, 1920), asset("fg", 613, 407));
        assert!((inputs.scale - 1.0).abs() < f64::EPSILON);
        assert_eq!(inputs.offset_x, 0);
        assert_eq!(inputs.offset_y, 0);
        assert_eq!(inputs.background_blur, 1);
        assert!(inputs.validate().is_ok());
    }

    #[test]
    fn test_builder_clamps_slider_values() {
        let inputs = CompositionInputs::builder(asset("bg", 100, 100), asset("fg", 50, 50))
            .scale(9.0)
            .subject_brightness(150)
            .background_brightness(-300)
            .background_blur(0)
            .build()
            .unwrap();

        assert!((inputs.scale - MAX_SCALE).abs() < f64::EPSILON);
        assert_eq!(inputs.subject_brightness, 99);
        assert_eq!(inputs.background_brightness, -99);
        assert_eq!(inputs.background_blur, 1);
    }

    #[test]
    fn test_builder_rejects_nan_scale() {
        let result = CompositionInputs::builder(asset("bg", 100, 100), asset("fg", 50, 50))
            .scale(f64::NAN)
            .build();
        assert!(matches!(result, Err(ImaginariumError::InvalidDimensions(_))));
    }

    #[test]
    fn test_builder_rejects_zero_sized_images() {
        let result = CompositionInputs::builder(asset("bg", 0, 100), asset("fg", 50, 50)).build();
        assert!(matches!(result, Err(ImaginariumError::InvalidDimensions(_))));
    }

    #[test]
    fn test_reducer_does_not_mutate_previous_value() {
        let first = CompositionInputs::new(asset("bg", 100, 100), asset("fg", 50, 50));
        let second = first.apply(InputChange::OffsetX(-40));
        let third = second.apply(InputChange::Scale(0.1));

        assert_eq!(first.offset_x, 0);
        assert_eq!(second.offset_x, -40);
        assert_eq!(third.offset_x, -40);
        assert!((third.scale - MIN_SCALE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reducer_replaces_assets() {
        let first = CompositionInputs::new(asset("bg", 100, 100), asset("fg", 50, 50));
        let next = first.apply(InputChange::Background(asset("beach", 1920, 1080)));
        assert_eq!(next.background.public_id, "beach");
        assert_eq!(next.subject.public_id, "fg");
    }

    #[test]
    fn test_dimensions_from_signed() {
        assert!(Dimensions::from_signed(1000, 500).is_ok());
        assert!(Dimensions::from_signed(0, 500).is_err());
        assert!(Dimensions::from_signed(-1, 500).is_err());
        assert!(Dimensions::from_signed(100, i64::MAX).is_err());
    }

    #[test]
    fn test_input_change_serde_shape() {
        let change: InputChange =
            serde_json::from_str(r#"{"field":"offset_y","value":-12}"#).unwrap();
        assert_eq!(change, InputChange::OffsetY(-12));
    }
}
