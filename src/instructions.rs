//! Instruction chain for the hosting provider's renderer
//!
//! The renderer applies instructions left to right, so the order of the
//! chain is part of its meaning. Tokens are joined with `/`.

use crate::geometry::{Gravity, ResolvedGeometry, ScaledPlacement};
use serde::{Serialize, Serializer};
use std::fmt;

/// One rendering operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Resize the base image to the canvas
    Scale { width: u32, height: u32 },
    /// HSB brightness delta
    Brightness(i32),
    /// Blur radius
    Blur(u32),
    /// Start an overlay layer from another hosted image
    Overlay { public_id: String },
    /// Fill-crop the current layer to a size
    Fill { width: u32, height: u32 },
    /// Crop, optionally anchored at a gravity
    Crop {
        width: u32,
        height: u32,
        gravity: Option<Gravity>,
    },
    /// Close the overlay layer at an offset
    LayerApply { x: i32, y: i32 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale { width, height } => write!(f, "c_scale,w_{width},h_{height}"),
            Self::Brightness(delta) => write!(f, "e_brightness_hsb:{delta}"),
            Self::Blur(radius) => write!(f, "e_blur:{radius}"),
            // Nested ids use ':' in layer references
            Self::Overlay { public_id } => write!(f, "l_{}", public_id.replace('/', ":")),
            Self::Fill { width, height } => write!(f, "c_fill,w_{width},h_{height}"),
            Self::Crop {
                width,
                height,
                gravity: Some(gravity),
            } => write!(f, "c_crop,g_{gravity},w_{width},h_{height}"),
            Self::Crop {
                width,
                height,
                gravity: None,
            } => write!(f, "c_crop,w_{width},h_{height}"),
            Self::LayerApply { x, y } => write!(f, "fl_layer_apply,y_{y},x_{x}"),
        }
    }
}

/// Ordered list of instructions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstructionChain(Vec<Instruction>);

impl InstructionChain {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.0.iter()
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }
}

impl fmt::Display for InstructionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{instruction}")?;
        }
        Ok(())
    }
}

impl Serialize for InstructionChain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Everything the builder needs, already resolved
#[derive(Debug, Clone, Copy)]
pub struct ChainSpec<'a> {
    pub geometry: &'a ResolvedGeometry,
    pub placement: &'a ScaledPlacement,
    pub subject_public_id: &'a str,
    pub scale: f64,
    pub offset_x: i32,
    pub offset_y: i32,
    pub gravity: Gravity,
    pub background_brightness: i32,
    pub background_blur: u32,
    pub final_brightness: i32,
}

/// Build the compositing chain
///
/// When the subject is enlarged (`scale >= 1`) an oversized crop, padded by
/// twice the offset on each axis, precedes the layer apply so the overlay is
/// not clipped before the final gravity crop. Shrunk subjects skip it.
#[must_use]
pub fn build(spec: &ChainSpec<'_>) -> InstructionChain {
    let canvas_w = spec.geometry.canvas_width;
    let canvas_h = spec.geometry.canvas_height;

    let mut chain = Vec::with_capacity(9);
    chain.push(Instruction::Scale {
        width: canvas_w,
        height: canvas_h,
    });
    chain.push(Instruction::Brightness(spec.background_brightness));
    chain.push(Instruction::Blur(spec.background_blur));
    chain.push(Instruction::Overlay {
        public_id: spec.subject_public_id.to_string(),
    });
    chain.push(Instruction::Fill {
        width: spec.placement.scaled_width,
        height: spec.placement.scaled_height,
    });
    if spec.scale >= 1.0 {
        chain.push(Instruction::Crop {
            width: canvas_w.saturating_add(spec.offset_x.unsigned_abs().saturating_mul(2)),
            height: canvas_h.saturating_add(spec.offset_y.unsigned_abs().saturating_mul(2)),
            gravity: None,
        });
    }
    chain.push(Instruction::LayerApply {
        x: spec.offset_x,
        y: spec.offset_y,
    });
    chain.push(Instruction::Crop {
        width: canvas_w,
        height: canvas_h,
        gravity: Some(spec.gravity),
    });
    chain.push(Instruction::Brightness(spec.final_brightness));

    tracing::trace!(
        tokens = chain.len(),
        scale = spec.scale,
        gravity = %spec.gravity,
        "Built instruction chain"
    );

    InstructionChain(chain)
}
