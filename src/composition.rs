//! Pure derivation from composition inputs to a rendered instruction chain

use crate::error::Result;
use crate::geometry::{self, Gravity, ResolvedGeometry, ScaledPlacement};
use crate::instructions::{self, ChainSpec, InstructionChain};
use crate::types::CompositionInputs;
use serde::Serialize;

/// Everything derived from one `CompositionInputs` value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub geometry: ResolvedGeometry,
    pub placement: ScaledPlacement,
    pub gravity: Gravity,
    pub instructions: InstructionChain,
}

impl Composition {
    /// The `/`-delimited transformation for the hosting provider
    #[must_use]
    pub fn transformation(&self) -> String {
        self.instructions.to_string()
    }
}

/// Resolve geometry, placement and gravity, then build the chain
///
/// # Errors
/// - `InvalidDimensions` for zero-sized images or a non-finite scale; no
///   partial chain is ever produced
pub fn compose(inputs: &CompositionInputs) -> Result<Composition> {
    let geometry = geometry::resolve(inputs.background.dimensions(), inputs.subject.dimensions())?;
    let placement =
        geometry::apply_scale(geometry.subject_width, geometry.subject_height, inputs.scale)?;
    let gravity = geometry::gravity(inputs.offset_x, inputs.offset_y);

    let instructions = instructions::build(&ChainSpec {
        geometry: &geometry,
        placement: &placement,
        subject_public_id: &inputs.subject.public_id,
        scale: inputs.scale,
        offset_x: inputs.offset_x,
        offset_y: inputs.offset_y,
        gravity,
        background_brightness: inputs.background_brightness,
        background_blur: inputs.background_blur,
        final_brightness: inputs.subject_brightness,
    });

    Ok(Composition {
        geometry,
        placement,
        gravity,
        instructions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImaginariumError;
    use crate::types::fixtures::asset;
    use crate::types::InputChange;

    #[test]
    fn test_compose_default_inputs() {
        let inputs = CompositionInputs::new(asset("beach", 1280, 1920), asset("cutout", 613, 407));
        let composition = compose(&inputs).unwrap();

        assert_eq!(composition.geometry.canvas_width, 853);
        assert_eq!(composition.placement.scaled_width, 853);
        assert_eq!(composition.gravity, Gravity::NorthWest);
        assert_eq!(
            composition.transformation(),
            "c_scale,w_853,h_1280/e_brightness_hsb:0/e_blur:1/l_cutout/c_fill,w_853,h_566/\
             c_crop,w_853,h_1280/fl_layer_apply,y_0,x_0/c_crop,g_north_west,w_853,h_1280/\
             e_brightness_hsb:0"
        );
    }

    #[test]
    fn test_compose_follows_reducer_changes() {
        let inputs = CompositionInputs::new(asset("bg", 1000, 1000), asset("fg", 500, 500))
            .apply(InputChange::Scale(0.5))
            .apply(InputChange::OffsetX(-100))
            .apply(InputChange::OffsetY(-50));
        let composition = compose(&inputs).unwrap();

        assert_eq!(composition.gravity, Gravity::SouthEast);
        assert_eq!(composition.placement.scaled_width, 640);
        assert_eq!(composition.instructions.len(), 8);
    }

    #[test]
    fn test_compose_fails_before_building_chain() {
        let inputs = CompositionInputs::new(asset("bg", 1000, 0), asset("fg", 500, 500));
        assert!(matches!(
            compose(&inputs),
            Err(ImaginariumError::InvalidDimensions(_))
        ));
    }

    #[test]
    fn test_compose_is_pure() {
        let inputs = CompositionInputs::new(asset("bg", 1920, 1080), asset("fg", 300, 900))
            .apply(InputChange::Scale(2.3));
        assert_eq!(compose(&inputs).unwrap(), compose(&inputs).unwrap());
    }
}
