use crate::exposure_stack::{ExposureStack, LayerVectors};
use crate::mask_image::MaskImage;

/// Turns per-position weights (0..255 scale) into per-exposure binary masks.
#[derive(Clone, Copy)]
pub struct Thresholder {
    /// Weights at or above this value are unmasked.
    pub threshold: f32,
    /// In simple mode each layer is thresholded independently, which can
    /// mask out every exposure at a position. The default mode additionally
    /// unmasks the locally best layer so no canvas position is left without
    /// content (ties go to the lowest layer index).
    pub simple: bool,
}

impl Default for Thresholder {
    fn default() -> Thresholder {
        Thresholder {
            threshold: 150.0,
            simple: false,
        }
    }
}

impl Thresholder {
    /// Produces one mask per exposure, 255 where the exposure should be used.
    /// Local pixels never covered by their exposure stay 0.
    pub fn masks(&self, stack: &ExposureStack, weights: &LayerVectors) -> Vec<MaskImage> {
        let mut masks: Vec<MaskImage> = stack
            .exposures()
            .iter()
            .map(|e| MaskImage::new(e.photo.width, e.photo.height))
            .collect();

        for y in 0..weights.height() {
            for x in 0..weights.width() {
                let cell = weights.cell(weights.position_index(x, y));
                if cell.is_empty() {
                    continue;
                }
                let mut best = 0usize;
                for (k, sample) in cell.iter().enumerate() {
                    if sample.value > cell[best].value {
                        best = k;
                    }
                }
                for (k, sample) in cell.iter().enumerate() {
                    let unmasked =
                        sample.value >= self.threshold || (!self.simple && k == best);
                    if unmasked {
                        let exposure = &stack.exposures()[sample.layer];
                        masks[sample.layer].set(
                            x - exposure.x_offset,
                            y - exposure.y_offset,
                            255,
                        );
                    }
                }
            }
        }
        masks
    }
}

/// The brightness/contrast point remap used to steepen weight images before
/// thresholding, over the fixed value range [0, 255]:
///
/// ```text
/// v1  = v / 255
/// b'  = v1^(1/brightness)
/// v2  = 2 b' - 1
/// out = 255 * (sign(v2) |v2|^(1/contrast) + 1) / 2
/// ```
///
/// `brightness = contrast = 1` is the identity; contrast above 1 pushes
/// values away from the midpoint 127.5, which stays fixed.
pub fn brightness_contrast(v: f32, brightness: f32, contrast: f32) -> f32 {
    let v1 = v.clamp(0.0, 255.0) / 255.0;
    let brightened = v1.powf(1.0 / brightness);
    let v2 = 2.0 * brightened - 1.0;
    let contrasted = v2.signum() * v2.abs().powf(1.0 / contrast);
    255.0 * (contrasted + 1.0) / 2.0
}
