//! Fusing an exposure stack into a single canvas-sized image.

use crate::exposure_stack::{ExposureStack, StackError};
use crate::gray_image::GrayImage;
use crate::photo::Photo;

/// Blends the stack with per-exposure scalar weight planes.
///
/// Every exposure's RGB pixels are scaled by its weight plane and
/// accumulated at its canvas offset. The planes are expected to be
/// normalized per canvas position (the deghosting weights sum to 1), so no
/// further division happens here. The output alpha is the saturating union
/// of the input coverages.
///
/// # Errors
/// The same plane count/size checks as
/// [`crate::exposure_stack::ExposureStack::remap`].
pub fn blend_weighted(
    stack: &ExposureStack,
    weight_planes: &[GrayImage],
) -> Result<Photo, StackError> {
    if weight_planes.len() != stack.layer_count() {
        return Err(StackError::PlaneCountMismatch {
            expected: stack.layer_count(),
            actual: weight_planes.len(),
        });
    }
    let width = stack.width();
    let height = stack.height();
    let mut img_data = vec![0.0f32; width * height * 3];
    let mut alpha = vec![0u8; width * height];

    for (layer, (exposure, weights)) in stack.exposures().iter().zip(weight_planes).enumerate() {
        let photo = &exposure.photo;
        if weights.width != photo.width || weights.height != photo.height {
            return Err(StackError::PlaneSizeMismatch { layer });
        }
        for y in 0..photo.height {
            for x in 0..photo.width {
                let position = (y + exposure.y_offset) * width + x + exposure.x_offset;
                let (r, g, b) = photo.get_rgb(x, y);
                let w = weights.get(x, y);
                img_data[position * 3] += r * w;
                img_data[position * 3 + 1] += g * w;
                img_data[position * 3 + 2] += b * w;
                alpha[position] = alpha[position].saturating_add(photo.get_alpha(x, y));
            }
        }
    }

    Ok(Photo {
        img_data,
        alpha: Some(alpha),
        width,
        height,
    })
}

/// Plain exposure-fusion merge without deghosting.
///
/// Per canvas pixel, each covering exposure votes with the triangular
/// exposedness weight `w = 0.5 - |a/255 - 0.5|` of its 8-bit luminance `a`,
/// so mid-gray pixels dominate and clipped ones contribute nothing. When
/// every sample is clipped the pixel falls back to the darkest sample if
/// the position is blown out, or the brightest if it is black.
pub fn merge_average(stack: &ExposureStack) -> Photo {
    let width = stack.width();
    let height = stack.height();
    let mut img_data = vec![0.0f32; width * height * 3];
    let mut alpha = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let mut weight_sum = 0.0f32;
            let mut accum = [0.0f32; 3];
            let mut min_rgb = [f32::MAX; 3];
            let mut max_rgb = [f32::MIN; 3];
            let mut luma_sum = 0.0f32;
            let mut covered = 0usize;

            for exposure in stack.exposures() {
                let photo = &exposure.photo;
                if x < exposure.x_offset || y < exposure.y_offset {
                    continue;
                }
                let lx = x - exposure.x_offset;
                let ly = y - exposure.y_offset;
                if lx >= photo.width || ly >= photo.height || !photo.is_covered(lx, ly) {
                    continue;
                }
                covered += 1;
                let (r, g, b) = photo.get_rgb(lx, ly);
                let a = photo.luminance(lx, ly).clamp(0.0, 255.0);
                luma_sum += a;
                let w = 0.5 - (a / 255.0 - 0.5).abs();
                weight_sum += w;
                accum[0] += r * w;
                accum[1] += g * w;
                accum[2] += b * w;
                for (c, v) in [r, g, b].into_iter().enumerate() {
                    min_rgb[c] = min_rgb[c].min(v);
                    max_rgb[c] = max_rgb[c].max(v);
                }
            }

            if covered == 0 {
                continue;
            }
            let position = y * width + x;
            alpha[position] = 255;
            let rgb = if weight_sum > 0.0 {
                [
                    accum[0] / weight_sum,
                    accum[1] / weight_sum,
                    accum[2] / weight_sum,
                ]
            } else if luma_sum / covered as f32 >= 127.5 {
                min_rgb // everything blown out: keep the least clipped sample
            } else {
                max_rgb // everything black: keep the brightest sample
            };
            img_data[position * 3] = rgb[0];
            img_data[position * 3 + 1] = rgb[1];
            img_data[position * 3 + 2] = rgb[2];
        }
    }

    Photo {
        img_data,
        alpha: Some(alpha),
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::exposure_stack::Exposure;
    use std::rc::Rc;

    fn gray_photo(width: usize, height: usize, v: f32) -> Rc<Photo> {
        Rc::new(Photo {
            img_data: vec![v; width * height * 3],
            alpha: None,
            width,
            height,
        })
    }

    #[test]
    fn weighted_blend_mixes_by_weight() {
        let stack = ExposureStack::new(vec![
            Exposure {
                photo: gray_photo(2, 2, 100.0),
                x_offset: 0,
                y_offset: 0,
            },
            Exposure {
                photo: gray_photo(2, 2, 200.0),
                x_offset: 0,
                y_offset: 0,
            },
        ])
        .unwrap();
        let planes = vec![
            GrayImage {
                data: vec![0.25; 4],
                width: 2,
                height: 2,
            },
            GrayImage {
                data: vec![0.75; 4],
                width: 2,
                height: 2,
            },
        ];
        let fused = blend_weighted(&stack, &planes).unwrap();
        let (r, _, _) = fused.get_rgb(1, 1);
        assert_relative_eq!(r, 0.25 * 100.0 + 0.75 * 200.0, epsilon = 1e-4);
        assert_eq!(fused.get_alpha(0, 0), 255);
    }

    #[test]
    fn weighted_blend_respects_offsets() {
        let stack = ExposureStack::new(vec![
            Exposure {
                photo: gray_photo(2, 1, 100.0),
                x_offset: 0,
                y_offset: 0,
            },
            Exposure {
                photo: gray_photo(2, 1, 40.0),
                x_offset: 1,
                y_offset: 0,
            },
        ])
        .unwrap();
        let planes = vec![
            GrayImage {
                data: vec![1.0, 0.5],
                width: 2,
                height: 1,
            },
            GrayImage {
                data: vec![0.5, 1.0],
                width: 2,
                height: 1,
            },
        ];
        let fused = blend_weighted(&stack, &planes).unwrap();
        assert_eq!(fused.width, 3);
        let (left, _, _) = fused.get_rgb(0, 0);
        let (mid, _, _) = fused.get_rgb(1, 0);
        let (right, _, _) = fused.get_rgb(2, 0);
        assert_relative_eq!(left, 100.0, epsilon = 1e-4);
        assert_relative_eq!(mid, 0.5 * 100.0 + 0.5 * 40.0, epsilon = 1e-4);
        assert_relative_eq!(right, 40.0, epsilon = 1e-4);
    }

    #[test]
    fn average_merge_ignores_clipped_samples() {
        let stack = ExposureStack::new(vec![
            Exposure {
                photo: gray_photo(2, 1, 255.0), // fully blown
                x_offset: 0,
                y_offset: 0,
            },
            Exposure {
                photo: gray_photo(2, 1, 120.0),
                x_offset: 0,
                y_offset: 0,
            },
        ])
        .unwrap();
        let fused = merge_average(&stack);
        let (r, _, _) = fused.get_rgb(0, 0);
        assert_relative_eq!(r, 120.0, epsilon = 1e-3);
    }

    #[test]
    fn average_merge_handles_all_clipped_positions() {
        let blown = ExposureStack::new(vec![
            Exposure {
                photo: gray_photo(1, 1, 255.0),
                x_offset: 0,
                y_offset: 0,
            },
            Exposure {
                photo: gray_photo(1, 1, 300.0),
                x_offset: 0,
                y_offset: 0,
            },
        ])
        .unwrap();
        let fused = merge_average(&blown);
        let (r, _, _) = fused.get_rgb(0, 0);
        // The least clipped of the blown samples wins.
        assert_relative_eq!(r, 255.0, epsilon = 1e-3);

        let black = ExposureStack::new(vec![
            Exposure {
                photo: gray_photo(1, 1, 0.0),
                x_offset: 0,
                y_offset: 0,
            },
            Exposure {
                photo: gray_photo(1, 1, 0.0),
                x_offset: 0,
                y_offset: 0,
            },
        ])
        .unwrap();
        let fused = merge_average(&black);
        let (r, _, _) = fused.get_rgb(0, 0);
        assert_eq!(r, 0.0);
    }
}
