use crate::exposure_stack::LayerVectors;

/// Finishing pass applied to the refined weights.
#[derive(Clone, Copy, PartialEq)]
pub enum PostProcess {
    /// Leave the weights as the refiner produced them.
    None,
    /// Sharpen the distribution by raising every weight to `power` and
    /// renormalizing. Softens ghost edges less than winner-takes-all.
    Bias { power: i32 },
    /// Collapse each position to a single winning layer.
    WinnerTakesAll,
}

/// Applies the selected [`PostProcess`] to every canvas position.
#[derive(Clone, Copy)]
pub struct WeightPostProcessor {
    pub mode: PostProcess,
}

pub const DEFAULT_BIAS_POWER: i32 = 5;

impl WeightPostProcessor {
    pub fn apply(&self, weights: &mut LayerVectors) {
        match self.mode {
            PostProcess::None => {}
            PostProcess::Bias { power } => bias(weights, power),
            PostProcess::WinnerTakesAll => winner_takes_all(weights),
        }
    }
}

fn bias(weights: &mut LayerVectors, power: i32) {
    for position in 0..weights.len() {
        let cell = weights.cell_mut(position);
        if cell.is_empty() {
            continue;
        }
        let mut sum = 0.0f32;
        for sample in cell.iter_mut() {
            sample.value = sample.value.powi(power);
            sum += sample.value;
        }
        if sum > 0.0 {
            for sample in cell.iter_mut() {
                sample.value /= sum;
            }
        } else {
            let uniform = 1.0 / cell.len() as f32;
            for sample in cell.iter_mut() {
                sample.value = uniform;
            }
        }
    }
}

fn winner_takes_all(weights: &mut LayerVectors) {
    for position in 0..weights.len() {
        let cell = weights.cell_mut(position);
        let max = cell.iter().map(|s| s.value).fold(0.0f32, f32::max);
        if max == 0.0 {
            // Nothing to crown; an all-zero position stays all zero.
            continue;
        }
        // The winner is the lowest layer index within 1% of the maximum.
        let band = max - max * 0.01;
        let mut crowned = false;
        for sample in cell.iter_mut() {
            if !crowned && sample.value >= band {
                sample.value = 1.0;
                crowned = true;
            } else {
                sample.value = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::exposure_stack::{Exposure, ExposureStack};
    use crate::gray_image::GrayImage;
    use crate::photo::Photo;
    use std::rc::Rc;

    /// Builds 1x1 layer vectors holding exactly `values` as weights.
    fn single_cell(values: &[f32]) -> LayerVectors {
        let exposures = values
            .iter()
            .map(|_| Exposure {
                photo: Rc::new(Photo {
                    img_data: vec![0.0; 3],
                    alpha: None,
                    width: 1,
                    height: 1,
                }),
                x_offset: 0,
                y_offset: 0,
            })
            .collect();
        let stack = ExposureStack::new(exposures).unwrap();
        let planes: Vec<GrayImage> = values
            .iter()
            .map(|&v| GrayImage {
                data: vec![v],
                width: 1,
                height: 1,
            })
            .collect();
        stack.remap(&planes).unwrap()
    }

    fn cell_values(vectors: &LayerVectors) -> Vec<f32> {
        vectors.cell(0).iter().map(|s| s.value).collect()
    }

    #[test]
    fn bias_sharpens_and_renormalizes() {
        let mut weights = single_cell(&[0.6, 0.4]);
        WeightPostProcessor {
            mode: PostProcess::Bias {
                power: DEFAULT_BIAS_POWER,
            },
        }
        .apply(&mut weights);
        let values = cell_values(&weights);
        let sum: f32 = values.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-6);
        // 0.6^5 / (0.6^5 + 0.4^5) ~ 0.8836, sharper than before.
        assert!(values[0] > 0.85);
        assert!(values[0] / values[1] > 0.6 / 0.4);
    }

    #[test]
    fn bias_falls_back_to_uniform_on_collapse() {
        let mut weights = single_cell(&[0.0, 0.0, 0.0]);
        WeightPostProcessor {
            mode: PostProcess::Bias { power: 5 },
        }
        .apply(&mut weights);
        assert_eq!(cell_values(&weights), vec![1.0 / 3.0; 3]);
    }

    #[test]
    fn winner_takes_all_is_one_hot() {
        let mut weights = single_cell(&[0.2, 0.5, 0.3]);
        WeightPostProcessor {
            mode: PostProcess::WinnerTakesAll,
        }
        .apply(&mut weights);
        assert_eq!(cell_values(&weights), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn winner_tie_break_picks_the_lowest_layer() {
        // Both layers sit inside the 1% band of the maximum.
        let mut weights = single_cell(&[0.499, 0.5, 0.4995]);
        WeightPostProcessor {
            mode: PostProcess::WinnerTakesAll,
        }
        .apply(&mut weights);
        assert_eq!(cell_values(&weights), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn all_zero_positions_stay_zero() {
        let mut weights = single_cell(&[0.0, 0.0]);
        WeightPostProcessor {
            mode: PostProcess::WinnerTakesAll,
        }
        .apply(&mut weights);
        assert_eq!(cell_values(&weights), vec![0.0, 0.0]);
    }

    #[test]
    fn none_mode_is_the_identity() {
        let mut weights = single_cell(&[0.7, 0.3]);
        WeightPostProcessor {
            mode: PostProcess::None,
        }
        .apply(&mut weights);
        assert_eq!(cell_values(&weights), vec![0.7, 0.3]);
    }
}
