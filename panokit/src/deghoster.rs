use crate::exposure_stack::{ExposureStack, LayerVectors, StackError};
use crate::gray_image::GrayImage;
use crate::iterative_refiner::IterativeRefiner;
use crate::weight_initializer::WeightInitializer;
use crate::weight_post_processor::{PostProcess, WeightPostProcessor};

/// Driver-level configuration of the deghosting engine.
#[derive(Clone, Copy)]
pub struct DeghostParams {
    pub iterations: u32,
    /// Kernel width in the processing-value domain. Divided by 10 for high
    /// dynamic range input, whose values are log- or gamma-compressed into a
    /// much smaller range.
    pub sigma: f32,
    pub neighborhood_radius: usize,
    pub favor_high_snr: bool,
    /// Keep only the consensus probability, skipping the multiplication by
    /// the initial weights.
    pub probability_only: bool,
    pub choose_best: bool,
    /// Input photos carry linear radiance rather than 8-bit values.
    pub hdr_input: bool,
    /// Compress HDR values with a gamma curve instead of the logarithm.
    pub use_gamma: bool,
    pub post_process: PostProcess,
}

impl Default for DeghostParams {
    fn default() -> DeghostParams {
        DeghostParams {
            iterations: 4,
            sigma: 30.0,
            neighborhood_radius: 1,
            favor_high_snr: false,
            probability_only: false,
            choose_best: false,
            hdr_input: false,
            use_gamma: false,
            post_process: PostProcess::None,
        }
    }
}

/// The remapped planes the iteration loop works on. Exposed so callers can
/// drive the loop themselves (for per-iteration debug output) or export the
/// initial weights.
pub struct DeghostPlanes {
    /// Processing values (luminance, possibly range-compressed).
    pub values: LayerVectors,
    /// Current weights; starts as a copy of `initial`.
    pub weights: LayerVectors,
    /// Initial weights, consulted by every iteration.
    pub initial: LayerVectors,
    /// The per-exposure initial weight planes before remapping.
    pub initial_planes: Vec<GrayImage>,
}

/// Ties the deghosting stages together: luminance extraction, range
/// compression, initial weights, canvas remapping, consensus iterations and
/// post-processing.
pub struct Deghoster {
    stack: ExposureStack,
    params: DeghostParams,
}

impl Deghoster {
    pub fn new(stack: ExposureStack, params: DeghostParams) -> Deghoster {
        Deghoster { stack, params }
    }

    pub fn stack(&self) -> &ExposureStack {
        &self.stack
    }

    /// The refiner configured for this stack, with the HDR sigma reduction
    /// applied.
    pub fn refiner(&self) -> IterativeRefiner {
        let sigma = if self.params.hdr_input {
            self.params.sigma / 10.0
        } else {
            self.params.sigma
        };
        IterativeRefiner {
            sigma,
            neighborhood_radius: self.params.neighborhood_radius,
            multiply_initial_weights: !self.params.probability_only,
            choose_best: self.params.choose_best,
        }
    }

    /// Builds and remaps all per-exposure planes.
    pub fn prepare(&self) -> Result<DeghostPlanes, StackError> {
        let initializer = WeightInitializer {
            favor_high_snr: self.params.favor_high_snr,
        };
        let mut value_planes = Vec::with_capacity(self.stack.layer_count());
        let mut initial_planes = Vec::with_capacity(self.stack.layer_count());
        for exposure in self.stack.exposures() {
            let luminance = exposure.photo.luminance_image();
            // Initial weights always come from the uncompressed luminance;
            // the initializer clamps HDR values into the 8-bit domain.
            initial_planes.push(initializer.weight_plane(&luminance));
            let processing = if self.params.hdr_input {
                if self.params.use_gamma {
                    luminance.gamma_compressed()
                } else {
                    luminance.logarithm()
                }
            } else {
                luminance
            };
            value_planes.push(processing);
        }
        let values = self.stack.remap(&value_planes)?;
        let initial = self.stack.remap(&initial_planes)?;
        let weights = initial.clone();
        Ok(DeghostPlanes {
            values,
            weights,
            initial,
            initial_planes,
        })
    }

    /// Runs the full pipeline and returns the final per-position weights,
    /// normalized to sum 1 at every covered position (or one-hot after
    /// winner-takes-all post-processing).
    pub fn compute_weights(&self) -> Result<LayerVectors, StackError> {
        let mut planes = self.prepare()?;
        let refiner = self.refiner();
        for _ in 0..self.params.iterations {
            refiner.run_iteration(&planes.values, &mut planes.weights, &planes.initial);
        }
        WeightPostProcessor {
            mode: self.params.post_process,
        }
        .apply(&mut planes.weights);
        Ok(planes.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::exposure_stack::Exposure;
    use crate::photo::Photo;
    use std::rc::Rc;

    fn noisy_stack(values: [f32; 3]) -> ExposureStack {
        let exposures = values
            .iter()
            .map(|&v| Exposure {
                photo: Rc::new(Photo {
                    img_data: vec![v; 8 * 8 * 3],
                    alpha: None,
                    width: 8,
                    height: 8,
                }),
                x_offset: 0,
                y_offset: 0,
            })
            .collect();
        ExposureStack::new(exposures).unwrap()
    }

    #[test]
    fn full_pipeline_yields_normalized_weights() {
        let stack = noisy_stack([90.0, 100.0, 110.0]);
        let deghoster = Deghoster::new(stack, DeghostParams::default());
        let weights = deghoster.compute_weights().unwrap();
        for position in 0..weights.len() {
            let sum: f32 = weights.cell(position).iter().map(|s| s.value).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn hdr_input_compresses_values_and_sigma() {
        let stack = noisy_stack([0.5, 80.0, 4000.0]);
        let params = DeghostParams {
            hdr_input: true,
            ..DeghostParams::default()
        };
        let deghoster = Deghoster::new(stack, params);
        assert_relative_eq!(deghoster.refiner().sigma, 3.0, epsilon = 1e-6);
        let planes = deghoster.prepare().unwrap();
        // Processing values are log-compressed: ln(1 + 4000) < 9.
        for sample in planes.values.cell(0) {
            assert!(sample.value < 9.0);
        }
        let weights = deghoster.compute_weights().unwrap();
        let sum: f32 = weights.cell(0).iter().map(|s| s.value).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn winner_post_process_produces_one_hot_cells() {
        let stack = noisy_stack([60.0, 128.0, 200.0]);
        let params = DeghostParams {
            post_process: PostProcess::WinnerTakesAll,
            ..DeghostParams::default()
        };
        let weights = Deghoster::new(stack, params).compute_weights().unwrap();
        for position in 0..weights.len() {
            let cell = weights.cell(position);
            let ones = cell.iter().filter(|s| s.value == 1.0).count();
            let zeros = cell.iter().filter(|s| s.value == 0.0).count();
            assert_eq!(ones, 1);
            assert_eq!(zeros, cell.len() - 1);
        }
    }
}
