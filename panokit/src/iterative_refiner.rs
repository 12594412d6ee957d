use crate::exposure_stack::LayerVectors;

/// One round of Khan-style neighborhood consensus over the weight vectors.
///
/// For every canvas position and every exposure sampled there, the refiner
/// asks how well that exposure's value agrees with the values seen in the
/// surrounding neighborhood, weighted by the weights of the previous
/// iteration. Static scene content confirms itself; a moving object only
/// appears in a minority of exposures, disagrees with the neighborhood
/// consensus, and loses weight with each round.
#[derive(Clone, Copy)]
pub struct IterativeRefiner {
    /// Width of the Gaussian agreement kernel. 1.0 is the plain
    /// `exp(-d^2/2)/sqrt(2 pi)` kernel; the CLIs scale this down for high
    /// dynamic range input whose value domain is log-compressed.
    pub sigma: f32,
    /// Neighborhood radius r; the consensus window is `(2r+1) x (2r+1)`.
    pub neighborhood_radius: usize,
    /// Multiply the consensus ratio by the position's initial weight.
    /// Disabled in probability-only mode, where the ratio alone survives.
    pub multiply_initial_weights: bool,
    /// When all of a position's raw weights land within 10% of the largest,
    /// emit a one-hot vector for the best layer instead of normalizing.
    pub choose_best: bool,
}

impl Default for IterativeRefiner {
    fn default() -> IterativeRefiner {
        IterativeRefiner {
            sigma: 1.0,
            neighborhood_radius: 1,
            multiply_initial_weights: true,
            choose_best: false,
        }
    }
}

impl IterativeRefiner {
    /// Runs one iteration, replacing `weights` with the refined values.
    ///
    /// `values`, `weights` and `initial` must all come from the same
    /// [`crate::exposure_stack::ExposureStack::remap`] call so their cells
    /// line up layer-for-layer. Positions covered by no exposure are left
    /// untouched.
    ///
    /// After the iteration every covered position's weights sum to 1: either
    /// normalized by their raw sum, as a one-hot vector (choose-best), or as
    /// the uniform fallback when every raw weight collapsed to 0.
    pub fn run_iteration(
        &self,
        values: &LayerVectors,
        weights: &mut LayerVectors,
        initial: &LayerVectors,
    ) {
        let width = values.width();
        let height = values.height();
        // Strict double buffering: every neighborhood read below goes to the
        // weights of the previous iteration, never to freshly written ones.
        let previous = weights.clone();

        let sigma = self.sigma as f64;
        let norm = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        let inv_two_sigma_sq = 1.0 / (2.0 * sigma * sigma);

        let mut neighbors: Vec<usize> = Vec::new();
        let mut raw: Vec<f64> = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let position = y * width + x;
                let layer_count = values.cell(position).len();
                if layer_count == 0 {
                    continue;
                }
                neighbor_indices(width, height, x, y, self.neighborhood_radius, &mut neighbors);

                raw.clear();
                let mut max_weight = 0.0f64;
                let mut min_weight = f64::MAX;
                let mut total = 0.0f64;

                for k in 0..layer_count {
                    let current = values.cell(position)[k].value as f64;
                    let mut sum_weight = 0.0f64;
                    let mut sum_prev = 0.0f64;
                    for &n in &neighbors {
                        let neighbor_values = values.cell(n);
                        let neighbor_weights = previous.cell(n);
                        let m = neighbor_values.len();
                        if m == 0 {
                            continue;
                        }
                        let mut agreement = 0.0f64;
                        let mut mass = 0.0f64;
                        for (v, w) in neighbor_values.iter().zip(neighbor_weights) {
                            let d = current - v.value as f64;
                            let kernel = (-d * d * inv_two_sigma_sq).exp() * norm;
                            agreement += kernel * w.value as f64;
                            mass += w.value as f64;
                        }
                        // Both sums normalized by the neighbor's layer count.
                        sum_weight += agreement / m as f64;
                        sum_prev += mass / m as f64;
                    }
                    if sum_prev == 0.0 {
                        sum_prev = 1.0;
                    }
                    let mut value = sum_weight / sum_prev;
                    if self.multiply_initial_weights {
                        value *= initial.cell(position)[k].value as f64;
                    }
                    max_weight = max_weight.max(value);
                    min_weight = min_weight.min(value);
                    total += value;
                    raw.push(value);
                }

                let cell = weights.cell_mut(position);
                if self.choose_best && min_weight >= 0.9 * max_weight {
                    // No clear winner by ratio: commit to the first layer
                    // attaining the maximum instead of averaging them all.
                    let mut chosen = false;
                    for (k, value) in raw.iter().enumerate() {
                        if !chosen && *value == max_weight {
                            cell[k].value = 1.0;
                            chosen = true;
                        } else {
                            cell[k].value = 0.0;
                        }
                    }
                } else if total > 0.0 {
                    for (k, value) in raw.iter().enumerate() {
                        cell[k].value = (value / total) as f32;
                    }
                } else {
                    let uniform = 1.0 / layer_count as f32;
                    for sample in cell.iter_mut() {
                        sample.value = uniform;
                    }
                }
            }
        }
    }
}

/// Linear indices of the `(2r+1) x (2r+1)` window around `(x, y)`, in
/// row-major order, with coordinates replicate-clamped to the canvas. The
/// center is included, and clamping near the borders deliberately yields
/// duplicate indices so edge positions keep a full-size window.
fn neighbor_indices(
    width: usize,
    height: usize,
    x: usize,
    y: usize,
    radius: usize,
    out: &mut Vec<usize>,
) {
    out.clear();
    let r = radius as i64;
    for dy in -r..=r {
        for dx in -r..=r {
            let nx = (x as i64 + dx).clamp(0, width as i64 - 1) as usize;
            let ny = (y as i64 + dy).clamp(0, height as i64 - 1) as usize;
            out.push(ny * width + nx);
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
    use crate::weight_initializer::WeightInitializer;
    use std::rc::Rc;

    fn uniform_photo(width: usize, height: usize, luminance: f32) -> Photo {
        // Gray pixels: R = G = B = luminance, so Rec.601 gives it back.
        Photo {
            img_data: vec![luminance; width * height * 3],
            alpha: None,
            width,
            height,
        }
    }

    fn stack_of(photos: Vec<Photo>) -> ExposureStack {
        let exposures = photos
            .into_iter()
            .map(|p| Exposure {
                photo: Rc::new(p),
                x_offset: 0,
                y_offset: 0,
            })
            .collect();
        ExposureStack::new(exposures).unwrap()
    }

    fn remapped_planes(
        stack: &ExposureStack,
    ) -> (
        crate::exposure_stack::LayerVectors,
        crate::exposure_stack::LayerVectors,
    ) {
        let init = WeightInitializer::default();
        let luminances: Vec<GrayImage> = stack
            .exposures()
            .iter()
            .map(|e| e.photo.luminance_image())
            .collect();
        let initial_planes: Vec<GrayImage> =
            luminances.iter().map(|l| init.weight_plane(l)).collect();
        let values = stack.remap(&luminances).unwrap();
        let initial = stack.remap(&initial_planes).unwrap();
        (values, initial)
    }

    #[test]
    fn weights_sum_to_one_at_every_covered_position() {
        let mut moving = uniform_photo(12, 12, 100.0);
        for y in 4..8 {
            for x in 4..8 {
                moving.img_data[(y * 12 + x) * 3] = 240.0;
                moving.img_data[(y * 12 + x) * 3 + 1] = 240.0;
                moving.img_data[(y * 12 + x) * 3 + 2] = 240.0;
            }
        }
        let stack = stack_of(vec![
            uniform_photo(12, 12, 100.0),
            moving,
            uniform_photo(12, 12, 102.0),
        ]);
        let (values, initial) = remapped_planes(&stack);
        let mut weights = initial.clone();
        let refiner = IterativeRefiner::default();
        refiner.run_iteration(&values, &mut weights, &initial);
        refiner.run_iteration(&values, &mut weights, &initial);

        for position in 0..weights.len() {
            let sum: f32 = weights.cell(position).iter().map(|s| s.value).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn ghost_patch_loses_weight_against_the_consensus() {
        // Three registered exposures of a flat scene; the middle one has a
        // bright intruder patch that the other two do not show.
        let mut ghost = uniform_photo(20, 20, 100.0);
        for y in 8..13 {
            for x in 8..13 {
                for c in 0..3 {
                    ghost.img_data[(y * 20 + x) * 3 + c] = 250.0;
                }
            }
        }
        let stack = stack_of(vec![
            uniform_photo(20, 20, 100.0),
            ghost,
            uniform_photo(20, 20, 100.0),
        ]);
        let (values, initial) = remapped_planes(&stack);
        let mut weights = initial.clone();
        IterativeRefiner::default().run_iteration(&values, &mut weights, &initial);

        let center = weights.cell(10 * 20 + 10);
        assert_eq!(center.len(), 3);
        assert!(center[1].value < 0.1, "ghost layer kept {}", center[1].value);
        assert!(center[0].value > 0.4);
        assert!(center[2].value > 0.4);
    }

    #[test]
    fn choose_best_commits_to_the_first_best_layer() {
        let stack = stack_of(vec![
            uniform_photo(4, 4, 120.0),
            uniform_photo(4, 4, 120.0),
        ]);
        let (values, initial) = remapped_planes(&stack);
        let mut weights = initial.clone();
        let refiner = IterativeRefiner {
            choose_best: true,
            ..IterativeRefiner::default()
        };
        refiner.run_iteration(&values, &mut weights, &initial);

        // Identical exposures tie everywhere; the tie resolves to layer 0.
        for position in 0..weights.len() {
            let cell = weights.cell(position);
            assert_eq!(cell[0].value, 1.0);
            assert_eq!(cell[1].value, 0.0);
        }
    }

    #[test]
    fn iteration_is_independent_of_scan_order() {
        // Mirror the stack horizontally; the refined weights must mirror too.
        // An accidental in-place update would leak freshly written weights
        // into later positions and break this symmetry.
        let width = 6;
        let mut plain = uniform_photo(width, 1, 90.0);
        let values = [90.0, 90.0, 200.0, 90.0, 90.0, 90.0];
        for (x, v) in values.iter().enumerate() {
            for c in 0..3 {
                plain.img_data[x * 3 + c] = *v;
            }
        }
        let mut mirrored = uniform_photo(width, 1, 90.0);
        for (x, v) in values.iter().rev().enumerate() {
            for c in 0..3 {
                mirrored.img_data[x * 3 + c] = *v;
            }
        }

        let refiner = IterativeRefiner::default();
        let stack_a = stack_of(vec![uniform_photo(width, 1, 90.0), plain]);
        let (values_a, initial_a) = remapped_planes(&stack_a);
        let mut weights_a = initial_a.clone();
        refiner.run_iteration(&values_a, &mut weights_a, &initial_a);

        let stack_b = stack_of(vec![uniform_photo(width, 1, 90.0), mirrored]);
        let (values_b, initial_b) = remapped_planes(&stack_b);
        let mut weights_b = initial_b.clone();
        refiner.run_iteration(&values_b, &mut weights_b, &initial_b);

        for x in 0..width {
            let a = weights_a.cell(x);
            let b = weights_b.cell(width - 1 - x);
            for (sa, sb) in a.iter().zip(b) {
                assert_relative_eq!(sa.value, sb.value, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn partially_covered_positions_normalize_cleanly() {
        let covered = uniform_photo(2, 1, 100.0);
        let mut half = uniform_photo(2, 1, 100.0);
        half.alpha = Some(vec![255, 0]);
        let stack = stack_of(vec![covered, half]);
        let (values, initial) = remapped_planes(&stack);
        let mut weights = initial.clone();
        IterativeRefiner::default().run_iteration(&values, &mut weights, &initial);
        assert_eq!(weights.cell(1).len(), 1);
        let sum: f32 = weights.cell(1).iter().map(|s| s.value).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    }
}
