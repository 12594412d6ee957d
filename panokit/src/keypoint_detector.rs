use nalgebra::{Matrix3, Vector3};

use crate::box_filter::BoxFilter;
use crate::integral_image::IntegralImage;
use crate::keypoint::KeyPoint;

/// Detection scales map onto Gaussian sigma through this factor: a box
/// filter of side `3 s` behaves like a Gaussian of sigma `1.2 s`.
const BASE_SIGMA: f64 = 1.2;

/// Iterations of the sub-pixel Newton refinement.
const MAX_REFINE_STEPS: usize = 6;

/// Multi-octave Hessian blob detector over an integral image.
///
/// Each octave doubles the sampling step and evaluates a ladder of
/// growing box filters; candidates are block maxima of the response
/// pyramid that survive a 3x3x3 neighborhood check and a quadratic
/// sub-pixel refinement. Detected keypoints are streamed into a
/// caller-supplied sink.
pub struct KeyPointDetector {
    /// Filter responses per octave.
    pub max_scales: usize,
    /// Octaves to process; large images keep all of them, small ones stop
    /// when the filters no longer fit.
    pub max_octaves: usize,
    /// Minimum Hessian determinant for a detection.
    pub score_threshold: f64,
    /// Lobe size of the smallest box filter.
    pub initial_box_filter_size: i64,
    /// How many filter sizes neighboring octaves share.
    pub scale_overlap: i64,
}

impl Default for KeyPointDetector {
    fn default() -> KeyPointDetector {
        KeyPointDetector {
            max_scales: 5,
            max_octaves: 4,
            score_threshold: 1000.0,
            initial_box_filter_size: 3,
            scale_overlap: 3,
        }
    }
}

impl KeyPointDetector {
    pub fn new() -> KeyPointDetector {
        KeyPointDetector::default()
    }

    /// Lobe size of the box filter for `(octave, scale)`.
    fn filter_size(&self, octave: usize, scale: usize) -> i64 {
        let shift = 2i64 << octave;
        self.initial_box_filter_size
            + (shift - 2) * (self.max_scales as i64 - self.scale_overlap)
            + shift * scale as i64
    }

    /// Width of the band, in octave pixels, that the filter for
    /// `(octave, scale)` cannot evaluate. The first scales share one border
    /// so each 2x2 suppression block sees uniformly filled maps.
    fn border_size(&self, octave: usize, scale: usize) -> i64 {
        let shift = 2i64 << octave;
        if scale <= 2 {
            let mult = if octave == 0 { 1 } else { 2 };
            (self.filter_size(octave, 1) + mult * shift) * 3 / shift + 1
        } else {
            self.filter_size(octave, scale) * 3 / shift + 1
        }
    }

    /// Runs the detector, handing every accepted keypoint to `insertor`.
    pub fn detect(&self, integral: &IntegralImage, mut insertor: impl FnMut(KeyPoint)) {
        for octave in 0..self.max_octaves {
            let pixel_step = 1usize << octave;
            let octave_width = integral.width / pixel_step;
            let octave_height = integral.height / pixel_step;
            let max_border = self.border_size(octave, self.max_scales - 1);
            if octave_width as i64 <= 2 * max_border + 2
                || octave_height as i64 <= 2 * max_border + 2
            {
                break;
            }

            let maps = self.build_response_maps(integral, octave, octave_width, octave_height);
            self.suppress_and_refine(
                integral,
                octave,
                octave_width,
                octave_height,
                &maps,
                &mut insertor,
            );
        }
    }

    fn build_response_maps(
        &self,
        integral: &IntegralImage,
        octave: usize,
        octave_width: usize,
        octave_height: usize,
    ) -> Vec<Vec<f64>> {
        let pixel_step = (1usize << octave) as i64;
        let mut maps = Vec::with_capacity(self.max_scales);
        for scale in 0..self.max_scales {
            let mut map = vec![0.0f64; octave_width * octave_height];
            let border = self.border_size(octave, scale);
            let filter = BoxFilter::new(integral, self.filter_size(octave, scale) as f64);
            let mut y = border;
            while y < octave_height as i64 - border {
                let mut x = border;
                while x < octave_width as i64 - border {
                    map[(y as usize) * octave_width + x as usize] =
                        filter.det(x * pixel_step, y * pixel_step);
                    x += 1;
                }
                y += 1;
            }
            maps.push(map);
        }
        maps
    }

    fn suppress_and_refine(
        &self,
        integral: &IntegralImage,
        octave: usize,
        octave_width: usize,
        octave_height: usize,
        maps: &[Vec<f64>],
        insertor: &mut impl FnMut(KeyPoint),
    ) {
        let resp = |s: i64, x: i64, y: i64| maps[s as usize][(y as usize) * octave_width + x as usize];
        let width = octave_width as i64;
        let height = octave_height as i64;

        let mut scale_it = 1usize;
        while scale_it + 1 < self.max_scales {
            let border = self.border_size(octave, scale_it + 1);

            let mut y = border + 1;
            while y < height - border - 1 {
                let mut x = border + 1;
                while x < width - border - 1 {
                    // Tournament maximum over the 2x2x2 block; the index bits
                    // encode which corner won (bit 0: x, bit 1: y, bit 2: scale).
                    let mut best_index = 0usize;
                    let mut best_score = f64::MIN;
                    for index in 0..8usize {
                        let bx = x + (index & 1) as i64;
                        let by = y + ((index >> 1) & 1) as i64;
                        let bs = scale_it as i64 + ((index >> 2) & 1) as i64;
                        let value = resp(bs, bx, by);
                        if value > best_score {
                            best_score = value;
                            best_index = index;
                        }
                    }

                    // Refinement only nudges the score, so a block this far
                    // under the threshold cannot recover.
                    if best_score < 0.8 * self.score_threshold {
                        x += 2;
                        continue;
                    }

                    let mut index = best_index;
                    let x_adj = x + (index & 1) as i64;
                    let x_shift = 2 * (index & 1) as i64 - 1;
                    index >>= 1;
                    let y_adj = y + (index & 1) as i64;
                    let y_shift = 2 * (index & 1) as i64 - 1;
                    index >>= 1;
                    let s_adj = scale_it as i64 + (index & 1) as i64;
                    let s_shift = 2 * (index & 1) as i64 - 1;

                    // The top scale has no upper neighbor to verify against.
                    if s_adj as usize == self.max_scales - 1 {
                        x += 2;
                        continue;
                    }

                    if self.is_block_maximum(
                        octave, maps, octave_width, best_score, x_adj, x_shift, y_adj, y_shift,
                        s_adj, s_shift, border,
                    ) {
                        self.refine_and_emit(
                            integral,
                            octave,
                            octave_width,
                            octave_height,
                            maps,
                            x_adj,
                            y_adj,
                            s_adj,
                            border,
                            insertor,
                        );
                    }
                    x += 2;
                }
                y += 2;
            }
            scale_it += 2;
        }
    }

    /// Verifies the candidate against the 19 neighbors outside its winning
    /// 2x2x2 block: the full 3x3 plane one scale outward, plus the exposed
    /// L-shaped five cells on each of the two block scales.
    fn is_block_maximum(
        &self,
        octave: usize,
        maps: &[Vec<f64>],
        octave_width: usize,
        score: f64,
        x: i64,
        x_shift: i64,
        y: i64,
        y_shift: i64,
        s: i64,
        s_shift: i64,
        border: i64,
    ) -> bool {
        let resp = |sc: i64, px: i64, py: i64| {
            maps[sc as usize][(py as usize) * octave_width + px as usize]
        };

        // The outward scale may carry a larger border than the block scales;
        // candidates whose neighborhood would leave its filled region cannot
        // be verified and are dropped.
        let outward = s + s_shift;
        let outward_border = self.border_size(octave, outward as usize);
        if outward_border > border {
            let width = octave_width as i64;
            let height = maps[0].len() as i64 / width;
            if x - 1 < outward_border
                || x + 1 >= width - outward_border
                || y - 1 < outward_border
                || y + 1 >= height - outward_border
            {
                return false;
            }
        }

        for dy in -1..=1 {
            for dx in -1..=1 {
                if resp(outward, x + dx, y + dy) > score {
                    return false;
                }
            }
        }
        for scale in [s, s - s_shift] {
            for dy in -1..=1 {
                if resp(scale, x + x_shift, y + dy) > score {
                    return false;
                }
            }
            for dx in -1..=1 {
                if dx != x_shift && resp(scale, x + dx, y + y_shift) > score {
                    return false;
                }
            }
        }
        true
    }

    fn refine_and_emit(
        &self,
        integral: &IntegralImage,
        octave: usize,
        octave_width: usize,
        octave_height: usize,
        maps: &[Vec<f64>],
        x: i64,
        y: i64,
        s: i64,
        border: i64,
        insertor: &mut impl FnMut(KeyPoint),
    ) {
        let refined = match self.fine_tune_extremum(
            maps,
            octave_width,
            octave_height,
            x,
            y,
            s,
            border,
        ) {
            Some(r) => r,
            None => return,
        };
        let (fx, fy, fs, score, shift) = refined;
        if shift[0].abs() > 1.5 || shift[1].abs() > 1.5 || shift[2].abs() > 1.5 {
            return;
        }
        if score < self.score_threshold {
            return;
        }

        let pixel_step = (1usize << octave) as f64;
        let image_x = fx * pixel_step;
        let image_y = fy * pixel_step;
        // Interpolated lobe size over the octave ladder, divided by 3 to a
        // unit scale.
        let scale = ((2.0 * fs * pixel_step)
            + self.initial_box_filter_size as f64
            + (pixel_step - 1.0) * self.max_scales as f64)
            / 3.0;

        let trace_filter = BoxFilter::new(integral, 3.0 * scale);
        let tx = image_x.round() as i64;
        let ty = image_y.round() as i64;
        if !trace_filter.check_bounds(tx, ty) {
            return;
        }
        let trace = trace_filter.trace_sign(tx, ty);

        insertor(KeyPoint::new(
            image_x,
            image_y,
            scale * BASE_SIGMA,
            score,
            trace,
        ));
    }

    /// Newton refinement of the candidate on the 3D response quadratic.
    ///
    /// Returns the refined `(x, y, scale, score, shift)` in octave
    /// coordinates, or `None` when the 3x3 system is singular.
    fn fine_tune_extremum(
        &self,
        maps: &[Vec<f64>],
        octave_width: usize,
        octave_height: usize,
        mut x: i64,
        mut y: i64,
        mut s: i64,
        border: i64,
    ) -> Option<(f64, f64, f64, f64, [f64; 3])> {
        let resp = |sc: i64, px: i64, py: i64| {
            maps[sc as usize][(py as usize) * octave_width + px as usize]
        };
        let width = octave_width as i64;
        let height = octave_height as i64;

        let mut gradient = [0.0f64; 3];
        let mut shift = [0.0f64; 3];

        for step in 0..MAX_REFINE_STEPS {
            // Negated central differences, so the solved shift points at the
            // extremum directly.
            gradient[0] = -(resp(s, x + 1, y) - resp(s, x - 1, y)) * 0.5;
            gradient[1] = -(resp(s, x, y + 1) - resp(s, x, y - 1)) * 0.5;
            gradient[2] = -(resp(s + 1, x, y) - resp(s - 1, x, y)) * 0.5;

            let dxx = resp(s, x + 1, y) - 2.0 * resp(s, x, y) + resp(s, x - 1, y);
            let dyy = resp(s, x, y + 1) - 2.0 * resp(s, x, y) + resp(s, x, y - 1);
            let dss = resp(s + 1, x, y) - 2.0 * resp(s, x, y) + resp(s - 1, x, y);
            let dxy = 0.25
                * (resp(s, x + 1, y + 1) - resp(s, x - 1, y + 1) - resp(s, x + 1, y - 1)
                    + resp(s, x - 1, y - 1));
            let dxs = 0.25
                * (resp(s + 1, x + 1, y) - resp(s + 1, x - 1, y) - resp(s - 1, x + 1, y)
                    + resp(s - 1, x - 1, y));
            let dys = 0.25
                * (resp(s + 1, x, y + 1) - resp(s + 1, x, y - 1) - resp(s - 1, x, y + 1)
                    + resp(s - 1, x, y - 1));

            let hessian = Matrix3::new(dxx, dxy, dxs, dxy, dyy, dys, dxs, dys, dss);
            let rhs = Vector3::new(gradient[0], gradient[1], gradient[2]);
            let solution = hessian.lu().solve(&rhs)?;
            shift = [solution[0], solution[1], solution[2]];

            if step < MAX_REFINE_STEPS - 1 {
                // A large shift means the true extremum lives in the next
                // cell; re-center and run the fit again.
                let mut moved = false;
                if shift[0] > 0.6 && x + 1 < width - border - 1 {
                    x += 1;
                    moved = true;
                }
                if shift[0] < -0.6 && x - 1 > border {
                    x -= 1;
                    moved = true;
                }
                if shift[1] > 0.6 && y + 1 < height - border - 1 {
                    y += 1;
                    moved = true;
                }
                if shift[1] < -0.6 && y - 1 > border {
                    y -= 1;
                    moved = true;
                }
                if shift[2] > 0.6 && s + 2 < self.max_scales as i64 {
                    s += 1;
                    moved = true;
                }
                if shift[2] < -0.6 && s > 1 {
                    s -= 1;
                    moved = true;
                }
                if !moved {
                    break;
                }
            }
        }

        let score = resp(s, x, y)
            + 0.5 * (gradient[0] * shift[0] + gradient[1] * shift[1] + gradient[2] * shift[2]);
        Some((
            x as f64 + shift[0],
            y as f64 + shift[1],
            s as f64 + shift[2],
            score,
            shift,
        ))
    }
}
