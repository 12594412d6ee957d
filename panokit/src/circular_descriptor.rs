use std::f64::consts::PI;

use crate::integral_image::IntegralImage;
use crate::keypoint::KeyPoint;
use crate::wave_filter::WaveFilter;

/// Feature vector length produced by the default sampling geometry:
/// 13 samples x 3 values, minus the center sample's missing mean-gray slot.
pub const DESCRIPTOR_LENGTH: usize = 38;

/// At most this many secondary orientations are reported per keypoint.
pub const MAX_SECONDARY_ORIENTATIONS: usize = 3;

/// One circle of descriptor samples around the keypoint.
#[derive(Clone, Copy)]
pub struct Ring {
    /// Number of samples on the circle.
    pub count: usize,
    /// Circle radius in keypoint-scale units.
    pub radius: f64,
    /// Half-width of each sample's gradient box, also in scale units.
    pub gradient_width: f64,
}

struct SampleOffset {
    x: f64,
    y: f64,
    gradient_width: f64,
}

/// Orientation assignment and descriptor extraction with a circular
/// sampling pattern.
///
/// Every sample contributes its two rotated Haar gradients plus its mean
/// gray relative to the center sample; the center contributes only its
/// gradients. The final vector is L2-normalized.
pub struct CircularKeyPointDescriptor<'a> {
    integral: &'a IntegralImage,
    samples: Vec<SampleOffset>,
    orientation_bins: usize,
    orientation_sample_scale: f64,
    orientation_grid_radius: i64,
}

fn default_rings() -> Vec<Ring> {
    vec![
        Ring {
            count: 1,
            radius: 0.0,
            gradient_width: 2.0,
        },
        Ring {
            count: 6,
            radius: 4.2,
            gradient_width: 1.9,
        },
        Ring {
            count: 6,
            radius: 8.0,
            gradient_width: 3.2,
        },
    ]
}

fn build_samples(rings: &[Ring]) -> Vec<SampleOffset> {
    let mut samples = Vec::new();
    for (ring_index, ring) in rings.iter().enumerate() {
        // Odd rings are phase-shifted by half a step so samples interleave.
        let phase = if ring_index % 2 == 1 {
            PI / ring.count as f64
        } else {
            0.0
        };
        for i in 0..ring.count {
            let phi = i as f64 * 2.0 * PI / ring.count as f64 + phase;
            samples.push(SampleOffset {
                x: ring.radius * phi.cos(),
                y: ring.radius * phi.sin(),
                gradient_width: ring.gradient_width,
            });
        }
    }
    samples
}

impl<'a> CircularKeyPointDescriptor<'a> {
    pub fn new(integral: &'a IntegralImage) -> CircularKeyPointDescriptor<'a> {
        CircularKeyPointDescriptor::with_rings(integral, &default_rings())
    }

    pub fn with_rings(
        integral: &'a IntegralImage,
        rings: &[Ring],
    ) -> CircularKeyPointDescriptor<'a> {
        CircularKeyPointDescriptor {
            integral,
            samples: build_samples(rings),
            orientation_bins: 18,
            orientation_sample_scale: 4.0,
            orientation_grid_radius: 11,
        }
    }

    pub fn descriptor_length(&self) -> usize {
        self.samples.len() * 3 - 1
    }

    /// Assigns the dominant gradient direction to `keypoint` and returns up
    /// to [`MAX_SECONDARY_ORIENTATIONS`] further directions whose histogram
    /// peaks reach 80% of the primary one.
    ///
    /// Votes come from Haar responses on a scale-proportional grid around
    /// the keypoint, weighted down with grid distance; out-of-bounds grid
    /// positions contribute nothing.
    pub fn assign_orientation(&self, keypoint: &mut KeyPoint) -> Vec<f64> {
        let nbins = self.orientation_bins;
        let x = keypoint.x.round() as i64;
        let y = keypoint.y.round() as i64;
        let step = (keypoint.scale + 0.8) as i64;
        let wave = WaveFilter::new(
            self.integral,
            self.orientation_sample_scale * keypoint.scale + 1.5,
        );
        let coeff_add = 0.5;
        let coeff_mul = (coeff_add + 6.0) / -((nbins * nbins) as f64);
        let radius_sq = (nbins * nbins) as i64;

        let mut hist = vec![0.0f64; nbins];
        for j in -self.orientation_grid_radius..=self.orientation_grid_radius {
            for i in -self.orientation_grid_radius..=self.orientation_grid_radius {
                let sq_dist = i * i + j * j;
                if sq_dist > radius_sq {
                    continue;
                }
                let sx = x + i * step;
                let sy = y + j * step;
                if !wave.check_bounds(sx, sy) {
                    continue;
                }
                let wx = wave.wx(sx, sy);
                let wy = -wave.wy(sx, sy);
                let resp = (wx * wx + wy * wy).sqrt();
                if resp > 0.0 {
                    let angle = wy.atan2(wx) + PI;
                    let bin =
                        ((angle / (2.0 * PI) * nbins as f64 + nbins as f64) as usize) % nbins;
                    hist[bin] += resp * (coeff_mul * (sq_dist as f64 + coeff_add)).exp();
                }
            }
        }

        let mut i_max = 0usize;
        for b in 1..nbins {
            if hist[b] > hist[i_max] {
                i_max = b;
            }
        }
        let refine = |b: usize| -> f64 {
            let prev = hist[(b + nbins - 1) % nbins];
            let next = hist[(b + 1) % nbins];
            let denom = prev + next - 2.0 * hist[b];
            let dsub = if denom != 0.0 {
                -0.5 * (next - prev) / denom
            } else {
                0.0
            };
            (b as f64 + 0.5 + dsub) / nbins as f64 * 2.0 * PI - PI
        };
        keypoint.orientation = refine(i_max);

        let mut secondary = Vec::new();
        for b in 0..nbins {
            if b == i_max {
                continue;
            }
            let prev = hist[(b + nbins - 1) % nbins];
            let next = hist[(b + 1) % nbins];
            if hist[b] > prev && hist[b] > next && hist[b] > 0.8 * hist[i_max] {
                secondary.push(refine(b));
                if secondary.len() == MAX_SECONDARY_ORIENTATIONS {
                    break;
                }
            }
        }
        secondary
    }

    /// Fills `keypoint.descriptor` with the sampled feature vector.
    ///
    /// Sample offsets rotate with the keypoint orientation and scale with
    /// its (integer-truncated) scale; samples whose box leaves the image
    /// contribute zeros.
    pub fn make_descriptor(&self, keypoint: &mut KeyPoint) {
        keypoint.descriptor = vec![0.0f64; self.descriptor_length()];
        let scale = (keypoint.scale as i64).max(1) as f64;
        let (sin_o, cos_o) = keypoint.orientation.sin_cos();
        let wave = WaveFilter::new(self.integral, 1.0);

        let mut middle_mean = 0.0f64;
        let mut out = 0usize;
        for (i, sample) in self.samples.iter().enumerate() {
            let sx = sample.x * scale;
            let sy = sample.y * scale;
            let px = (keypoint.x + sx * cos_o - sy * sin_o).round() as i64;
            let py = (keypoint.y + sx * sin_o + sy * cos_o).round() as i64;
            let size = ((sample.gradient_width * scale).round() as i64).max(1);
            let area = (size * size) as f64;

            if !wave.check_bounds_sized(px, py, size) {
                out += if i == 0 { 2 } else { 3 };
                if i == 0 {
                    middle_mean = 0.0;
                }
                continue;
            }

            let wx = wave.wx_sized(px, py, size) / area;
            let wy = -wave.wy_sized(px, py, size) / area;
            let mean = wave.sum_sized(px, py, size) / area;
            if i == 0 {
                middle_mean = mean;
            }
            // Rotate the gradient into the keypoint frame.
            let xr = wx * cos_o + wy * sin_o;
            let yr = -wx * sin_o + wy * cos_o;
            keypoint.descriptor[out] = xr;
            keypoint.descriptor[out + 1] = yr;
            if i == 0 {
                out += 2;
            } else {
                keypoint.descriptor[out + 2] = mean - middle_mean;
                out += 3;
            }
        }

        let norm: f64 = keypoint
            .descriptor
            .iter()
            .map(|v| v * v)
            .sum::<f64>()
            .sqrt();
        if norm > 0.0 {
            for v in keypoint.descriptor.iter_mut() {
                *v /= norm;
            }
        }
    }
}
