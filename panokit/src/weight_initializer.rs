use crate::gray_image::GrayImage;

/// Computes initial per-pixel weights from exposure luminance.
///
/// The weight function is a "mexican hat" over the 8-bit luminance domain:
/// well-exposed mid-gray pixels get weight 1.0, pixels at either end of the
/// range get 0. The optional high-SNR factor additionally favors brighter
/// (less noisy) pixels when exposures overlap.
#[derive(Clone, Copy)]
pub struct WeightInitializer {
    pub favor_high_snr: bool,
}

impl Default for WeightInitializer {
    fn default() -> WeightInitializer {
        WeightInitializer {
            favor_high_snr: false,
        }
    }
}

impl WeightInitializer {
    /// The initial weight for one luminance value.
    ///
    /// Pure: the result depends only on `luminance`, which is clamped to
    /// [0, 255] first. The hat is `1 - t^16` with `t = v/127.5 - 1`, so the
    /// peak sits exactly at mid-gray and both extremes map to 0.
    pub fn weight(&self, luminance: f32) -> f32 {
        let v = luminance.clamp(0.0, 255.0);
        let mut w = mexican_hat(v);
        if self.favor_high_snr {
            w *= high_snr_factor(v);
        }
        w
    }

    /// Applies [`WeightInitializer::weight`] to every pixel of a plane.
    pub fn weight_plane(&self, luminance: &GrayImage) -> GrayImage {
        GrayImage {
            data: luminance.data.iter().map(|&v| self.weight(v)).collect(),
            width: luminance.width,
            height: luminance.height,
        }
    }
}

fn mexican_hat(v: f32) -> f32 {
    let t = v / 127.5 - 1.0;
    // t^16 via four successive squarings
    let mut t = t * t;
    t *= t;
    t *= t;
    t *= t;
    1.0 - t
}

fn high_snr_factor(v: f32) -> f32 {
    let t = v / 255.0 - 0.8627;
    // t^8 via three successive squarings
    let mut t = t * t;
    t *= t;
    t *= t;
    1.0 - t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_at_mid_gray_and_zero_at_extremes() {
        let init = WeightInitializer::default();
        assert_eq!(init.weight(127.5), 1.0);
        assert_eq!(init.weight(0.0), 0.0);
        assert_eq!(init.weight(255.0), 0.0);
        // Clamping keeps out-of-domain values at the extremes.
        assert_eq!(init.weight(-10.0), 0.0);
        assert_eq!(init.weight(400.0), 0.0);
    }

    #[test]
    fn hat_is_pure_and_symmetric() {
        let init = WeightInitializer::default();
        assert_eq!(init.weight(80.0), init.weight(80.0));
        assert!((init.weight(100.0) - init.weight(155.0)).abs() < 1e-6);
    }

    #[test]
    fn snr_factor_penalizes_the_dark_side() {
        let with = WeightInitializer {
            favor_high_snr: true,
        };
        let without = WeightInitializer::default();
        // The factor peaks near v = 220, so a dark pixel loses more
        // weight than the symmetric bright one.
        let dark = with.weight(40.0) / without.weight(40.0);
        let bright = with.weight(215.0) / without.weight(215.0);
        assert!(dark < bright);
        assert!(with.weight(40.0) < without.weight(40.0));
    }

    #[test]
    fn plane_application_matches_scalar() {
        let init = WeightInitializer::default();
        let plane = GrayImage {
            data: vec![0.0, 64.0, 127.5, 200.0],
            width: 4,
            height: 1,
        };
        let weights = init.weight_plane(&plane);
        for x in 0..4 {
            assert_eq!(weights.get(x, 0), init.weight(plane.get(x, 0)));
        }
    }
}
