use crate::integral_image::IntegralImage;

/// Haar wavelet responses over the integral image, used for orientation
/// assignment and descriptor gradients.
///
/// The x response is the right half-box minus the left, the y response the
/// bottom minus the top (image coordinates grow downward; callers negate
/// where they want mathematical orientation).
pub struct WaveFilter<'a> {
    integral: &'a IntegralImage,
    half: i64,
}

impl<'a> WaveFilter<'a> {
    /// `base_size` is the half-width of the default sampling square.
    pub fn new(integral: &'a IntegralImage, base_size: f64) -> WaveFilter<'a> {
        WaveFilter {
            integral,
            half: (base_size.round() as i64).max(1),
        }
    }

    pub fn check_bounds(&self, x: i64, y: i64) -> bool {
        self.check_bounds_sized(x, y, self.half)
    }

    pub fn check_bounds_sized(&self, x: i64, y: i64, half: i64) -> bool {
        x >= half
            && x + half < self.integral.width as i64
            && y >= half
            && y + half < self.integral.height as i64
    }

    pub fn wx(&self, x: i64, y: i64) -> f64 {
        self.wx_sized(x, y, self.half)
    }

    pub fn wy(&self, x: i64, y: i64) -> f64 {
        self.wy_sized(x, y, self.half)
    }

    pub fn wx_sized(&self, x: i64, y: i64, half: i64) -> f64 {
        self.integral.sum(x + 1, y - half, x + half, y + half)
            - self.integral.sum(x - half, y - half, x - 1, y + half)
    }

    pub fn wy_sized(&self, x: i64, y: i64, half: i64) -> f64 {
        self.integral.sum(x - half, y + 1, x + half, y + half)
            - self.integral.sum(x - half, y - half, x + half, y - 1)
    }

    /// Plain box sum of the sampling square, for mean-gray samples.
    pub fn sum_sized(&self, x: i64, y: i64, half: i64) -> f64 {
        self.integral.sum(x - half, y - half, x + half, y + half)
    }
}
