use crate::integral_image::IntegralImage;

/// Box-filter approximations of the second-order Gaussian derivatives, the
/// SURF-style Hessian used by the keypoint detector.
///
/// The filter is parameterized by its lobe size `b` (forced odd): the full
/// filter is `3b` pixels on a side, and the mixed derivative uses four
/// `b x b` quadrants. Responses are normalized by the filter area so scores
/// are comparable across scales.
pub struct BoxFilter<'a> {
    integral: &'a IntegralImage,
    lobe: i64,
    half_lobe: i64,
    border: i64,
    inv_area: f64,
}

impl<'a> BoxFilter<'a> {
    /// Builds the filter for a lobe of (roughly) `lobe_size` pixels. Box
    /// lobes must be odd, so the rounded size is bumped by one when even.
    pub fn new(integral: &'a IntegralImage, lobe_size: f64) -> BoxFilter<'a> {
        let mut lobe = lobe_size.round() as i64;
        if lobe < 3 {
            lobe = 3;
        }
        if lobe % 2 == 0 {
            lobe += 1;
        }
        let side = 3 * lobe;
        BoxFilter {
            integral,
            lobe,
            half_lobe: (lobe - 1) / 2,
            border: (side - 1) / 2,
            inv_area: 1.0 / (side * side) as f64,
        }
    }

    /// True when the full filter footprint around `(x, y)` stays inside the
    /// image.
    pub fn check_bounds(&self, x: i64, y: i64) -> bool {
        x >= self.border
            && x + self.border < self.integral.width as i64
            && y >= self.border
            && y + self.border < self.integral.height as i64
    }

    pub fn dxx(&self, x: i64, y: i64) -> f64 {
        self.integral.sum(
            x - self.border,
            y - self.half_lobe,
            x + self.border,
            y + self.half_lobe,
        ) - 3.0
            * self.integral.sum(
                x - self.half_lobe,
                y - self.half_lobe,
                x + self.half_lobe,
                y + self.half_lobe,
            )
    }

    pub fn dyy(&self, x: i64, y: i64) -> f64 {
        self.integral.sum(
            x - self.half_lobe,
            y - self.border,
            x + self.half_lobe,
            y + self.border,
        ) - 3.0
            * self.integral.sum(
                x - self.half_lobe,
                y - self.half_lobe,
                x + self.half_lobe,
                y + self.half_lobe,
            )
    }

    /// Mixed derivative from four diagonal quadrants:
    /// top-right + bottom-left - top-left - bottom-right.
    pub fn dxy(&self, x: i64, y: i64) -> f64 {
        self.integral.sum(x + 1, y - self.lobe, x + self.lobe, y - 1)
            + self.integral.sum(x - self.lobe, y + 1, x - 1, y + self.lobe)
            - self.integral.sum(x - self.lobe, y - self.lobe, x - 1, y - 1)
            - self.integral.sum(x + 1, y + 1, x + self.lobe, y + self.lobe)
    }

    /// The approximated Hessian determinant with the usual 0.81 correction
    /// on the mixed term.
    pub fn det(&self, x: i64, y: i64) -> f64 {
        let dxx = self.dxx(x, y) * self.inv_area;
        let dyy = self.dyy(x, y) * self.inv_area;
        let dxy = self.dxy(x, y) * self.inv_area;
        dxx * dyy - 0.81 * dxy * dxy
    }

    /// Sign of the Laplacian trace: -1 for dark blobs on bright background,
    /// 1 for bright on dark.
    pub fn trace_sign(&self, x: i64, y: i64) -> i32 {
        if self.dxx(x, y) + self.dyy(x, y) <= 0.0 {
            -1
        } else {
            1
        }
    }
}
