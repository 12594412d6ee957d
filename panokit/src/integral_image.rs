use crate::gray_image::GrayImage;

/// Summed-area table over a [`GrayImage`], the workhorse behind the box and
/// wavelet filters: any axis-aligned rectangle sum costs four lookups.
///
/// Sums are kept in `f64`; the table carries one zero row and column of
/// padding on the top/left so the recurrence needs no special cases.
pub struct IntegralImage {
    data: Vec<f64>,
    /// Width of the source image.
    pub width: usize,
    /// Height of the source image.
    pub height: usize,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> IntegralImage {
        let width = image.width;
        let height = image.height;
        let stride = width + 1;
        let mut data = vec![0.0f64; stride * (height + 1)];
        for y in 0..height {
            for x in 0..width {
                data[(y + 1) * stride + x + 1] = image.get(x, y) as f64
                    + data[y * stride + x + 1]
                    + data[(y + 1) * stride + x]
                    - data[y * stride + x];
            }
        }
        IntegralImage {
            data,
            width,
            height,
        }
    }

    /// Sum over the inclusive rectangle `[x0, x1] x [y0, y1]`.
    ///
    /// Coordinates may reach outside the image; they are clamped to it, so a
    /// rectangle hanging over the border sums only its visible part and a
    /// fully outside rectangle sums to 0.
    pub fn sum(&self, x0: i64, y0: i64, x1: i64, y1: i64) -> f64 {
        let stride = self.width + 1;
        let x0 = x0.clamp(0, self.width as i64) as usize;
        let y0 = y0.clamp(0, self.height as i64) as usize;
        let x1 = (x1 + 1).clamp(0, self.width as i64) as usize;
        let y1 = (y1 + 1).clamp(0, self.height as i64) as usize;
        if x1 <= x0 || y1 <= y0 {
            return 0.0;
        }
        self.data[y1 * stride + x1] - self.data[y0 * stride + x1] - self.data[y1 * stride + x0]
            + self.data[y0 * stride + x0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn checker(width: usize, height: usize) -> GrayImage {
        let mut img = GrayImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.set(x, y, ((x * 7 + y * 13) % 29) as f32);
            }
        }
        img
    }

    fn brute_force(img: &GrayImage, x0: i64, y0: i64, x1: i64, y1: i64) -> f64 {
        let mut total = 0.0f64;
        for y in y0.max(0)..=y1.min(img.height as i64 - 1) {
            for x in x0.max(0)..=x1.min(img.width as i64 - 1) {
                total += img.get(x as usize, y as usize) as f64;
            }
        }
        total
    }

    #[test]
    fn rectangle_sums_match_brute_force() {
        let img = checker(17, 11);
        let integral = IntegralImage::new(&img);
        for &(x0, y0, x1, y1) in &[(0, 0, 16, 10), (3, 2, 9, 8), (5, 5, 5, 5), (0, 4, 12, 4)] {
            assert_relative_eq!(
                integral.sum(x0, y0, x1, y1),
                brute_force(&img, x0, y0, x1, y1),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn out_of_range_rectangles_are_clamped() {
        let img = checker(8, 8);
        let integral = IntegralImage::new(&img);
        assert_relative_eq!(
            integral.sum(-3, -3, 20, 20),
            brute_force(&img, 0, 0, 7, 7),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            integral.sum(-5, 2, 3, 30),
            brute_force(&img, 0, 2, 3, 7),
            epsilon = 1e-9
        );
        assert_eq!(integral.sum(10, 10, 20, 20), 0.0);
        assert_eq!(integral.sum(5, 5, 2, 2), 0.0);
    }
}
