/// A single-channel image with `f32` pixel values, stored row-major.
///
/// Used for luminance planes, per-exposure weight planes and detector input.
/// As with [`crate::photo::Photo`], low dynamic range content uses the
/// 0..255 domain.
pub struct GrayImage {
    /// Pixel data stored in a 1D `Vec<f32>`, one float per pixel.
    pub data: Vec<f32>,
    /// The width (in pixels) of the image.
    pub width: usize,
    /// The height (in pixels) of the image.
    pub height: usize,
}

impl GrayImage {
    /// Creates a zero-filled image of the given dimensions.
    pub fn new(width: usize, height: usize) -> GrayImage {
        GrayImage {
            data: vec![0.0; width * height],
            width,
            height,
        }
    }

    /// Returns the pixel value at `(x, y)`, or 0.0 when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> f32 {
        if x >= self.width || y >= self.height {
            0.0
        } else {
            self.data[y * self.width + x]
        }
    }

    /// Writes `value` at `(x, y)`. Out-of-bounds coordinates are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Compresses the dynamic range with `ln(1 + v)`.
    ///
    /// Negative values (which a well-formed radiance map should not contain)
    /// are clamped to zero first so the logarithm stays defined.
    pub fn logarithm(&self) -> GrayImage {
        GrayImage {
            data: self.data.iter().map(|v| (1.0 + v.max(0.0)).ln()).collect(),
            width: self.width,
            height: self.height,
        }
    }

    /// Compresses the dynamic range with a gamma curve instead of a logarithm.
    ///
    /// The image is normalized to 0..1 by its own minimum and maximum and then
    /// raised to the power 0.45 (roughly a 2.2 display gamma). A flat image
    /// maps to all zeros.
    pub fn gamma_compressed(&self) -> GrayImage {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &v in &self.data {
            min = min.min(v);
            max = max.max(v);
        }
        let range = max - min;
        let data = if range > 0.0 {
            self.data
                .iter()
                .map(|v| ((v - min) / range).powf(0.45))
                .collect()
        } else {
            vec![0.0; self.data.len()]
        };
        GrayImage {
            data,
            width: self.width,
            height: self.height,
        }
    }

    /// Decimates the image to half size without interpolation by keeping
    /// every second pixel. Used to speed up keypoint detection; detected
    /// coordinates are scaled back up by the caller.
    pub fn half_scaled(&self) -> GrayImage {
        let new_width = self.width / 2;
        let new_height = self.height / 2;
        let mut data = Vec::with_capacity(new_width * new_height);
        for y in 0..new_height {
            for x in 0..new_width {
                data.push(self.get(x * 2, y * 2));
            }
        }
        GrayImage {
            data,
            width: new_width,
            height: new_height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_and_set_round_trip_with_oob_sentinel() {
        let mut img = GrayImage::new(3, 2);
        img.set(2, 1, 7.5);
        img.set(9, 9, 1.0); // silently ignored
        assert_eq!(img.get(2, 1), 7.5);
        assert_eq!(img.get(9, 9), 0.0);
    }

    #[test]
    fn logarithm_compresses_and_clamps() {
        let img = GrayImage {
            data: vec![0.0, -3.0, (std::f32::consts::E - 1.0)],
            width: 3,
            height: 1,
        };
        let log = img.logarithm();
        assert_eq!(log.get(0, 0), 0.0);
        assert_eq!(log.get(1, 0), 0.0);
        assert!((log.get(2, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn gamma_normalizes_to_unit_range() {
        let img = GrayImage {
            data: vec![10.0, 20.0, 30.0, 40.0],
            width: 4,
            height: 1,
        };
        let gamma = img.gamma_compressed();
        assert_eq!(gamma.get(0, 0), 0.0);
        assert!((gamma.get(3, 0) - 1.0).abs() < 1e-6);
        assert!(gamma.get(1, 0) > (10.0f32 / 30.0));
    }

    #[test]
    fn half_scale_keeps_every_second_pixel() {
        let img = GrayImage {
            data: (0..24).map(|v| v as f32).collect(),
            width: 6,
            height: 4,
        };
        let half = img.half_scaled();
        assert_eq!(half.width, 3);
        assert_eq!(half.height, 2);
        assert_eq!(half.get(0, 0), 0.0);
        assert_eq!(half.get(1, 0), 2.0);
        assert_eq!(half.get(2, 1), 16.0);
    }
}
