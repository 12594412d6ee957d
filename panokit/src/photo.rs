use crate::gray_image::GrayImage;

/// A basic representation of one exposure with RGB pixel data.
/// Each pixel occupies 3 floats: R, G, and B. Low dynamic range images use
/// the 0..255 domain; high dynamic range images keep their native linear
/// values, which may exceed 255.
pub struct Photo {
    /// Pixel data stored in a 1D `Vec<f32>`, in RGB format (3 floats per pixel).
    pub img_data: Vec<f32>,
    /// Per-pixel coverage, 255 = fully opaque. `None` means the whole image
    /// is opaque (an image file without an alpha channel).
    pub alpha: Option<Vec<u8>>,
    /// The width (in pixels) of the image.
    pub width: usize,
    /// The height (in pixels) of the image.
    pub height: usize,
}

impl Default for Photo {
    /// Creates an empty `Photo` with zero width and height, and no image data.
    fn default() -> Photo {
        Photo {
            img_data: Vec::new(),
            alpha: None,
            width: 0,
            height: 0,
        }
    }
}

impl Photo {
    /// Returns the `(R, G, B)` components at the pixel coordinate `(x, y)`.
    ///
    /// If `(x, y)` is out of bounds, this method returns `(0.0, 0.0, 0.0)`,
    /// effectively a black pixel.
    ///
    /// # Parameters
    /// - `x`: The x-coordinate of the pixel.
    /// - `y`: The y-coordinate of the pixel.
    ///
    /// # Returns
    /// A tuple `(r, g, b)` with the red, green, and blue channels of the pixel.
    pub fn get_rgb(&self, x: usize, y: usize) -> (f32, f32, f32) {
        if x >= self.width || y >= self.height {
            (0.0, 0.0, 0.0) // Return black if out of bounds
        } else {
            let index = (y * self.width + x) * 3;
            let r = self.img_data[index];
            let g = self.img_data[index + 1];
            let b = self.img_data[index + 2];
            (r, g, b)
        }
    }

    /// Returns the coverage value at `(x, y)`: the alpha channel if the image
    /// has one, 255 otherwise. Out-of-bounds coordinates count as uncovered.
    pub fn get_alpha(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        match &self.alpha {
            Some(alpha) => alpha[y * self.width + x],
            None => 255,
        }
    }

    /// True when the pixel at `(x, y)` carries image content (alpha nonzero).
    pub fn is_covered(&self, x: usize, y: usize) -> bool {
        self.get_alpha(x, y) != 0
    }

    /// Computes the luminance at `(x, y)` using the Rec. 601 luma weights.
    ///
    /// The result lives in the same domain as the pixel data, so an 8-bit
    /// derived image yields luminances in 0..255.
    pub fn luminance(&self, x: usize, y: usize) -> f32 {
        let (r, g, b) = self.get_rgb(x, y);
        0.299 * r + 0.587 * g + 0.114 * b
    }

    /// Extracts the luminance plane of the whole image.
    ///
    /// # Returns
    /// A `GrayImage` of the same dimensions holding per-pixel luminances.
    pub fn luminance_image(&self) -> GrayImage {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                data.push(self.luminance(x, y));
            }
        }
        GrayImage {
            data,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_one(r: f32, g: f32, b: f32) -> Photo {
        Photo {
            img_data: vec![r, g, b, 0.0, 0.0, 0.0],
            alpha: Some(vec![255, 0]),
            width: 2,
            height: 1,
        }
    }

    #[test]
    fn out_of_bounds_reads_are_black_and_uncovered() {
        let photo = two_by_one(10.0, 20.0, 30.0);
        assert_eq!(photo.get_rgb(5, 0), (0.0, 0.0, 0.0));
        assert_eq!(photo.get_alpha(0, 7), 0);
        assert!(!photo.is_covered(2, 0));
    }

    #[test]
    fn luminance_uses_rec601_weights() {
        let photo = two_by_one(255.0, 0.0, 0.0);
        let lum = photo.luminance(0, 0);
        assert!((lum - 0.299 * 255.0).abs() < 1e-4);
        // Second pixel is black but masked out; luminance is still defined.
        assert_eq!(photo.luminance(1, 0), 0.0);
    }

    #[test]
    fn missing_alpha_means_opaque() {
        let photo = Photo {
            img_data: vec![1.0, 1.0, 1.0],
            alpha: None,
            width: 1,
            height: 1,
        };
        assert_eq!(photo.get_alpha(0, 0), 255);
        assert!(photo.is_covered(0, 0));
    }
}
