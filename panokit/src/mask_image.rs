/// A binary mask with one byte per pixel, 0 (masked) or 255 (unmasked).
pub struct MaskImage {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl MaskImage {
    /// Creates a fully masked (all zero) mask of the given dimensions.
    pub fn new(width: usize, height: usize) -> MaskImage {
        MaskImage {
            data: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        if x >= self.width || y >= self.height {
            0
        } else {
            self.data[y * self.width + x]
        }
    }

    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Removes speckle noise with a 3x3 majority vote.
    ///
    /// Each output pixel takes the value held by more than half of the valid
    /// pixels in its 3x3 neighborhood (the window shrinks at the borders).
    /// An exact split keeps the pixel masked.
    pub fn despeckled(&self) -> MaskImage {
        let mut out = MaskImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let mut set_count = 0usize;
                let mut total = 0usize;
                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        let nx = x as i64 + dx;
                        let ny = y as i64 + dy;
                        if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64
                        {
                            continue;
                        }
                        total += 1;
                        if self.get(nx as usize, ny as usize) == 255 {
                            set_count += 1;
                        }
                    }
                }
                if set_count * 2 > total {
                    out.set(x, y, 255);
                }
            }
        }
        out
    }
}
