use std::fmt;
use std::rc::Rc;

use crate::gray_image::GrayImage;
use crate::photo::Photo;

/// One exposure of the stack: a shared photo plus its placement on the
/// common output canvas.
pub struct Exposure {
    pub photo: Rc<Photo>,
    pub x_offset: usize,
    pub y_offset: usize,
}

/// Errors raised while assembling or remapping an exposure stack.
#[derive(Debug, Clone, PartialEq)]
pub enum StackError {
    /// The stack contains no exposures.
    EmptyStack,
    /// An exposure's alpha plane does not match its pixel dimensions.
    AlphaSizeMismatch { layer: usize },
    /// The number of scalar planes does not match the number of exposures.
    PlaneCountMismatch { expected: usize, actual: usize },
    /// A scalar plane does not match its exposure's dimensions.
    PlaneSizeMismatch { layer: usize },
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackError::EmptyStack => write!(f, "exposure stack is empty"),
            StackError::AlphaSizeMismatch { layer } => {
                write!(f, "alpha plane of exposure {layer} has the wrong size")
            }
            StackError::PlaneCountMismatch { expected, actual } => {
                write!(f, "expected {expected} scalar planes, got {actual}")
            }
            StackError::PlaneSizeMismatch { layer } => {
                write!(f, "scalar plane {layer} does not match its exposure")
            }
        }
    }
}

impl std::error::Error for StackError {}

/// One `(layer, value)` sample of a canvas position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerSample {
    /// Index of the exposure this sample came from.
    pub layer: usize,
    pub value: f32,
}

/// Per-canvas-position layer vectors, the working representation of the
/// deghosting engine. Each canvas position holds one sample per exposure
/// covering it, in ascending layer order. The cells live in one contiguous
/// row-major buffer indexed by `y * width + x`.
#[derive(Clone)]
pub struct LayerVectors {
    width: usize,
    height: usize,
    cells: Vec<Vec<LayerSample>>,
}

impl LayerVectors {
    fn new(width: usize, height: usize) -> LayerVectors {
        LayerVectors {
            width,
            height,
            cells: vec![Vec::new(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of canvas positions.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn position_index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// The layer samples at a linear canvas position.
    pub fn cell(&self, position: usize) -> &[LayerSample] {
        &self.cells[position]
    }

    pub fn cell_mut(&mut self, position: usize) -> &mut Vec<LayerSample> {
        &mut self.cells[position]
    }

    /// Applies a point operation to every sample value, e.g. rescaling
    /// normalized weights to the 0..255 domain before thresholding.
    pub fn map_values(&mut self, f: impl Fn(f32) -> f32) {
        for cell in &mut self.cells {
            for sample in cell {
                sample.value = f(sample.value);
            }
        }
    }
}

/// A registered, canvas-placed set of exposures of the same scene.
///
/// The canvas spans the union of all exposures: its dimensions are the
/// maxima of `offset + size` over the stack.
pub struct ExposureStack {
    exposures: Vec<Exposure>,
    width: usize,
    height: usize,
}

impl ExposureStack {
    /// Validates the exposures and computes the canvas dimensions.
    ///
    /// # Errors
    /// `StackError::EmptyStack` when `exposures` is empty,
    /// `StackError::AlphaSizeMismatch` when an alpha plane disagrees with its
    /// photo's dimensions.
    pub fn new(exposures: Vec<Exposure>) -> Result<ExposureStack, StackError> {
        if exposures.is_empty() {
            return Err(StackError::EmptyStack);
        }
        let mut width = 0;
        let mut height = 0;
        for (layer, exposure) in exposures.iter().enumerate() {
            let photo = &exposure.photo;
            if let Some(alpha) = &photo.alpha {
                if alpha.len() != photo.width * photo.height {
                    return Err(StackError::AlphaSizeMismatch { layer });
                }
            }
            width = width.max(exposure.x_offset + photo.width);
            height = height.max(exposure.y_offset + photo.height);
        }
        Ok(ExposureStack {
            exposures,
            width,
            height,
        })
    }

    /// Canvas width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Canvas height.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layer_count(&self) -> usize {
        self.exposures.len()
    }

    pub fn exposures(&self) -> &[Exposure] {
        &self.exposures
    }

    /// Gathers one scalar plane per exposure into per-position layer vectors.
    ///
    /// Plane `i` must have the dimensions of exposure `i`. Every pixel with
    /// nonzero alpha contributes one sample at its canvas position; exposures
    /// are processed in order, so each cell lists its samples in ascending
    /// layer order. Planes remapped through the same stack produce
    /// structurally identical vectors, which is what the refiner relies on
    /// when it walks value and weight vectors in lockstep.
    pub fn remap(&self, planes: &[GrayImage]) -> Result<LayerVectors, StackError> {
        if planes.len() != self.exposures.len() {
            return Err(StackError::PlaneCountMismatch {
                expected: self.exposures.len(),
                actual: planes.len(),
            });
        }
        let mut vectors = LayerVectors::new(self.width, self.height);
        for (layer, (exposure, plane)) in self.exposures.iter().zip(planes).enumerate() {
            let photo = &exposure.photo;
            if plane.width != photo.width || plane.height != photo.height {
                return Err(StackError::PlaneSizeMismatch { layer });
            }
            for y in 0..photo.height {
                for x in 0..photo.width {
                    if !photo.is_covered(x, y) {
                        continue;
                    }
                    let position = (y + exposure.y_offset) * self.width + x + exposure.x_offset;
                    vectors.cells[position].push(LayerSample {
                        layer,
                        value: plane.get(x, y),
                    });
                }
            }
        }
        Ok(vectors)
    }

    /// Scatters per-position layer vectors back into per-exposure planes.
    ///
    /// The inverse of [`ExposureStack::remap`]: every sample lands at the
    /// local coordinates of its originating exposure. Local pixels that were
    /// never covered stay 0.
    pub fn unmap(&self, vectors: &LayerVectors) -> Vec<GrayImage> {
        let mut planes: Vec<GrayImage> = self
            .exposures
            .iter()
            .map(|e| GrayImage::new(e.photo.width, e.photo.height))
            .collect();
        for y in 0..self.height {
            for x in 0..self.width {
                for sample in vectors.cell(y * self.width + x) {
                    let exposure = &self.exposures[sample.layer];
                    planes[sample.layer].set(
                        x - exposure.x_offset,
                        y - exposure.y_offset,
                        sample.value,
                    );
                }
            }
        }
        planes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_photo(width: usize, height: usize, value: f32) -> Rc<Photo> {
        Rc::new(Photo {
            img_data: vec![value; width * height * 3],
            alpha: None,
            width,
            height,
        })
    }

    fn offset_stack() -> ExposureStack {
        // Two 100x100 exposures, the second shifted by (50, 50).
        let exposures = vec![
            Exposure {
                photo: flat_photo(100, 100, 10.0),
                x_offset: 0,
                y_offset: 0,
            },
            Exposure {
                photo: flat_photo(100, 100, 20.0),
                x_offset: 50,
                y_offset: 50,
            },
        ];
        ExposureStack::new(exposures).unwrap()
    }

    fn luminance_planes(stack: &ExposureStack) -> Vec<GrayImage> {
        stack
            .exposures()
            .iter()
            .map(|e| e.photo.luminance_image())
            .collect()
    }

    #[test]
    fn canvas_spans_the_union_of_exposures() {
        let stack = offset_stack();
        assert_eq!(stack.width(), 150);
        assert_eq!(stack.height(), 150);
    }

    #[test]
    fn overlap_cells_list_layers_in_order() {
        let stack = offset_stack();
        let planes = luminance_planes(&stack);
        let vectors = stack.remap(&planes).unwrap();

        // (60, 60) is covered by both exposures.
        let both = vectors.cell(vectors.position_index(60, 60));
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].layer, 0);
        assert_eq!(both[1].layer, 1);

        // (120, 120) only by the shifted one, (10, 10) only by the first.
        let second = vectors.cell(vectors.position_index(120, 120));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].layer, 1);
        let first = vectors.cell(vectors.position_index(10, 10));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].layer, 0);

        // (149, 0) is beyond the first exposure and left of the second.
        assert!(vectors.cell(vectors.position_index(149, 0)).is_empty());
    }

    #[test]
    fn zero_alpha_pixels_are_skipped() {
        let mut alpha = vec![255u8; 4];
        alpha[3] = 0;
        let photo = Rc::new(Photo {
            img_data: vec![5.0; 12],
            alpha: Some(alpha),
            width: 2,
            height: 2,
        });
        let stack = ExposureStack::new(vec![Exposure {
            photo,
            x_offset: 0,
            y_offset: 0,
        }])
        .unwrap();
        let planes = luminance_planes(&stack);
        let vectors = stack.remap(&planes).unwrap();
        assert_eq!(vectors.cell(vectors.position_index(0, 0)).len(), 1);
        assert!(vectors.cell(vectors.position_index(1, 1)).is_empty());
    }

    #[test]
    fn unmap_restores_covered_pixels() {
        let stack = offset_stack();
        let planes = luminance_planes(&stack);
        let vectors = stack.remap(&planes).unwrap();
        let restored = stack.unmap(&vectors);
        assert_eq!(restored.len(), 2);
        for (plane, original) in restored.iter().zip(&planes) {
            assert_eq!(plane.width, original.width);
            assert_eq!(plane.height, original.height);
            assert_eq!(plane.get(7, 7), original.get(7, 7));
            assert_eq!(plane.get(99, 99), original.get(99, 99));
        }
    }

    #[test]
    fn validation_errors_are_reported() {
        assert_eq!(
            ExposureStack::new(Vec::new()).err(),
            Some(StackError::EmptyStack)
        );

        let bad_alpha = Rc::new(Photo {
            img_data: vec![0.0; 12],
            alpha: Some(vec![255; 3]),
            width: 2,
            height: 2,
        });
        let err = ExposureStack::new(vec![Exposure {
            photo: bad_alpha,
            x_offset: 0,
            y_offset: 0,
        }])
        .err();
        assert_eq!(err, Some(StackError::AlphaSizeMismatch { layer: 0 }));

        let stack = offset_stack();
        assert_eq!(
            stack.remap(&[]).err(),
            Some(StackError::PlaneCountMismatch {
                expected: 2,
                actual: 0
            })
        );
        let wrong = vec![GrayImage::new(1, 1), GrayImage::new(100, 100)];
        assert_eq!(
            stack.remap(&wrong).err(),
            Some(StackError::PlaneSizeMismatch { layer: 0 })
        );
    }
}
