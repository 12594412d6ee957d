/// A scale-space interest point.
///
/// Producers hand keypoints to a caller-supplied sink (`impl FnMut(KeyPoint)`)
/// instead of returning collections, so callers can filter, bucket or stream
/// them without intermediate allocations.
#[derive(Clone, Debug)]
pub struct KeyPoint {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
    /// Hessian determinant at the detection, used for ranking.
    pub score: f64,
    /// Sign of the Laplacian trace; matching only pairs keypoints with the
    /// same sign.
    pub trace: i32,
    /// Dominant gradient direction in radians, assigned by the descriptor
    /// stage (0 until then).
    pub orientation: f64,
    /// Feature vector, empty until described.
    pub descriptor: Vec<f64>,
}

impl KeyPoint {
    pub fn new(x: f64, y: f64, scale: f64, score: f64, trace: i32) -> KeyPoint {
        KeyPoint {
            x,
            y,
            scale,
            score,
            trace,
            orientation: 0.0,
            descriptor: Vec::new(),
        }
    }
}
