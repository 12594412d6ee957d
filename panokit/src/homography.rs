use crate::point_match::PointMatch;
use nalgebra::{DMatrix, Matrix3, Vector2, Vector3};

/// Minimum number of matches needed to determine the eight coefficients.
pub const MIN_MATCHES: usize = 4;

/// A projective mapping from the first image of a match set onto the
/// second, estimated by least squares.
///
/// Coordinates are expressed relative to the barycenter of each point set
/// before solving, which keeps the normal equations well-conditioned for
/// typical image coordinates.
#[derive(Clone, Debug)]
pub struct Homography {
    pub matrix: Matrix3<f64>,
    pub source_center: Vector2<f64>,
    pub target_center: Vector2<f64>,
}

impl Homography {
    /// Fits a homography to `matches` (keypoint1 -> keypoint2).
    ///
    /// Returns `None` for fewer than [MIN_MATCHES] matches or a degenerate
    /// configuration (for example collinear or repeated points).
    pub fn estimate(matches: &[PointMatch]) -> Option<Homography> {
        if matches.len() < MIN_MATCHES {
            return None;
        }

        let n = matches.len() as f64;
        let mut source_center = Vector2::zeros();
        let mut target_center = Vector2::zeros();
        for m in matches {
            source_center += Vector2::new(m.keypoint1.x, m.keypoint1.y);
            target_center += Vector2::new(m.keypoint2.x, m.keypoint2.y);
        }
        source_center /= n;
        target_center /= n;

        // Two equations per match over the eight unknown coefficients,
        // with the right-hand side carried as a ninth column.
        let mut m = DMatrix::<f64>::zeros(2 * matches.len(), 9);
        for (i, pm) in matches.iter().enumerate() {
            let x1 = pm.keypoint1.x - source_center.x;
            let y1 = pm.keypoint1.y - source_center.y;
            let x2 = pm.keypoint2.x - target_center.x;
            let y2 = pm.keypoint2.y - target_center.y;

            let even = 2 * i;
            m[(even, 3)] = -x1;
            m[(even, 4)] = -y1;
            m[(even, 5)] = -1.0;
            m[(even, 6)] = x1 * y2;
            m[(even, 7)] = y1 * y2;
            m[(even, 8)] = y2;

            let odd = even + 1;
            m[(odd, 0)] = x1;
            m[(odd, 1)] = y1;
            m[(odd, 2)] = 1.0;
            m[(odd, 6)] = -x1 * x2;
            m[(odd, 7)] = -y1 * x2;
            m[(odd, 8)] = -x2;
        }

        // Givens rotations triangularize the system in place.
        for col in 0..8 {
            for row in (col + 1)..m.nrows() {
                let a = m[(col, col)];
                let b = m[(row, col)];
                if b == 0.0 {
                    continue;
                }
                let r = a.hypot(b);
                let c = a / r;
                let s = b / r;
                for k in col..9 {
                    let t1 = m[(col, k)];
                    let t2 = m[(row, k)];
                    m[(col, k)] = c * t1 + s * t2;
                    m[(row, k)] = -s * t1 + c * t2;
                }
            }
            if m[(col, col)].abs() < 1e-10 {
                return None;
            }
        }

        let mut coeffs = [0.0f64; 8];
        for col in (0..8).rev() {
            let mut sum = m[(col, 8)];
            for k in (col + 1)..8 {
                sum -= m[(col, k)] * coeffs[k];
            }
            coeffs[col] = sum / m[(col, col)];
        }

        // The rows above solve for the matrix scaled so its last entry is
        // -1; flip the sign to store the usual h22 = 1 form.
        let matrix = Matrix3::new(
            -coeffs[0], -coeffs[1], -coeffs[2],
            -coeffs[3], -coeffs[4], -coeffs[5],
            -coeffs[6], -coeffs[7], 1.0,
        );
        Some(Homography {
            matrix,
            source_center,
            target_center,
        })
    }

    /// Maps a point from the first image into the second.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let p = Vector3::new(x - self.source_center.x, y - self.source_center.y, 1.0);
        let q = self.matrix * p;
        (
            q.x / q.z + self.target_center.x,
            q.y / q.z + self.target_center.y,
        )
    }
}
