use crate::homography::Homography;
use crate::point_match::PointMatch;
use rand::Rng;

/// Robust match filtering: repeatedly fits a [Homography] to a small
/// random subset and keeps the model that explains the most matches.
pub struct Ransac {
    /// Number of random subsets to try.
    pub iterations: usize,
    /// Matches drawn per subset; must be at least
    /// [crate::homography::MIN_MATCHES].
    pub sample_size: usize,
    /// A match is an inlier when its reprojection error squared stays
    /// below this (in pixels squared).
    pub max_squared_error: f64,
}

impl Default for Ransac {
    fn default() -> Self {
        Ransac {
            iterations: 1000,
            sample_size: 5,
            max_squared_error: 25.0,
        }
    }
}

impl Ransac {
    pub fn new() -> Self {
        Default::default()
    }

    /// Filters `matches` down to the largest consistent inlier set.
    pub fn filter(&self, matches: &[PointMatch]) -> Vec<PointMatch> {
        self.filter_with(&mut rand::thread_rng(), matches)
    }

    /// Like [Ransac::filter] but with a caller-provided random source.
    pub fn filter_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        matches: &[PointMatch],
    ) -> Vec<PointMatch> {
        if matches.len() < self.sample_size {
            return Vec::new();
        }

        let mut best: Vec<usize> = Vec::new();
        for _ in 0..self.iterations {
            let subset: Vec<PointMatch> =
                rand::seq::index::sample(rng, matches.len(), self.sample_size)
                    .iter()
                    .map(|i| matches[i].clone())
                    .collect();
            let model = match Homography::estimate(&subset) {
                Some(model) => model,
                None => continue,
            };

            let inliers: Vec<usize> = matches
                .iter()
                .enumerate()
                .filter(|(_, m)| {
                    let (tx, ty) = model.transform_point(m.keypoint1.x, m.keypoint1.y);
                    let dx = tx - m.keypoint2.x;
                    let dy = ty - m.keypoint2.y;
                    dx * dx + dy * dy <= self.max_squared_error
                })
                .map(|(i, _)| i)
                .collect();

            if inliers.len() > best.len() {
                best = inliers;
                if best.len() == matches.len() {
                    // Nothing left to reject.
                    break;
                }
            }
        }

        best.into_iter().map(|i| matches[i].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoint::KeyPoint;
    use nalgebra::{Matrix3, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn apply(h: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
        let q = h * Vector3::new(x, y, 1.0);
        (q.x / q.z, q.y / q.z)
    }

    fn pm(x1: f64, y1: f64, x2: f64, y2: f64) -> PointMatch {
        PointMatch::new(
            KeyPoint::new(x1, y1, 2.0, 100.0, 1),
            KeyPoint::new(x2, y2, 2.0, 100.0, 1),
        )
    }

    fn grid_matches(h: &Matrix3<f64>) -> Vec<PointMatch> {
        let mut matches = Vec::new();
        for j in 0..5 {
            for i in 0..8 {
                let x = (i * 7 + 3) as f64;
                let y = (j * 9 + 2) as f64;
                let (u, v) = apply(h, x, y);
                matches.push(pm(x, y, u, v));
            }
        }
        matches
    }

    #[test]
    fn rejects_gross_outliers() {
        let truth = Matrix3::new(
            1.05, 0.02, 4.0, //
            -0.03, 0.98, -2.0, //
            1e-4, 5e-5, 1.0,
        );
        let mut matches = grid_matches(&truth);
        let inlier_count = matches.len();
        // Ten matches pointing somewhere else entirely.
        for k in 0..10 {
            let x = (k * 5 + 1) as f64;
            let y = (k * 3 + 4) as f64;
            let (u, v) = apply(&truth, x, y);
            matches.push(pm(x, y, u + 50.0, v - 35.0));
        }

        let mut rng = StdRng::seed_from_u64(7);
        let kept = Ransac::new().filter_with(&mut rng, &matches);
        assert_eq!(kept.len(), inlier_count);
        let model = Homography::estimate(&kept).unwrap();
        for m in &kept {
            let (tx, ty) = model.transform_point(m.keypoint1.x, m.keypoint1.y);
            let err = (tx - m.keypoint2.x).powi(2) + (ty - m.keypoint2.y).powi(2);
            assert!(err < 1.0, "inlier error {err}");
        }
    }

    #[test]
    fn clean_matches_all_survive() {
        let truth = Matrix3::new(
            0.95, 0.0, 10.0, //
            0.0, 1.02, -6.0, //
            0.0, 0.0, 1.0,
        );
        let matches = grid_matches(&truth);
        let mut rng = StdRng::seed_from_u64(11);
        let kept = Ransac::new().filter_with(&mut rng, &matches);
        assert_eq!(kept.len(), matches.len());
    }

    #[test]
    fn too_few_matches_yield_nothing() {
        let matches = vec![
            pm(0.0, 0.0, 1.0, 1.0),
            pm(10.0, 0.0, 11.0, 1.0),
            pm(0.0, 10.0, 1.0, 11.0),
            pm(10.0, 10.0, 11.0, 11.0),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        assert!(Ransac::new().filter_with(&mut rng, &matches).is_empty());
    }

    #[test]
    fn degenerate_geometry_yields_nothing() {
        // Every source point is the same; no model can be fitted.
        let matches: Vec<PointMatch> = (0..8).map(|i| pm(5.0, 5.0, i as f64, 0.0)).collect();
        let mut rng = StdRng::seed_from_u64(5);
        assert!(Ransac::new().filter_with(&mut rng, &matches).is_empty());
    }
}
