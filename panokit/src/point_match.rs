use crate::keypoint::KeyPoint;

/// A pair of keypoints, one from each image, believed to show the same
/// scene point.
#[derive(Clone, Debug)]
pub struct PointMatch {
    pub keypoint1: KeyPoint,
    pub keypoint2: KeyPoint,
}

impl PointMatch {
    pub fn new(keypoint1: KeyPoint, keypoint2: KeyPoint) -> PointMatch {
        PointMatch {
            keypoint1,
            keypoint2,
        }
    }

    /// Sum of both detector scores, used to rank matches.
    pub fn combined_score(&self) -> f64 {
        self.keypoint1.score + self.keypoint2.score
    }
}
