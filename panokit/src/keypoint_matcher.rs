use crate::keypoint::KeyPoint;
use crate::point_match::PointMatch;
use kd_tree::{KdPoint, KdTree};

impl KdPoint for KeyPoint {
    type Scalar = f64;
    type Dim = typenum::U38;
    fn at(&self, k: usize) -> f64 {
        self.descriptor[k]
    }
}

/// Provides a way to match keypoint descriptors between two images.
///
/// This struct uses a [KdTree] (built from the `kd_tree` crate) to find the
/// nearest neighbor from one set of described [KeyPoint] objects for each
/// keypoint in another. Every keypoint handed in must already carry a
/// descriptor of [crate::circular_descriptor::DESCRIPTOR_LENGTH] entries.
///
pub struct KeyPointMatcher;

impl KeyPointMatcher {
    pub fn new() -> Self {
        KeyPointMatcher {}
    }

    /// Pairs every keypoint of `keypoints2` with its nearest descriptor in
    /// `keypoints1`, strongest matches first.
    pub fn match_keypoints(
        &self,
        keypoints1: &[KeyPoint],
        keypoints2: &[KeyPoint],
    ) -> Vec<PointMatch> {
        let kdtree = KdTree::build_by_ordered_float(keypoints1.to_vec());
        let mut ans: Vec<PointMatch> = Vec::new();
        for kp2 in keypoints2 {
            let nearest = kdtree.nearest(kp2);
            if nearest.is_some() {
                let kp1 = nearest.unwrap().item;
                ans.push(PointMatch::new(kp1.clone(), kp2.clone()));
            }
        }
        ans.sort_by(|a, b| b.combined_score().total_cmp(&a.combined_score()));
        ans
    }
}
