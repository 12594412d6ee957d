use crate::circular_descriptor::CircularKeyPointDescriptor;
use crate::gray_image::GrayImage;
use crate::homography::Homography;
use crate::integral_image::IntegralImage;
use crate::keypoint::KeyPoint;
use crate::keypoint_detector::KeyPointDetector;
use crate::keypoint_matcher::KeyPointMatcher;
use crate::point_match::PointMatch;
use crate::ransac::Ransac;
use crate::sieve::KeyPointSieve;

/// Outcome of matching two images.
pub struct MatchResult {
    /// Matches that survived the robust filter, strongest first.
    pub matches: Vec<PointMatch>,
    /// Mapping from the first image onto the second, refitted on the
    /// surviving matches. `None` when they do not determine one.
    pub homography: Option<Homography>,
}

/// End-to-end pairwise image matching.
///
/// Runs the keypoint detector over each image, sieves the detections to an
/// even spatial spread, attaches orientations and descriptors (one extra
/// keypoint per secondary orientation), matches descriptors with a
/// kd-tree, and prunes the matches with [Ransac].
pub struct ImageMatcher {
    pub detector: KeyPointDetector,
    pub ransac: Ransac,
    pub sieve_buckets_x: usize,
    pub sieve_buckets_y: usize,
    pub sieve_depth: usize,
}

impl Default for ImageMatcher {
    fn default() -> Self {
        ImageMatcher {
            detector: KeyPointDetector::new(),
            ransac: Ransac::new(),
            sieve_buckets_x: 10,
            sieve_buckets_y: 10,
            sieve_depth: 10,
        }
    }
}

impl ImageMatcher {
    pub fn new() -> Self {
        Default::default()
    }

    /// Detects, sieves and describes the keypoints of one image.
    pub fn find_keypoints(&self, image: &GrayImage) -> Vec<KeyPoint> {
        let integral = IntegralImage::new(image);
        let mut sieve = KeyPointSieve::new(
            self.sieve_buckets_x,
            self.sieve_buckets_y,
            self.sieve_depth,
            image.width,
            image.height,
        );
        self.detector.detect(&integral, |kp| sieve.insert(kp));

        let mut sieved = Vec::new();
        sieve.extract(&mut |kp| sieved.push(kp));

        let descriptor = CircularKeyPointDescriptor::new(&integral);
        let mut described = Vec::new();
        for mut kp in sieved {
            let secondary = descriptor.assign_orientation(&mut kp);
            for angle in secondary {
                let mut extra = kp.clone();
                extra.orientation = angle;
                descriptor.make_descriptor(&mut extra);
                described.push(extra);
            }
            descriptor.make_descriptor(&mut kp);
            described.push(kp);
        }
        described
    }

    /// Matches `image1` against `image2`.
    pub fn match_images(&self, image1: &GrayImage, image2: &GrayImage) -> MatchResult {
        let keypoints1 = self.find_keypoints(image1);
        let keypoints2 = self.find_keypoints(image2);
        let candidates = KeyPointMatcher::new().match_keypoints(&keypoints1, &keypoints2);
        let matches = self.ransac.filter(&candidates);
        let homography = Homography::estimate(&matches);
        MatchResult {
            matches,
            homography,
        }
    }
}
