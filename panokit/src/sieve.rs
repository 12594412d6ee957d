use crate::keypoint::KeyPoint;

/// Spreads keypoints over a coarse bucket grid and keeps only the
/// strongest few per bucket.
///
/// Detectors tend to pile keypoints onto the most textured image region;
/// the sieve forces a more even spatial distribution before matching.
pub struct KeyPointSieve {
    buckets_x: usize,
    buckets_y: usize,
    depth: usize,
    image_width: f64,
    image_height: f64,
    buckets: Vec<Vec<KeyPoint>>,
}

impl KeyPointSieve {
    /// `buckets_x` x `buckets_y` grid over an `image_width` x `image_height`
    /// image, keeping the `depth` highest-scoring keypoints per bucket.
    pub fn new(
        buckets_x: usize,
        buckets_y: usize,
        depth: usize,
        image_width: usize,
        image_height: usize,
    ) -> KeyPointSieve {
        KeyPointSieve {
            buckets_x,
            buckets_y,
            depth,
            image_width: image_width as f64,
            image_height: image_height as f64,
            buckets: vec![Vec::new(); buckets_x * buckets_y],
        }
    }

    pub fn insert(&mut self, keypoint: KeyPoint) {
        let bx = ((keypoint.x / self.image_width * self.buckets_x as f64) as usize)
            .min(self.buckets_x - 1);
        let by = ((keypoint.y / self.image_height * self.buckets_y as f64) as usize)
            .min(self.buckets_y - 1);
        let bucket = &mut self.buckets[by * self.buckets_x + bx];
        let pos = bucket
            .iter()
            .position(|k| k.score < keypoint.score)
            .unwrap_or(bucket.len());
        bucket.insert(pos, keypoint);
        bucket.truncate(self.depth);
    }

    /// Hands every surviving keypoint to `insertor` and returns how many
    /// were emitted.
    pub fn extract(self, insertor: &mut impl FnMut(KeyPoint)) -> usize {
        let mut count = 0;
        for bucket in self.buckets {
            for keypoint in bucket {
                insertor(keypoint);
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp(x: f64, y: f64, score: f64) -> KeyPoint {
        KeyPoint::new(x, y, 2.0, score, 1)
    }

    #[test]
    fn keeps_only_the_strongest_per_bucket() {
        let mut sieve = KeyPointSieve::new(2, 2, 2, 100, 100);
        // Five keypoints, all in the top-left bucket.
        for (i, score) in [10.0, 50.0, 30.0, 40.0, 20.0].iter().enumerate() {
            sieve.insert(kp(5.0 + i as f64, 5.0, *score));
        }
        let mut kept = Vec::new();
        let count = sieve.extract(&mut |k| kept.push(k));
        assert_eq!(count, 2);
        let scores: Vec<f64> = kept.iter().map(|k| k.score).collect();
        assert_eq!(scores, vec![50.0, 40.0]);
    }

    #[test]
    fn buckets_are_independent() {
        let mut sieve = KeyPointSieve::new(2, 2, 1, 100, 100);
        sieve.insert(kp(10.0, 10.0, 5.0));
        sieve.insert(kp(90.0, 10.0, 6.0));
        sieve.insert(kp(10.0, 90.0, 7.0));
        sieve.insert(kp(90.0, 90.0, 8.0));
        let mut kept = Vec::new();
        let count = sieve.extract(&mut |k| kept.push(k));
        assert_eq!(count, 4);
    }

    #[test]
    fn coordinates_on_the_far_edge_fall_into_the_last_bucket() {
        let mut sieve = KeyPointSieve::new(10, 10, 10, 100, 100);
        sieve.insert(kp(100.0, 100.0, 1.0));
        let mut kept = Vec::new();
        assert_eq!(sieve.extract(&mut |k| kept.push(k)), 1);
    }
}
