//! # PanoKit Library
//!
//! The `panokit` library provides the image-processing cores of a panorama
//! workflow: merging bracketed exposure stacks into ghost-free composites
//! (weight computation, thresholded masks, weighted blending) and finding
//! corresponding control points between overlapping photos (keypoint
//! detection, description, matching and robust model fitting).
//!
//! ## Overview of Modules
//!
//! - **`photo`**: Defines a basic `Photo` struct for storing RGB pixel data
//!   plus an optional alpha plane, with pixel access and luminance helpers.
//!
//! - **`gray_image`**: Single-channel float image used for luminance planes
//!   and detector input, with logarithmic and gamma compression.
//!
//! - **`mask_image`**: 8-bit mask plane with a majority-vote despeckle pass.
//!
//! - **`exposure_stack`**: Aligns offset exposures on a common canvas and
//!   gathers, per canvas position, the sample from every covering layer.
//!
//! - **`weight_initializer`**: Initial per-sample weights from luminance
//!   (mexican-hat well-exposedness, optional high-SNR preference).
//!
//! - **`iterative_refiner`**: One deghosting iteration: re-weights every
//!   sample by how well it agrees with its spatial neighborhood.
//!
//! - **`weight_post_processor`**: Optional sharpening of converged weights
//!   (bias power or winner-takes-all).
//!
//! - **`thresholder`**: Turns final weights into per-exposure stencil masks.
//!
//! - **`blend`**: Weighted merge of an exposure stack into one photo, plus
//!   a plain weighted-average merge for comparison.
//!
//! - **`deghoster`**: Orchestrates the deghosting workflow end to end from
//!   an exposure stack and a parameter set.
//!
//! - **`integral_image`**: Summed-area table over a gray image for
//!   constant-time box sums.
//!
//! - **`box_filter`**: Approximated second-order derivatives and their
//!   determinant on top of the integral image.
//!
//! - **`wave_filter`**: First-order Haar responses on the integral image.
//!
//! - **`keypoint`**: The detected feature point record.
//!
//! - **`keypoint_detector`**: Multi-octave blob detector with non-maximum
//!   suppression and sub-pixel refinement.
//!
//! - **`circular_descriptor`**: Orientation assignment and the circular
//!   sampling descriptor attached to each keypoint.
//!
//! - **`sieve`**: Spatial bucket filter that evens out the keypoint
//!   distribution before matching.
//!
//! - **`point_match`**: A matched pair of keypoints from two images.
//!
//! - **`keypoint_matcher`**: Nearest-neighbor descriptor matching via a
//!   kd-tree.
//!
//! - **`homography`**: Least-squares projective mapping between two match
//!   point sets.
//!
//! - **`ransac`**: Robust match filtering around the homography estimator.
//!
//! - **`image_matcher`**: Orchestrates detection, description, matching and
//!   filtering for an image pair.
//!
//! - **`keypoint_io`**: Text serialization of keypoint lists.

// Exposure merging
pub mod blend;
pub mod deghoster;
pub mod exposure_stack;
pub mod gray_image;
pub mod iterative_refiner;
pub mod mask_image;
pub mod photo;
pub mod thresholder;
pub mod weight_initializer;
pub mod weight_post_processor;

// Keypoint pipeline
pub mod box_filter;
pub mod circular_descriptor;
pub mod homography;
pub mod image_matcher;
pub mod integral_image;
pub mod keypoint;
pub mod keypoint_detector;
pub mod keypoint_io;
pub mod keypoint_matcher;
pub mod point_match;
pub mod ransac;
pub mod sieve;
pub mod wave_filter;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
