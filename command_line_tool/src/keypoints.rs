use clap::Parser;
use panokit::circular_descriptor::DESCRIPTOR_LENGTH;
use panokit::image_matcher::ImageMatcher;
use panokit::integral_image::IntegralImage;
use panokit::keypoint::KeyPoint;
use panokit::keypoint_detector::KeyPointDetector;
use panokit::keypoint_io::write_keypoints;
use panokit::photo::Photo;
use panokit::sieve::KeyPointSieve;

use image::open;
use std::fs::File;
use std::io::Write;
use std::process;

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detects and describes keypoints of a single image."
)]
struct Args {
    /// Input image
    #[arg()]
    inputs: Vec<String>,

    /// Detect on the full-resolution image instead of the half-scale default
    #[arg(long, default_value_t = false)]
    fullscale: bool,

    /// Detector score threshold
    #[arg(long, default_value_t = 1000.0)]
    surfscore: f64,

    /// Sieve bucket columns
    #[arg(long, default_value_t = 10)]
    sievewidth: usize,

    /// Sieve bucket rows
    #[arg(long, default_value_t = 10)]
    sieveheight: usize,

    /// Keypoints kept per sieve bucket
    #[arg(long, default_value_t = 10)]
    sievesize: usize,

    /// Only detect interest points, skipping orientation and descriptors
    #[arg(long, default_value_t = false)]
    interestpoints: bool,

    /// Output file (stdout when omitted)
    #[arg(short = 'o', long)]
    output: Option<String>,
}

fn main() {
    let args = Args::parse();

    if args.inputs.len() != 1 {
        eprintln!("Usage: keypoints [options] image");
        eprintln!("Run with --help for the full option list.");
        process::exit(1);
    }
    let input = &args.inputs[0];

    let photo = read_photo(input);
    let mut gray = photo.luminance_image();
    // Half-scale detection is the default; coordinates and scales are
    // doubled on output so they refer to the original image.
    let scale_back = if args.fullscale {
        1.0
    } else {
        gray = gray.half_scaled();
        2.0
    };

    let mut detector = KeyPointDetector::new();
    detector.score_threshold = args.surfscore;

    let mut keypoints: Vec<KeyPoint> = if args.interestpoints {
        let integral = IntegralImage::new(&gray);
        let mut sieve = KeyPointSieve::new(
            args.sievewidth,
            args.sieveheight,
            args.sievesize,
            gray.width,
            gray.height,
        );
        detector.detect(&integral, |kp| sieve.insert(kp));
        let mut found = Vec::new();
        sieve.extract(&mut |kp| found.push(kp));
        found
    } else {
        let mut matcher = ImageMatcher::new();
        matcher.detector = detector;
        matcher.sieve_buckets_x = args.sievewidth;
        matcher.sieve_buckets_y = args.sieveheight;
        matcher.sieve_depth = args.sievesize;
        matcher.find_keypoints(&gray)
    };

    for kp in &mut keypoints {
        kp.x *= scale_back;
        kp.y *= scale_back;
        kp.scale *= scale_back;
    }
    eprintln!("Found {} keypoints", keypoints.len());

    let descriptor_length = if args.interestpoints {
        0
    } else {
        DESCRIPTOR_LENGTH
    };
    match &args.output {
        Some(path) => {
            let mut file = File::create(path).expect("Could not create output file");
            write_to(
                &mut file,
                &keypoints,
                descriptor_length,
                input,
                photo.width,
                photo.height,
            );
            eprintln!("Keypoints written to {path}");
        }
        None => {
            let stdout = std::io::stdout();
            write_to(
                &mut stdout.lock(),
                &keypoints,
                descriptor_length,
                input,
                photo.width,
                photo.height,
            );
        }
    }
}

pub fn write_to<W: Write>(
    writer: &mut W,
    keypoints: &[KeyPoint],
    descriptor_length: usize,
    input: &str,
    width: usize,
    height: usize,
) {
    write_keypoints(writer, keypoints, descriptor_length, input, width, height)
        .expect("Failed to write keypoints");
}

pub fn read_photo(filename: &str) -> Photo {
    eprintln!("Reading image file: {filename}");
    let img = open(filename).expect("Could not load image");
    let width = img.width() as usize;
    let height = img.height() as usize;
    let img_data = img.to_rgb8().into_raw().iter().map(|&v| v as f32).collect();
    Photo {
        img_data,
        alpha: None,
        width,
        height,
    }
}
