use clap::Parser;
use panokit::deghoster::{Deghoster, DeghostParams};
use panokit::exposure_stack::{Exposure, ExposureStack};
use panokit::mask_image::MaskImage;
use panokit::photo::Photo;
use panokit::thresholder::{brightness_contrast, Thresholder};

use image::open;
use std::path::Path;
use std::process;
use std::rc::Rc;

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Computes deghosting stencil masks for a bracketed exposure stack."
)]
struct Args {
    /// Input images (at least 3)
    #[arg()]
    inputs: Vec<String>,

    /// Filename prefix for weight images saved with -w
    #[arg(short = 'o', long, default_value = "weight")]
    output_prefix: String,

    /// Number of refinement iterations
    #[arg(short = 'i', long, default_value_t = 4)]
    iterations: u32,

    /// Deviation parameter of the weighting kernel (divided by 10 for HDR input)
    #[arg(short = 's', long, default_value_t = 30.0)]
    sigma: f32,

    /// Mask threshold on the 0..255 weight scale
    #[arg(short = 't', long, default_value_t = 150.0)]
    threshold: f32,

    /// Contrast applied to the weights before thresholding
    #[arg(short = 'c', long, default_value_t = 1.3)]
    contrast: f32,

    /// Advanced option letters:
    /// g = gamma compression instead of logarithm for HDR input,
    /// t = simple threshold (no best-layer fallback),
    /// w = full weight computation instead of probability only
    #[arg(short = 'a', long, default_value = "")]
    advanced: String,

    /// Debug save letters: i = initial weight images, w = final weight images
    #[arg(short = 'w', long, default_value = "")]
    save: String,

    /// Verbosity (repeatable)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    if args.inputs.is_empty() {
        eprintln!("Usage: deghost_mask [options] image1 image2 image3 [...]");
        eprintln!("Run with --help for the full option list.");
        process::exit(1);
    }
    if args.inputs.len() < 3 {
        eprintln!(
            "Err: deghosting needs at least 3 images, got {}",
            args.inputs.len()
        );
        process::exit(1);
    }

    // Load the stack; the canvas is the union of the input dimensions.
    let hdr_input = args.inputs.iter().any(|f| is_hdr_name(f));
    let exposures: Vec<Exposure> = args
        .inputs
        .iter()
        .map(|f| Exposure {
            photo: Rc::new(read_photo(f)),
            x_offset: 0,
            y_offset: 0,
        })
        .collect();
    let stack = ExposureStack::new(exposures).unwrap_or_else(|err| {
        eprintln!("Err: {err}");
        process::exit(1);
    });
    if args.verbose > 0 {
        println!(
            "Stack: {} exposures on a {}x{} canvas{}",
            stack.layer_count(),
            stack.width(),
            stack.height(),
            if hdr_input { ", HDR input" } else { "" }
        );
    }

    let params = DeghostParams {
        iterations: args.iterations,
        sigma: args.sigma,
        probability_only: !args.advanced.contains('w'),
        hdr_input,
        use_gamma: args.advanced.contains('g'),
        ..DeghostParams::default()
    };
    let deghoster = Deghoster::new(stack, params);

    if args.save.contains('i') {
        let planes = deghoster.prepare().unwrap_or_else(|err| {
            eprintln!("Err: {err}");
            process::exit(1);
        });
        for (k, plane) in planes.initial_planes.iter().enumerate() {
            save_weight_plane(plane, &format!("{}_i{}.png", args.output_prefix, k));
        }
    }

    let mut weights = deghoster.compute_weights().unwrap_or_else(|err| {
        eprintln!("Err: {err}");
        process::exit(1);
    });

    if args.save.contains('w') {
        for (k, plane) in deghoster.stack().unmap(&weights).iter().enumerate() {
            save_weight_plane(plane, &format!("{}_w{}.png", args.output_prefix, k));
        }
    }

    // Move the normalized weights into the 0..255 domain and steepen them
    // before thresholding.
    weights.map_values(|v| brightness_contrast(v * 255.0, 1.0, args.contrast));

    let thresholder = Thresholder {
        threshold: args.threshold,
        simple: args.advanced.contains('t'),
    };
    let masks = thresholder.masks(deghoster.stack(), &weights);

    for (input, mask) in args.inputs.iter().zip(&masks) {
        save_mask(&mask.despeckled(), &mask_filename(input));
    }

    println!("Done.");
}

fn is_hdr_name(filename: &str) -> bool {
    matches!(
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("hdr") | Some("exr")
    )
}

fn mask_filename(input: &str) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mask".to_string());
    path.with_file_name(format!("{stem}_mask.tif"))
        .to_string_lossy()
        .into_owned()
}

pub fn read_photo(filename: &str) -> Photo {
    println!("Reading image file: {filename}");
    let img = open(filename).expect("Could not load image");
    let width = img.width() as usize;
    let height = img.height() as usize;
    let alpha = if !img.color().has_alpha() {
        None
    } else if is_hdr_name(filename) {
        Some(
            img.to_rgba32f()
                .pixels()
                .map(|p| (p.0[3].clamp(0.0, 1.0) * 255.0) as u8)
                .collect(),
        )
    } else {
        Some(img.to_rgba8().pixels().map(|p| p.0[3]).collect())
    };
    // HDR files keep their native linear range, everything else the 8-bit one.
    let img_data = if is_hdr_name(filename) {
        img.to_rgb32f().into_raw()
    } else {
        img.to_rgb8().into_raw().iter().map(|&v| v as f32).collect()
    };
    Photo {
        img_data,
        alpha,
        width,
        height,
    }
}

pub fn save_weight_plane(plane: &panokit::gray_image::GrayImage, filename: &str) {
    println!("Writing image {filename}");
    let bytes: Vec<u8> = plane
        .data
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let img = image::GrayImage::from_raw(plane.width as u32, plane.height as u32, bytes).unwrap();
    img.save(filename).unwrap();
}

pub fn save_mask(mask: &MaskImage, filename: &str) {
    println!("Writing image {filename}");
    let img =
        image::GrayImage::from_raw(mask.width as u32, mask.height as u32, mask.data.clone())
            .unwrap();
    img.save(filename).unwrap();
}
