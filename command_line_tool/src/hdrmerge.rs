use clap::Parser;
use panokit::blend::{blend_weighted, merge_average};
use panokit::deghoster::{Deghoster, DeghostParams};
use panokit::exposure_stack::{Exposure, ExposureStack};
use panokit::gray_image::GrayImage;
use panokit::photo::Photo;
use panokit::weight_post_processor::{PostProcess, WeightPostProcessor, DEFAULT_BIAS_POWER};

use image::open;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::process;
use std::rc::Rc;

/// Command line arguments structure.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Merges a bracketed exposure stack into a single image, with optional deghosting."
)]
struct Args {
    /// Input images (at least 2)
    #[arg()]
    inputs: Vec<String>,

    /// Output filename; the format follows the extension
    /// (.hdr Radiance, .exr OpenEXR, anything else tone-clamped 8-bit)
    #[arg(short = 'o', long, default_value = "merged.hdr")]
    output: String,

    /// Merge mode: khan, avg, or avg_slow
    #[arg(short = 'm', long, default_value = "khan")]
    mode: String,

    /// Number of refinement iterations (khan mode)
    #[arg(short = 'i', long, default_value_t = 1)]
    iterations: u32,

    /// Advanced option letters:
    /// b = bias post-process, c = winner-takes-all (overrides b and d),
    /// d = choose the best layer during iteration, h = favor high SNR,
    /// i = ignore the alpha channel of the inputs
    #[arg(short = 'a', long, default_value = "")]
    advanced: String,

    /// Per-iteration debug saves: w = weights, r = fused result, a = both
    #[arg(short = 's', long, default_value = "")]
    save: String,

    /// Export the initial weights as <input-stem>_iw.png before refining
    #[arg(short = 'e', long, default_value_t = false)]
    export_initial_weights: bool,

    /// Load the initial weights from <input-stem>_iw.png instead of
    /// computing them
    #[arg(short = 'l', long, default_value_t = false)]
    load_initial_weights: bool,

    /// Verbosity (repeatable); above 2 saves every debug plane
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    if args.inputs.len() < 2 {
        eprintln!("Usage: hdrmerge [options] image1 image2 [...]");
        eprintln!("Run with --help for the full option list.");
        process::exit(1);
    }

    let mode = args.mode.to_lowercase();
    if !matches!(mode.as_str(), "khan" | "avg" | "avg_slow") {
        eprintln!("Invalid mode: {}. Use 'khan', 'avg', or 'avg_slow'.", args.mode);
        process::exit(1);
    }

    let ignore_alpha = args.advanced.contains('i');
    let hdr_input = args.inputs.iter().any(|f| is_hdr_name(f));
    let exposures: Vec<Exposure> = args
        .inputs
        .iter()
        .map(|f| Exposure {
            photo: Rc::new(read_photo(f, ignore_alpha)),
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
            "Stack: {} exposures on a {}x{} canvas, mode {}",
            stack.layer_count(),
            stack.width(),
            stack.height(),
            mode
        );
    }

    // The plain averaging modes skip the whole weight machinery.
    if mode != "khan" {
        let fused = merge_average(&stack);
        save_output(&fused, &args.output);
        println!("Done.");
        return;
    }

    // Resolve the post-processing letters; winner-takes-all is exclusive.
    let mut use_bias = args.advanced.contains('b');
    let mut choose_best = args.advanced.contains('d');
    let winner = args.advanced.contains('c');
    if winner && use_bias {
        eprintln!("Warning: -a c overrides -a b");
        use_bias = false;
    }
    if winner && choose_best {
        eprintln!("Warning: -a c overrides -a d");
        choose_best = false;
    }
    let post_process = if winner {
        PostProcess::WinnerTakesAll
    } else if use_bias {
        PostProcess::Bias {
            power: DEFAULT_BIAS_POWER,
        }
    } else {
        PostProcess::None
    };

    let params = DeghostParams {
        iterations: args.iterations,
        favor_high_snr: args.advanced.contains('h'),
        choose_best,
        hdr_input,
        post_process,
        ..DeghostParams::default()
    };
    let deghoster = Deghoster::new(stack, params);

    let mut planes = deghoster.prepare().unwrap_or_else(|err| {
        eprintln!("Err: {err}");
        process::exit(1);
    });

    if args.export_initial_weights {
        for (input, plane) in args.inputs.iter().zip(&planes.initial_planes) {
            save_weight_plane(plane, &initial_weight_filename(input));
        }
    }
    if args.load_initial_weights {
        let loaded: Vec<GrayImage> = args
            .inputs
            .iter()
            .map(|input| read_weight_plane(&initial_weight_filename(input)))
            .collect();
        planes.initial = deghoster.stack().remap(&loaded).unwrap_or_else(|err| {
            eprintln!("Err: {err}");
            process::exit(1);
        });
        planes.weights = planes.initial.clone();
        planes.initial_planes = loaded;
    }

    let save_weights =
        args.save.contains('w') || args.save.contains('a') || args.verbose > 2;
    let save_results =
        args.save.contains('r') || args.save.contains('a') || args.verbose > 2;
    let debug_stem = output_stem(&args.output);

    // Drive the iterations by hand so intermediate planes can be saved.
    let refiner = deghoster.refiner();
    for iteration in 0..args.iterations {
        refiner.run_iteration(&planes.values, &mut planes.weights, &planes.initial);
        if save_weights {
            for (k, plane) in deghoster.stack().unmap(&planes.weights).iter().enumerate() {
                save_weight_plane(plane, &format!("{debug_stem}_w{iteration}_{k}.png"));
            }
        }
        if save_results {
            let weight_planes = deghoster.stack().unmap(&planes.weights);
            let fused = blend_weighted(deghoster.stack(), &weight_planes)
                .unwrap_or_else(|err| {
                    eprintln!("Err: {err}");
                    process::exit(1);
                });
            save_clamped(&fused, &format!("{debug_stem}_r{iteration}.png"));
        }
    }

    WeightPostProcessor { mode: post_process }.apply(&mut planes.weights);

    let weight_planes = deghoster.stack().unmap(&planes.weights);
    let fused = blend_weighted(deghoster.stack(), &weight_planes).unwrap_or_else(|err| {
        eprintln!("Err: {err}");
        process::exit(1);
    });
    save_output(&fused, &args.output);
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

fn initial_weight_filename(input: &str) -> String {
    let path = Path::new(input);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "weights".to_string());
    path.with_file_name(format!("{stem}_iw.png"))
        .to_string_lossy()
        .into_owned()
}

fn output_stem(output: &str) -> String {
    Path::new(output)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "merged".to_string())
}

pub fn read_photo(filename: &str, ignore_alpha: bool) -> Photo {
    println!("Reading image file: {filename}");
    let img = open(filename).expect("Could not load image");
    let width = img.width() as usize;
    let height = img.height() as usize;
    let alpha = if ignore_alpha || !img.color().has_alpha() {
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

pub fn read_weight_plane(filename: &str) -> GrayImage {
    println!("Reading image file: {filename}");
    let img = open(filename).expect("Could not load initial weights");
    let gray = img.to_luma8();
    GrayImage {
        data: gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect(),
        width: gray.width() as usize,
        height: gray.height() as usize,
    }
}

pub fn save_weight_plane(plane: &GrayImage, filename: &str) {
    println!("Writing image {filename}");
    let bytes: Vec<u8> = plane
        .data
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let img = image::GrayImage::from_raw(plane.width as u32, plane.height as u32, bytes).unwrap();
    img.save(filename).unwrap();
}

/// Writes the fused photo in the format implied by the file extension.
pub fn save_output(photo: &Photo, filename: &str) {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("hdr") => {
            println!("Writing image {filename}");
            let file = File::create(filename).expect("Could not create output file");
            let pixels: Vec<image::Rgb<f32>> = (0..photo.width * photo.height)
                .map(|i| {
                    image::Rgb([
                        photo.img_data[i * 3],
                        photo.img_data[i * 3 + 1],
                        photo.img_data[i * 3 + 2],
                    ])
                })
                .collect();
            image::codecs::hdr::HdrEncoder::new(BufWriter::new(file))
                .encode(&pixels, photo.width, photo.height)
                .expect("Failed to encode Radiance output");
        }
        Some("exr") => {
            println!("Writing image {filename}");
            let buf = image::Rgb32FImage::from_raw(
                photo.width as u32,
                photo.height as u32,
                photo.img_data.clone(),
            )
            .unwrap();
            image::DynamicImage::ImageRgb32F(buf)
                .save(filename)
                .expect("Failed to write OpenEXR output");
        }
        _ => save_clamped(photo, filename),
    }
}

pub fn save_clamped(photo: &Photo, filename: &str) {
    println!("Writing image {filename}");
    let bytes: Vec<u8> = photo
        .img_data
        .iter()
        .map(|v| v.clamp(0.0, 255.0).round() as u8)
        .collect();
    let img = image::RgbImage::from_raw(photo.width as u32, photo.height as u32, bytes).unwrap();
    img.save(filename).expect("Failed to write output image");
}
