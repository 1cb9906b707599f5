use std::env;
use std::path::PathBuf;

use flexi_logger::Logger;
use log::{error, info};
use membranequant::{self, file_data, QuantConfig};

const USE_MESSAGE : &str = "\x1b[31mUsage: quantify_membrane <image> <roi.txt>\
    [-c <config.json>] [-s <sigma>] [-o <output_dir>] [-n <iterations>] [-p]\x1b[0m";

macro_rules! send_use_msg {
    () => {{
        eprintln!("{}", USE_MESSAGE);
        std::process::exit(2)
    }};
}

/// Quantifies membrane signal along the ROI in `roi.txt`
///
/// The image is read as a TIFF if it ends in `.tif`/`.tiff`,
/// otherwise as a whitespace-delimited table. Parameters come from
/// `-c` if given, otherwise the defaults; `-s`, `-n` and `-p` (parallel)
/// override them. Results are written to `-o` if given.
///
/// Log level follows `RUST_LOG`, `info` by default.
///
/// # Example
///
/// ```
/// quantify_membrane cell.tif cortex.txt -s 2.0 -n 3 -p -o results
/// ```
fn main() {
    let _logger = Logger::try_with_env_or_str("info")
        .and_then(|logger| logger.log_to_stderr().start())
        .unwrap_or_else(|e| panic!("Logger initialization failed with {}", e));

    let args : Vec<String> = env::args().collect();
    if args.len() < 3 {send_use_msg!();}
    let image_path = &args[1];
    let roi_path = &args[2];

    let mut config_path = None;
    let mut sigma = None;
    let mut save_path = None;
    let mut iterations = None;
    let mut parallel = false;

    let mut rest = args.iter().skip(3);
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "-c" => {
                config_path = Some(rest.next().unwrap_or_else(|| send_use_msg!()));
            },
            "-s" => {
                let value = rest.next().unwrap_or_else(|| send_use_msg!());
                sigma = Some(value.parse::<f64>().unwrap_or_else(|_| send_use_msg!()));
            },
            "-o" => {
                save_path = Some(PathBuf::from(rest.next().unwrap_or_else(|| send_use_msg!())));
            },
            "-n" => {
                let value = rest.next().unwrap_or_else(|| send_use_msg!());
                iterations = Some(value.parse::<usize>().unwrap_or_else(|_| send_use_msg!()));
            },
            "-p" => {
                parallel = true;
            },
            _ => send_use_msg!(),
        }
    }

    if let Err(e) = run(image_path, roi_path, config_path, sigma, save_path, iterations, parallel) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(
    image_path : &str,
    roi_path : &str,
    config_path : Option<&String>,
    sigma : Option<f64>,
    save_path : Option<PathBuf>,
    iterations : Option<usize>,
    parallel : bool,
) -> Result<(), membranequant::QuantError> {
    let mut config = match config_path {
        Some(path) => QuantConfig::from_json_file(path)?,
        None => QuantConfig::default(),
    };
    if sigma.is_some() {
        config.sigma = sigma;
    }
    if save_path.is_some() {
        config.save_path = save_path;
    }
    if let Some(iterations) = iterations {
        config.iterations = iterations;
    }
    config.parallel |= parallel;

    let img = file_data::load_image(image_path)?;
    let roi = file_data::tables::read_table(roi_path)?;
    info!("Loaded {}x{} image and {} ROI points", img.nrows(), img.ncols(), roi.nrows());

    let quant = membranequant::quantify(img, roi, config)?;

    let mean = |values : &ndarray::Array1<f64>| values.mean().unwrap_or(f64::NAN);
    info!(
        "Mean offset {:.4}, cytoplasm {:.4}, membrane {:.4}",
        mean(quant.offsets()), mean(quant.cyts()), mean(quant.mems())
    );
    if quant.config().periodic {
        info!("Asymmetry index {:.4}", quant.asymmetry(0.33)?);
    }
    Ok(())
}
