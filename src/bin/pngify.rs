use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{error, info, warn};

/// Re-encode a GIF, JPEG or PNG image as PNG.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Image to read; the format is detected from its contents
    #[arg(long, default_value = "input.png")]
    input: PathBuf,

    /// Where to write the PNG
    #[arg(long, default_value = "crop_optimized.png")]
    output: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    // A missing input is reported but is not a failure.
    if let Err(err) = std::fs::metadata(&args.input) {
        if err.kind() == io::ErrorKind::NotFound {
            warn!("input file '{}' does not exist", args.input.display());
            return ExitCode::SUCCESS;
        }
    }

    info!(
        "converting '{}' to '{}'",
        args.input.display(),
        args.output.display()
    );
    match pngify::convert(&args.input, &args.output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", anyhow::Error::new(err));
            ExitCode::FAILURE
        }
    }
}
