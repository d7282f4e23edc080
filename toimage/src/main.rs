//! A CLI tool for converting a DICOM image file
//! into a general purpose image file (PNG or BMP).
use std::path::PathBuf;

use clap::Parser;
use dcmstack::{DicomPipeline, ImageFormat};
use snafu::{Report, ResultExt, Whatever};
use tracing::{error, Level};

/// Convert a DICOM file into an image
#[derive(Debug, Parser)]
struct App {
    /// Path to the DICOM file to convert
    file: PathBuf,

    /// Directory for the output artifacts
    /// (default is the current directory)
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Logical name of the output image
    /// (default is the input file stem)
    #[arg(short = 'n', long = "name")]
    name: Option<String>,

    /// Write a BMP file instead of PNG
    #[arg(long = "bmp")]
    bmp: bool,

    /// Print more information about the conversion
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let App {
        file,
        out_dir,
        name,
        bmp,
        verbose,
    } = App::parse();

    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")
    .unwrap_or_else(|e: Whatever| {
        eprintln!("[ERROR] {}", Report::from_error(e));
    });

    let name = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string())
    });

    let format = if bmp { ImageFormat::Bmp } else { ImageFormat::Png };

    let pipeline = DicomPipeline::with_cache_dir(&out_dir).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });

    let output = pipeline
        .convert_to_image(&file, &name, format)
        .unwrap_or_else(|e| {
            error!("{}", Report::from_error(e));
            std::process::exit(-2);
        });

    if verbose {
        println!("Image saved to {}", output.display());
    } else {
        println!("{}", output.display());
    }
}

#[cfg(test)]
mod tests {
    use crate::App;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        App::command().debug_assert();
    }
}
