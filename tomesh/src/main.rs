//! A CLI tool for reconstructing a triangulated isosurface
//! from a directory of DICOM slices.
use std::path::PathBuf;

use clap::Parser;
use dcmstack::DicomPipeline;
use snafu::{Report, ResultExt, Whatever};
use tracing::{error, Level};

/// Reconstruct a 3D surface mesh from a DICOM series directory
#[derive(Debug, Parser)]
struct App {
    /// Path to the directory holding the DICOM slices
    dir: PathBuf,

    /// Intensity threshold of the isosurface
    /// (typically a Hounsfield unit for CT data)
    #[arg(short = 't', long = "threshold")]
    threshold: f64,

    /// Directory for the output artifacts
    /// (default is the current directory)
    #[arg(short = 'o', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// Logical name of the output model
    /// (default is the directory name)
    #[arg(short = 'n', long = "name")]
    name: Option<String>,

    /// Also export the assembled volume raster next to the mesh
    #[arg(long = "export-volume")]
    export_volume: bool,

    /// Print more information about the reconstruction
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() {
    let App {
        dir,
        threshold,
        out_dir,
        name,
        export_volume,
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
        dir.file_name()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "surface".to_string())
    });

    let mut pipeline = DicomPipeline::with_cache_dir(&out_dir).unwrap_or_else(|e| {
        error!("{}", Report::from_error(e));
        std::process::exit(-1);
    });

    let output = pipeline
        .reconstruct_surface(&dir, &name, threshold)
        .unwrap_or_else(|e| {
            error!("{}", Report::from_error(e));
            std::process::exit(-2);
        });

    if verbose {
        println!("Model saved to {}", output.display());
    } else {
        println!("{}", output.display());
    }

    if export_volume {
        let volume = pipeline.export_volume(&name).unwrap_or_else(|e| {
            error!("{}", Report::from_error(e));
            std::process::exit(-3);
        });
        if verbose {
            println!("Volume saved to {}", volume.display());
        } else {
            println!("{}", volume.display());
        }
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
