use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Expected band image not found: {} (wavelength {wavelength} nm)", path.display())]
    MissingFile { wavelength: u32, path: PathBuf },

    #[error("Folder not found: {}", .0.display())]
    MissingFolder(PathBuf),

    #[error("No image jpg/png files found in {}", .0.display())]
    NoBandImages(PathBuf),

    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode image {}: {message}", path.display())]
    DecodeError { path: PathBuf, message: String },

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error(
        "Dimension mismatch for {}: expected {}x{}, found {}x{}",
        path.display(), expected.0, expected.1, actual.0, actual.1
    )]
    DimensionMismatch {
        path: PathBuf,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Reflectance standard has no valid pixels at {wavelength} nm")]
    DegenerateStandard { wavelength: u32 },

    #[error("Region selection cancelled")]
    SelectionCancelled,

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
