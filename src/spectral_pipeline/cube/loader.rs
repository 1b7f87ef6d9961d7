use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::spectral_pipeline::common::config::OutputFormat;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::image_reader::ImageBandReader;
use crate::spectral_pipeline::cube::reader::BandImageReader;
use crate::spectral_pipeline::cube::types::{BandCube, Raster};

/// Path of the band image for `wavelength` inside a `Spectral_Cube` directory.
pub fn band_path(dir: &Path, wavelength: u32, format: OutputFormat) -> PathBuf {
    dir.join(format!("image{}.{}", wavelength, format.extension()))
}

/// Picks the band file format by majority among `image*.jpg` / `image*.png` files.
///
/// Ties resolve to JPEG.
pub fn detect_extension(dir: &Path) -> Result<OutputFormat> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingFolder(dir.to_path_buf()));
    }

    let mut jpg = 0usize;
    let mut png = 0usize;
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().to_ascii_lowercase();
        if !name.starts_with("image") {
            continue;
        }
        if name.ends_with(".jpg") {
            jpg += 1;
        } else if name.ends_with(".png") {
            png += 1;
        }
    }

    debug!(dir = %dir.display(), jpg, png, "Band file extension vote");

    match (jpg, png) {
        (0, 0) => Err(PipelineError::NoBandImages(dir.to_path_buf())),
        (j, p) if p > j => Ok(OutputFormat::Png),
        _ => Ok(OutputFormat::Jpeg),
    }
}

/// Wavelengths of every `image<nm>.<ext>` file in `dir`, ascending.
pub fn discover_wavelengths(dir: &Path, format: OutputFormat) -> Result<Vec<u32>> {
    let suffix = format!(".{}", format.extension());
    let mut wavelengths = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().to_ascii_lowercase();
        let Some(stem) = name
            .strip_prefix("image")
            .and_then(|rest| rest.strip_suffix(suffix.as_str()))
        else {
            continue;
        };
        if let Ok(wavelength) = stem.parse::<u32>() {
            wavelengths.push(wavelength);
        }
    }

    wavelengths.sort_unstable();
    wavelengths.dedup();
    Ok(wavelengths)
}

/// Loads band images from `Spectral_Cube` directories.
pub struct CubeLoader<R: BandImageReader> {
    reader: R,
}

impl CubeLoader<ImageBandReader> {
    pub fn new() -> Self {
        Self {
            reader: ImageBandReader,
        }
    }
}

impl Default for CubeLoader<ImageBandReader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BandImageReader> CubeLoader<R> {
    pub fn with_reader(reader: R) -> Self {
        Self { reader }
    }

    /// Fails with `MissingFile` for the first wavelength without a band file.
    pub fn check_bands(&self, dir: &Path, wavelengths: &[u32], format: OutputFormat) -> Result<()> {
        for &wavelength in wavelengths {
            let path = band_path(dir, wavelength, format);
            if !path.is_file() {
                return Err(PipelineError::MissingFile { wavelength, path });
            }
        }
        Ok(())
    }

    pub fn load_band(&self, dir: &Path, wavelength: u32, format: OutputFormat) -> Result<Raster> {
        let path = band_path(dir, wavelength, format);
        if !path.is_file() {
            return Err(PipelineError::MissingFile { wavelength, path });
        }
        self.reader.read_band(&path)
    }

    /// Loads every requested band of the cube in `dir`.
    ///
    /// The file format is detected first; all files are checked for presence
    /// before any is decoded, so a missing band fails fast.
    #[instrument(skip(self, wavelengths), fields(dir = %dir.display(), bands = wavelengths.len()))]
    pub fn load_cube(&self, dir: &Path, wavelengths: &[u32]) -> Result<BandCube> {
        let format = detect_extension(dir)?;
        info!(extension = format.extension(), "Image file extension detected");

        self.check_bands(dir, wavelengths, format)?;

        let mut cube = BandCube::new(dir, format);
        for &wavelength in wavelengths {
            let raster = self.load_band(dir, wavelength, format)?;
            cube.insert(wavelength, raster)?;
        }
        Ok(cube)
    }
}
