//! Band reader implementation using the image library.
//!
//! Band files are 8-bit (or 16-bit) grayscale JPEG/PNG captures. Colour files
//! are reduced to luma, 16-bit files are reduced to 8 bits, so every band is
//! read on the same 0..=255 intensity scale.

use std::path::Path;

use tracing::debug;

use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::reader::BandImageReader;
use crate::spectral_pipeline::cube::types::Raster;

pub struct ImageBandReader;

impl BandImageReader for ImageBandReader {
    fn read_band(&self, path: &Path) -> Result<Raster> {
        let decoded = image::ImageReader::open(path)
            .map_err(|e| PipelineError::InputReadError(format!("{}: {}", path.display(), e)))?
            .with_guessed_format()
            .map_err(|e| PipelineError::InputReadError(format!("{}: {}", path.display(), e)))?
            .decode()
            .map_err(|e| PipelineError::DecodeError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let gray = decoded.into_luma8();
        debug!(
            path = %path.display(),
            width = gray.width(),
            height = gray.height(),
            "Decoded band"
        );

        Ok(Raster::from_gray(&gray))
    }
}
