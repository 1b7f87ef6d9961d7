use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::common::error::Result;
use crate::spectral_pipeline::cube::Raster;

/// Persists pipeline products. The format of 8-bit outputs follows the extension of `path`.
pub trait RasterWriter {
    fn write_gray(&self, image: &GrayImage, path: &Path, config: &PipelineConfig) -> Result<()>;
    fn write_rgb(&self, image: &RgbImage, path: &Path, config: &PipelineConfig) -> Result<()>;
    fn write_float_tiff(&self, raster: &Raster, path: &Path, config: &PipelineConfig) -> Result<()>;
}
