use std::path::Path;

use crate::spectral_pipeline::common::error::Result;
use crate::spectral_pipeline::cube::types::Raster;

pub trait BandImageReader {
    fn read_band(&self, path: &Path) -> Result<Raster>;
}
