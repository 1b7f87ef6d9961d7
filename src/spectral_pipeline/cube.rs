//! Band cube module
//!
//! This module covers the on-disk band cube layout: the fixed band catalogue,
//! single-channel rasters, file-extension detection and band loading.

mod image_reader;
mod loader;
mod reader;
pub mod types;

pub use image_reader::ImageBandReader;
pub use loader::{CubeLoader, band_path, detect_extension, discover_wavelengths};
pub use reader::BandImageReader;
pub use types::{
    ALL_WAVELENGTHS, BandCube, LONGEST_WAVELENGTH, Raster, Region, SPECTRAL_CUBE_DIR,
    UV_WAVELENGTH,
};
