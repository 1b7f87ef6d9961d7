//! Band cube data types

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::spectral_pipeline::common::config::OutputFormat;
use crate::spectral_pipeline::common::error::{PipelineError, Result};

/// Subfolder of every sample folder holding one image per wavelength
pub const SPECTRAL_CUBE_DIR: &str = "Spectral_Cube";

/// The single ultraviolet band captured below the visible sweep
pub const UV_WAVELENGTH: u32 = 365;

/// Band used for display and as the basal pixel count reference
pub const LONGEST_WAVELENGTH: u32 = 1000;

const SWEEP_START: u32 = 400;
const SWEEP_STEP: u32 = 5;
const BAND_COUNT: usize = 1 + ((LONGEST_WAVELENGTH - SWEEP_START) / SWEEP_STEP) as usize + 1;

/// Every band the camera produces, ascending: 365 nm then 400..=1000 nm in 5 nm steps
pub const ALL_WAVELENGTHS: [u32; BAND_COUNT] = build_catalogue();

const fn build_catalogue() -> [u32; BAND_COUNT] {
    let mut out = [0u32; BAND_COUNT];
    out[0] = UV_WAVELENGTH;
    let mut i = 1;
    while i < BAND_COUNT {
        out[i] = SWEEP_START + SWEEP_STEP * (i as u32 - 1);
        i += 1;
    }
    out
}

/// A single-channel raster of intensity samples, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    /// Width of the raster in pixels
    pub width: usize,
    /// Height of the raster in pixels
    pub height: usize,
    /// Pixel values, `width * height` long
    pub data: Vec<f32>,
}

impl Raster {
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(PipelineError::InvalidDimensions(width, height));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.as_raw().iter().map(|&v| v as f32).collect(),
        }
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Fails with `DimensionMismatch` unless `other` has the same size.
    pub fn ensure_same_size(&self, other: &Raster, other_path: &Path) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(PipelineError::DimensionMismatch {
                path: other_path.to_path_buf(),
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        Ok(())
    }

    /// Iterates over the samples inside `region`, clipped to the raster.
    pub fn region_values<'a>(&'a self, region: &Region) -> impl Iterator<Item = f32> + 'a {
        let clipped = region.clipped(self.width, self.height);
        (clipped.y0..clipped.y1).flat_map(move |y| {
            let row = y * self.width;
            self.data[row + clipped.x0..row + clipped.x1].iter().copied()
        })
    }

    /// Finite minimum and maximum, or `None` when no sample is finite.
    pub fn finite_min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Axis-aligned pixel rectangle, half-open: `x0..x1`, `y0..y1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl Region {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Intersection with a `width`x`height` raster.
    pub fn clipped(&self, width: usize, height: usize) -> Region {
        let x1 = self.x1.min(width);
        let y1 = self.y1.min(height);
        Region {
            x0: self.x0.min(x1),
            y0: self.y0.min(y1),
            x1,
            y1,
        }
    }
}

/// Bands of one capture keyed by wavelength, all of one size
#[derive(Debug, Clone)]
pub struct BandCube {
    folder: PathBuf,
    format: OutputFormat,
    bands: BTreeMap<u32, Raster>,
}

impl BandCube {
    /// `folder` is the `Spectral_Cube` directory the bands came from.
    pub fn new(folder: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            folder: folder.into(),
            format,
            bands: BTreeMap::new(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn insert(&mut self, wavelength: u32, raster: Raster) -> Result<()> {
        if let Some(first) = self.bands.values().next() {
            let path = self.band_path(wavelength);
            first.ensure_same_size(&raster, &path)?;
        }
        self.bands.insert(wavelength, raster);
        Ok(())
    }

    /// Band at `wavelength`, or `MissingFile` naming where it was expected.
    pub fn band(&self, wavelength: u32) -> Result<&Raster> {
        self.bands
            .get(&wavelength)
            .ok_or_else(|| PipelineError::MissingFile {
                wavelength,
                path: self.band_path(wavelength),
            })
    }

    pub fn wavelengths(&self) -> impl Iterator<Item = u32> + '_ {
        self.bands.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Raster)> {
        self.bands.iter().map(|(&wl, raster)| (wl, raster))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Shared `(width, height)` of the bands, if any are loaded.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        self.bands.values().next().map(Raster::dimensions)
    }

    fn band_path(&self, wavelength: u32) -> PathBuf {
        crate::spectral_pipeline::cube::band_path(&self.folder, wavelength, self.format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_layout() {
        assert_eq!(ALL_WAVELENGTHS.len(), 122);
        assert_eq!(ALL_WAVELENGTHS[0], 365);
        assert_eq!(ALL_WAVELENGTHS[1], 400);
        assert_eq!(ALL_WAVELENGTHS[121], 1000);
        assert!(ALL_WAVELENGTHS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_region_values_are_clipped() {
        let raster = Raster::from_vec(3, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let values: Vec<f32> = raster.region_values(&Region::new(1, 0, 10, 10)).collect();
        assert_eq!(values, vec![2.0, 3.0, 5.0, 6.0]);
    }

    #[test]
    fn test_region_outside_raster_is_empty() {
        let region = Region::new(5, 5, 8, 8).clipped(3, 3);
        assert!(region.is_empty());
    }

    #[test]
    fn test_cube_rejects_mismatched_band() {
        let mut cube = BandCube::new("cube", OutputFormat::Png);
        cube.insert(400, Raster::new(4, 4)).unwrap();
        let err = cube.insert(405, Raster::new(4, 5)).unwrap_err();
        assert!(matches!(err, PipelineError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_cube_missing_band_names_path() {
        let cube = BandCube::new("sample/Spectral_Cube", OutputFormat::Jpeg);
        match cube.band(550) {
            Err(PipelineError::MissingFile { wavelength, path }) => {
                assert_eq!(wavelength, 550);
                assert_eq!(path, PathBuf::from("sample/Spectral_Cube/image550.jpg"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_finite_min_max_skips_nan() {
        let raster = Raster::from_vec(3, 1, vec![f32::NAN, -2.0, 7.0]).unwrap();
        assert_eq!(raster.finite_min_max(), Some((-2.0, 7.0)));
        assert_eq!(Raster::filled(2, 2, f32::INFINITY).finite_min_max(), None);
    }
}
