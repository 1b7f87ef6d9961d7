use tracing::{debug, instrument};

use crate::spectral_pipeline::common::error::Result;
use crate::spectral_pipeline::cube::{BandCube, Raster};
use crate::spectral_pipeline::indices::catalogue::{
    CATALOGUE, Pixel, REQUIRED_WAVELENGTHS, SpectralIndex,
};

/// One computed index
#[derive(Debug, Clone)]
pub struct IndexRaster {
    pub name: &'static str,
    pub fixed_range: Option<(f32, f32)>,
    pub raster: Raster,
}

/// Evaluates a table of indices over a cube in a single pass.
pub struct IndexEngine {
    indices: &'static [SpectralIndex],
}

impl IndexEngine {
    /// Engine over the full catalogue.
    pub fn new() -> Self {
        Self {
            indices: &CATALOGUE,
        }
    }

    pub fn with_indices(indices: &'static [SpectralIndex]) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &'static [SpectralIndex] {
        self.indices
    }

    pub fn required_wavelengths(&self) -> &'static [u32] {
        &REQUIRED_WAVELENGTHS
    }

    /// Computes every index of the table from `cube`.
    ///
    /// Each band is read once per pixel and shared by all formulas; a missing
    /// required band fails with `MissingFile` before any work is done.
    #[instrument(skip_all, fields(cube = %cube.folder().display(), indices = self.indices.len()))]
    pub fn compute_all(&self, cube: &BandCube) -> Result<Vec<IndexRaster>> {
        let bands: Vec<&Raster> = REQUIRED_WAVELENGTHS
            .iter()
            .map(|&wavelength| cube.band(wavelength))
            .collect::<Result<_>>()?;

        let (width, height) = bands[0].dimensions();
        let len = width * height;
        let mut outputs: Vec<Vec<f32>> = self
            .indices
            .iter()
            .map(|_| Vec::with_capacity(len))
            .collect();

        let mut pixel = Pixel::new([0.0; REQUIRED_WAVELENGTHS.len()]);
        for i in 0..len {
            for (slot, band) in pixel.values_mut().iter_mut().zip(&bands) {
                *slot = band.data[i];
            }
            for (output, index) in outputs.iter_mut().zip(self.indices) {
                output.push(index.evaluate(&pixel));
            }
        }

        let rasters = self
            .indices
            .iter()
            .zip(outputs)
            .map(|(index, data)| {
                debug!(index = index.name, "Index computed");
                IndexRaster {
                    name: index.name,
                    fixed_range: index.fixed_range,
                    raster: Raster {
                        width,
                        height,
                        data,
                    },
                }
            })
            .collect();
        Ok(rasters)
    }
}

impl Default for IndexEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral_pipeline::common::config::OutputFormat;
    use crate::spectral_pipeline::common::error::PipelineError;
    use approx::assert_relative_eq;

    fn uniform_cube(value: f32) -> BandCube {
        let mut cube = BandCube::new("Corrected_Leaf/Spectral_Cube", OutputFormat::Jpeg);
        for &wavelength in &REQUIRED_WAVELENGTHS {
            cube.insert(wavelength, Raster::filled(3, 2, value)).unwrap();
        }
        cube
    }

    #[test]
    fn test_computes_whole_catalogue() {
        let results = IndexEngine::new().compute_all(&uniform_cube(100.0)).unwrap();

        assert_eq!(results.len(), CATALOGUE.len());
        for result in &results {
            assert_eq!(result.raster.dimensions(), (3, 2));
        }
        let gm1 = results.iter().find(|r| r.name == "GM1").unwrap();
        assert_relative_eq!(gm1.raster.data[0], 1.0, epsilon = 1e-5);
        let ndvi = results.iter().find(|r| r.name == "NDVI").unwrap();
        assert_eq!(ndvi.fixed_range, Some((-1.0, 1.0)));
        assert_relative_eq!(ndvi.raster.data[5], 0.0);
    }

    #[test]
    fn test_per_pixel_values() {
        let mut cube = uniform_cube(50.0);
        let mut nir = Raster::filled(3, 2, 50.0);
        nir.data[4] = 200.0;
        cube.insert(800, nir).unwrap();

        let results = IndexEngine::new().compute_all(&cube).unwrap();
        let ndvi = results.iter().find(|r| r.name == "NDVI").unwrap();
        assert_relative_eq!(ndvi.raster.data[4], 150.0 / 250.0, epsilon = 1e-5);
        assert_relative_eq!(ndvi.raster.data[0], 0.0);
    }

    #[test]
    fn test_missing_band_fails() {
        let mut cube = BandCube::new("Leaf/Spectral_Cube", OutputFormat::Png);
        cube.insert(420, Raster::filled(2, 2, 1.0)).unwrap();

        let err = IndexEngine::new().compute_all(&cube).unwrap_err();
        match err {
            PipelineError::MissingFile { wavelength, .. } => assert_eq!(wavelength, 430),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_subset_engine() {
        let engine = IndexEngine::with_indices(&CATALOGUE[10..11]);
        let results = engine.compute_all(&uniform_cube(10.0)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "NDVI");
    }
}
