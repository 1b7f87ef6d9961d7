//! Reflectance standard spectrum.
//!
//! The standard (Spectralon) target is flat-field and dark-current corrected,
//! then averaged over the selected rectangle, giving one scalar per
//! wavelength. The spectrum is computed once per calibration set and shared,
//! read-only, by every object folder corrected against that set.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::{
    BandImageReader, CubeLoader, Raster, Region, band_path, detect_extension,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ReflectanceStandard {
    values: BTreeMap<u32, f64>,
}

impl ReflectanceStandard {
    pub fn from_values<I: IntoIterator<Item = (u32, f64)>>(values: I) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    pub fn value(&self, wavelength: u32) -> Option<f64> {
        self.values.get(&wavelength).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.values.iter().map(|(&wl, &v)| (wl, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Writes a `Wavelength,Value` CSV.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(["Wavelength", "Value"])?;
        for (wavelength, value) in self.iter() {
            writer.write_record([wavelength.to_string(), value.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)?;
        let mut values = BTreeMap::new();

        for record in reader.records() {
            let record = record?;
            let parse_err = || {
                PipelineError::InputReadError(format!(
                    "{}: malformed standard spectrum row {:?}",
                    path.display(),
                    record
                ))
            };
            let wavelength = record
                .get(0)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .ok_or_else(parse_err)?;
            let value = record
                .get(1)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .ok_or_else(parse_err)?;
            values.insert(wavelength, value);
        }

        Ok(Self { values })
    }
}

/// Corrected standard intensity of one pixel, `None` where the flat field vanishes.
pub fn standard_pixel(calibration: f32, dark: f32, flat: f32, epsilon: f32) -> Option<f32> {
    if flat.abs() < epsilon {
        return None;
    }
    Some((calibration - dark).max(0.0) / flat)
}

/// Mean corrected intensity over `region` for one wavelength.
///
/// Returns the mean and the number of pixels excluded for a vanishing flat field.
pub fn region_mean(
    calibration: &Raster,
    dark: &Raster,
    flat: &Raster,
    region: &Region,
    epsilon: f32,
) -> Option<(f64, usize)> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    let mut excluded = 0usize;

    let samples = calibration
        .region_values(region)
        .zip(dark.region_values(region))
        .zip(flat.region_values(region));
    for ((c, d), f) in samples {
        match standard_pixel(c, d, f, epsilon) {
            Some(v) => {
                sum += v as f64;
                count += 1;
            }
            None => excluded += 1,
        }
    }

    (count > 0).then(|| (sum / count as f64, excluded))
}

/// Reduces the selected rectangle of the standard cube to a spectrum.
pub struct StandardExtractor<'a, R: BandImageReader> {
    loader: &'a CubeLoader<R>,
    config: &'a PipelineConfig,
}

impl<'a, R: BandImageReader> StandardExtractor<'a, R> {
    pub fn new(loader: &'a CubeLoader<R>, config: &'a PipelineConfig) -> Self {
        Self { loader, config }
    }

    /// `standard_dir`, `dark_dir` and `flat_dir` are `Spectral_Cube` directories;
    /// `region` is in full-resolution pixels.
    #[instrument(skip_all, fields(standard = %standard_dir.display(), bands = wavelengths.len()))]
    pub fn extract(
        &self,
        standard_dir: &Path,
        dark_dir: &Path,
        flat_dir: &Path,
        region: Region,
        wavelengths: &[u32],
    ) -> Result<ReflectanceStandard> {
        let standard_format = detect_extension(standard_dir)?;
        let dark_format = detect_extension(dark_dir)?;
        let flat_format = detect_extension(flat_dir)?;

        self.loader.check_bands(standard_dir, wavelengths, standard_format)?;
        self.loader.check_bands(dark_dir, wavelengths, dark_format)?;
        self.loader.check_bands(flat_dir, wavelengths, flat_format)?;

        let epsilon = self.config.denominator_epsilon;
        let mut values = BTreeMap::new();

        for &wavelength in wavelengths {
            let calibration = self.loader.load_band(standard_dir, wavelength, standard_format)?;
            let dark = self.loader.load_band(dark_dir, wavelength, dark_format)?;
            let flat = self.loader.load_band(flat_dir, wavelength, flat_format)?;

            if self.config.validate_dimensions {
                calibration.ensure_same_size(&dark, &band_path(dark_dir, wavelength, dark_format))?;
                calibration.ensure_same_size(&flat, &band_path(flat_dir, wavelength, flat_format))?;
            }

            let clipped = region.clipped(calibration.width, calibration.height);
            if clipped.is_empty() {
                return Err(PipelineError::InvalidRegion(format!(
                    "{region:?} lies outside the {}x{} standard image",
                    calibration.width, calibration.height
                )));
            }

            let (mean, excluded) = region_mean(&calibration, &dark, &flat, &clipped, epsilon)
                .ok_or(PipelineError::DegenerateStandard { wavelength })?;
            if excluded > 0 {
                warn!(
                    wavelength,
                    excluded, "Flat-field pixels below epsilon excluded from standard mean"
                );
            }
            debug!(wavelength, mean, "Standard value");
            values.insert(wavelength, mean);
        }

        info!(bands = values.len(), "Reflectance standard spectrum ready");
        Ok(ReflectanceStandard { values })
    }
}
