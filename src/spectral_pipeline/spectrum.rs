//! Region-of-interest spectra
//!
//! A background rectangle is measured first; afterwards a pixel of a
//! measurement rectangle only counts at a wavelength when it is brighter than
//! `background mean + 7 SD` there. Because the object can shift slightly
//! between bands, sums are divided by a basal pixel count taken once from the
//! longest band rather than by each band's own count.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::spectral_pipeline::calibration::render_preview;
use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::conversions::ROI_DIR;
use crate::spectral_pipeline::cube::{
    BandCube, BandImageReader, CubeLoader, ImageBandReader, Region, detect_extension,
    discover_wavelengths,
};
use crate::spectral_pipeline::manifest::{resolve_folder, spectral_cube_dir};
use crate::spectral_pipeline::render::{RasterWriter, StandardImageWriter};

/// Background standard deviations a pixel must exceed to be counted
pub const BACKGROUND_SD_FACTOR: f64 = 7.0;

pub const MEANS_FILE: &str = "spectrum_means.csv";
pub const SD_FILE: &str = "spectrum_sd.csv";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandStats {
    pub mean: f64,
    pub sd: f64,
}

/// Per-wavelength statistics of one rectangle
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Spectrum {
    bands: BTreeMap<u32, BandStats>,
}

impl Spectrum {
    /// A background that excludes nothing: every band at 0 ± 0.
    pub fn zero<I: IntoIterator<Item = u32>>(wavelengths: I) -> Self {
        Self {
            bands: wavelengths
                .into_iter()
                .map(|wl| (wl, BandStats::default()))
                .collect(),
        }
    }

    pub fn get(&self, wavelength: u32) -> Option<BandStats> {
        self.bands.get(&wavelength).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, BandStats)> + '_ {
        self.bands.iter().map(|(&wl, &stats)| (wl, stats))
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Counting threshold at `wavelength` when `self` is the background.
    pub fn threshold(&self, wavelength: u32) -> f64 {
        self.get(wavelength)
            .map_or(0.0, |s| s.mean + BACKGROUND_SD_FACTOR * s.sd)
    }
}

/// Samples of `values` strictly above `threshold`: count, sum, population variance.
fn counted(values: impl Iterator<Item = f32>, threshold: f64) -> (usize, f64, f64) {
    let selected: Vec<f64> = values
        .map(|v| v as f64)
        .filter(|&v| v > threshold)
        .collect();
    let n = selected.len();
    if n == 0 {
        return (0, 0.0, 0.0);
    }
    let sum: f64 = selected.iter().sum();
    let mean = sum / n as f64;
    let var = selected.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (n, sum, var)
}

/// Measures `region` of `cube`.
///
/// Without a `background` every positive pixel counts and statistics are the
/// plain mean and SD. With one, pixels must exceed its threshold, and the
/// basal count comes from the longest band of the cube.
pub fn measure_region(cube: &BandCube, region: &Region, background: Option<&Spectrum>) -> Spectrum {
    let base = background.and_then(|bg| {
        let (wavelength, raster) = cube.iter().last()?;
        let (n, _, _) = counted(raster.region_values(region), bg.threshold(wavelength));
        (n > 0).then_some(n)
    });

    let bands = cube
        .iter()
        .map(|(wavelength, raster)| {
            let threshold = background.map_or(0.0, |bg| bg.threshold(wavelength));
            let (n, sum, var) = counted(raster.region_values(region), threshold);
            let stats = match (n, base) {
                (0, _) => BandStats::default(),
                (n, Some(base)) => BandStats {
                    mean: sum / base as f64,
                    sd: (var * n as f64 / base as f64).sqrt(),
                },
                (n, None) => BandStats {
                    mean: sum / n as f64,
                    sd: var.sqrt(),
                },
            };
            (wavelength, stats)
        })
        .collect();

    Spectrum { bands }
}

pub fn background_label(folder: &str) -> String {
    format!("{folder}|Background")
}

pub fn measurement_label(folder: &str, n: usize) -> String {
    format!("{folder}|Measurement_{n}")
}

/// Labelled spectra exported as a means sheet and an SD sheet
#[derive(Debug, Clone, Default)]
pub struct SpectrumTable {
    columns: Vec<(String, Spectrum)>,
}

impl SpectrumTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: impl Into<String>, spectrum: Spectrum) {
        self.columns.push((label.into(), spectrum));
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(label, _)| label.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn wavelengths(&self) -> BTreeSet<u32> {
        self.columns
            .iter()
            .flat_map(|(_, spectrum)| spectrum.bands.keys().copied())
            .collect()
    }

    fn write_sheet(&self, path: &Path, field: fn(&BandStats) -> f64) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;

        let mut header = vec!["Wavelength".to_string()];
        header.extend(self.labels().map(str::to_owned));
        writer.write_record(&header)?;

        for wavelength in self.wavelengths() {
            let mut row = vec![wavelength.to_string()];
            row.extend(self.columns.iter().map(|(_, spectrum)| {
                spectrum
                    .get(wavelength)
                    .map(|stats| field(&stats).to_string())
                    .unwrap_or_default()
            }));
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes `spectrum_means.csv` and `spectrum_sd.csv` into `dir`.
    pub fn write_csv(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .map_err(|e| PipelineError::OutputWriteError(format!("{}: {}", dir.display(), e)))?;
        let means = dir.join(MEANS_FILE);
        let sds = dir.join(SD_FILE);
        self.write_sheet(&means, |s| s.mean)?;
        self.write_sheet(&sds, |s| s.sd)?;
        Ok((means, sds))
    }
}

/// How the background of a folder is established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundMode {
    /// Measure this rectangle (full-resolution pixels)
    Region(Region),
    /// Count every positive pixel
    None,
}

/// Measures folders into a [`SpectrumTable`] and keeps ROI previews.
pub struct SpectrumPipeline<R: BandImageReader, W: RasterWriter> {
    loader: CubeLoader<R>,
    writer: W,
    config: PipelineConfig,
}

impl SpectrumPipeline<ImageBandReader, StandardImageWriter> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_custom(ImageBandReader, StandardImageWriter, config)
    }
}

impl<R: BandImageReader, W: RasterWriter> SpectrumPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig) -> Self {
        Self {
            loader: CubeLoader::with_reader(reader),
            writer,
            config,
        }
    }

    /// Loads every band present in the sample's cube, corrected form preferred.
    pub fn load_sample(&self, root: &Path, name: &str) -> Result<(String, BandCube)> {
        let folder = resolve_folder(root, name)
            .ok_or_else(|| PipelineError::MissingFolder(root.join(name)))?;
        let label = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        let cube_dir = spectral_cube_dir(&folder);
        let wavelengths = discover_wavelengths(&cube_dir, detect_extension(&cube_dir)?)?;
        let cube = self.loader.load_cube(&cube_dir, &wavelengths)?;
        Ok((label, cube))
    }

    fn write_preview(&self, root: &Path, cube: &BandCube, region: &Region, file: &str) -> Result<()> {
        let Some((_, band)) = cube.iter().last() else {
            return Ok(());
        };
        let scale = self.config.viewport.scale_for(band.width, band.height);
        let display = Region::new(
            (region.x0 as f64 * scale) as usize,
            (region.y0 as f64 * scale) as usize,
            (region.x1 as f64 * scale) as usize,
            (region.y1 as f64 * scale) as usize,
        );
        let preview = render_preview(band, scale, Some(display));
        let path = root
            .join(ROI_DIR)
            .join(format!("{file}.{}", cube.format().extension()));
        self.writer.write_rgb(&preview, &path, &self.config)
    }

    /// Measures the background and every rectangle of `regions` for one sample
    /// and appends the columns to `table`.
    #[instrument(skip(self, root, regions, table), fields(regions = regions.len()))]
    pub fn measure_folder(
        &self,
        root: &Path,
        name: &str,
        background: BackgroundMode,
        regions: &[Region],
        table: &mut SpectrumTable,
    ) -> Result<()> {
        let (label, cube) = self.load_sample(root, name)?;

        let background = match background {
            BackgroundMode::Region(region) => {
                let spectrum = measure_region(&cube, &region, None);
                self.write_preview(root, &cube, &region, &format!("{label}_Background"))?;
                spectrum
            }
            BackgroundMode::None => {
                info!("No background will be subtracted");
                Spectrum::zero(cube.wavelengths())
            }
        };
        table.push(background_label(&label), background.clone());

        if regions.is_empty() {
            warn!(folder = %label, "No measurement rectangle given");
        }
        for (j, region) in regions.iter().enumerate() {
            let spectrum = measure_region(&cube, region, Some(&background));
            self.write_preview(root, &cube, region, &format!("{label}_Measurement_{j}"))?;
            table.push(measurement_label(&label, j + 1), spectrum);
        }

        info!(folder = %label, measurements = regions.len(), "Spectra measured");
        Ok(())
    }
}
