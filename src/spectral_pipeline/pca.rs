//! Principal component analysis of a band cube
//!
//! Pixels are treated as observations and bands as variables. The covariance
//! matrix of the downscaled cube is diagonalized with cyclic Jacobi rotations,
//! the leading components are stretched to 8 bits, and consecutive component
//! triples are combined into false-colour composites.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use tracing::{debug, info, instrument};

use crate::spectral_pipeline::calibration::raster_to_gray;
use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::cube::{
    BandImageReader, CubeLoader, ImageBandReader, Raster, detect_extension, discover_wavelengths,
};
use crate::spectral_pipeline::manifest::spectral_cube_dir;
use crate::spectral_pipeline::render::{RasterWriter, StandardImageWriter};

/// Output folder inside the sample folder
pub const PCA_OUTPUT_DIR: &str = "PCA-Out";

const JACOBI_TOLERANCE: f64 = 1e-12;
const MAX_SWEEPS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PcaParams {
    /// Factor applied to both image sides before the analysis
    pub scale: f64,
    /// Number of leading components kept
    pub components: usize,
}

impl Default for PcaParams {
    fn default() -> Self {
        Self {
            scale: 0.5,
            components: 10,
        }
    }
}

#[derive(Debug)]
pub struct PcaResult {
    /// Component scores, strongest first
    pub components: Vec<Raster>,
    /// Variance along each kept component
    pub eigenvalues: Vec<f64>,
    /// Share of the total variance explained by each kept component
    pub variance_explained: Vec<f64>,
}

/// Eigenvalues and eigenvectors (as columns) of a symmetric matrix.
pub fn jacobi_eigen(matrix: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = matrix.len();
    let mut a = matrix.to_vec();
    let mut v = vec![vec![0.0; n]; n];
    for (i, row) in v.iter_mut().enumerate() {
        row[i] = 1.0;
    }

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum();
        if off < JACOBI_TOLERANCE {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[p][q];
                if apq.abs() < JACOBI_TOLERANCE {
                    continue;
                }
                let (app, aqq) = (a[p][p], a[q][q]);
                let theta = if (app - aqq).abs() < JACOBI_TOLERANCE {
                    std::f64::consts::FRAC_PI_4
                } else {
                    0.5 * (2.0 * apq / (app - aqq)).atan()
                };
                let (sin_t, cos_t) = theta.sin_cos();

                for i in 0..n {
                    if i == p || i == q {
                        continue;
                    }
                    let (aip, aiq) = (a[i][p], a[i][q]);
                    a[i][p] = cos_t * aip + sin_t * aiq;
                    a[p][i] = a[i][p];
                    a[i][q] = -sin_t * aip + cos_t * aiq;
                    a[q][i] = a[i][q];
                }
                a[p][p] = cos_t * cos_t * app + 2.0 * sin_t * cos_t * apq + sin_t * sin_t * aqq;
                a[q][q] = sin_t * sin_t * app - 2.0 * sin_t * cos_t * apq + cos_t * cos_t * aqq;
                a[p][q] = 0.0;
                a[q][p] = 0.0;

                for row in v.iter_mut() {
                    let (vip, viq) = (row[p], row[q]);
                    row[p] = cos_t * vip + sin_t * viq;
                    row[q] = -sin_t * vip + cos_t * viq;
                }
            }
        }
    }

    ((0..n).map(|i| a[i][i]).collect(), v)
}

/// Projects every pixel of `bands` onto the `n_components` strongest axes.
pub fn principal_components(bands: &[Raster], n_components: usize) -> Result<PcaResult> {
    let first = bands
        .first()
        .ok_or_else(|| PipelineError::Analysis("PCA requires at least one band".into()))?;
    let (width, height) = first.dimensions();
    if let Some(band) = bands.iter().find(|b| b.dimensions() != (width, height)) {
        return Err(PipelineError::Analysis(format!(
            "band size {}x{} differs from {}x{}",
            band.width, band.height, width, height
        )));
    }

    let n_bands = bands.len();
    let n_pixels = width * height;
    if n_pixels == 0 {
        return Err(PipelineError::InvalidDimensions(width, height));
    }

    let means: Vec<f64> = bands
        .iter()
        .map(|b| b.data.iter().map(|&v| v as f64).sum::<f64>() / n_pixels as f64)
        .collect();

    let mut cov = vec![vec![0.0; n_bands]; n_bands];
    let mut centred = vec![0.0; n_bands];
    for px in 0..n_pixels {
        for (b, band) in bands.iter().enumerate() {
            centred[b] = band.data[px] as f64 - means[b];
        }
        for i in 0..n_bands {
            for j in i..n_bands {
                cov[i][j] += centred[i] * centred[j];
            }
        }
    }
    let denominator = (n_pixels - 1).max(1) as f64;
    for i in 0..n_bands {
        for j in i..n_bands {
            cov[i][j] /= denominator;
            cov[j][i] = cov[i][j];
        }
    }

    let (eigenvalues, eigenvectors) = jacobi_eigen(&cov);
    let mut order: Vec<usize> = (0..n_bands).collect();
    order.sort_by(|&a, &b| eigenvalues[b].total_cmp(&eigenvalues[a]));

    let kept = n_components.min(n_bands);
    let total: f64 = eigenvalues.iter().sum();

    let components = order[..kept]
        .iter()
        .map(|&axis| {
            let data = (0..n_pixels)
                .map(|px| {
                    bands
                        .iter()
                        .enumerate()
                        .map(|(b, band)| (band.data[px] as f64 - means[b]) * eigenvectors[b][axis])
                        .sum::<f64>() as f32
                })
                .collect();
            Raster {
                width,
                height,
                data,
            }
        })
        .collect();

    let kept_eigenvalues: Vec<f64> = order[..kept].iter().map(|&i| eigenvalues[i]).collect();
    let variance_explained = kept_eigenvalues
        .iter()
        .map(|ev| if total > 0.0 { ev / total } else { 0.0 })
        .collect();

    Ok(PcaResult {
        components,
        eigenvalues: kept_eigenvalues,
        variance_explained,
    })
}

/// Min-max stretch to 0..=255; a flat component gives a black image.
pub fn stretch_to_u8(raster: &Raster) -> GrayImage {
    let (width, height) = (raster.width as u32, raster.height as u32);
    let Some((min, max)) = raster.finite_min_max() else {
        return GrayImage::new(width, height);
    };
    let span = max - min;
    if span <= 0.0 {
        return GrayImage::new(width, height);
    }
    let pixels = raster
        .data
        .iter()
        .map(|&v| {
            if v.is_finite() {
                (255.0 * (v - min) / span).round().clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect();
    GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height))
}

/// Composites of consecutive component triples: red, green, blue = PC k, k+1, k+2.
///
/// Component numbers are 1-based, as in the output file names.
pub fn composites(components: &[GrayImage]) -> Vec<((usize, usize, usize), RgbImage)> {
    components
        .windows(3)
        .enumerate()
        .map(|(start, triple)| {
            let (r, g, b) = (&triple[0], &triple[1], &triple[2]);
            let image = RgbImage::from_fn(r.width(), r.height(), |x, y| {
                Rgb([
                    r.get_pixel(x, y)[0],
                    g.get_pixel(x, y)[0],
                    b.get_pixel(x, y)[0],
                ])
            });
            ((start + 1, start + 2, start + 3), image)
        })
        .collect()
}

fn downscale(raster: &Raster, scale: f64) -> Raster {
    if (scale - 1.0).abs() < f64::EPSILON {
        return raster.clone();
    }
    let width = ((raster.width as f64 * scale) as u32).max(1);
    let height = ((raster.height as f64 * scale) as u32).max(1);
    Raster::from_gray(&imageops::resize(
        &raster_to_gray(raster),
        width,
        height,
        FilterType::Triangle,
    ))
}

/// Runs the analysis on a sample folder and writes its images to `PCA-Out`.
pub struct PcaPipeline<R: BandImageReader, W: RasterWriter> {
    loader: CubeLoader<R>,
    writer: W,
    config: PipelineConfig,
    params: PcaParams,
}

impl PcaPipeline<ImageBandReader, StandardImageWriter> {
    pub fn new(config: PipelineConfig, params: PcaParams) -> Self {
        Self::with_custom(ImageBandReader, StandardImageWriter, config, params)
    }
}

impl<R: BandImageReader, W: RasterWriter> PcaPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig, params: PcaParams) -> Self {
        Self {
            loader: CubeLoader::with_reader(reader),
            writer,
            config,
            params,
        }
    }

    /// Analyses every band found in `<folder>/Spectral_Cube`; returns the written paths.
    #[instrument(skip(self), fields(folder = %folder.display()))]
    pub fn run(&self, folder: &Path) -> Result<Vec<PathBuf>> {
        let cube_dir = spectral_cube_dir(folder);
        let format = detect_extension(&cube_dir)?;
        let wavelengths = discover_wavelengths(&cube_dir, format)?;

        let bands = {
            let _span = tracing::info_span!("load_bands", bands = wavelengths.len()).entered();
            wavelengths
                .iter()
                .map(|&wl| {
                    let band = self.loader.load_band(&cube_dir, wl, format)?;
                    Ok(downscale(&band, self.params.scale))
                })
                .collect::<Result<Vec<_>>>()?
        };

        let result = {
            let _span = tracing::info_span!("principal_components").entered();
            principal_components(&bands, self.params.components)?
        };
        for (k, share) in result.variance_explained.iter().enumerate() {
            debug!(component = k + 1, share, "Variance explained");
        }

        let out_dir = folder.join(PCA_OUTPUT_DIR);
        let mut written = Vec::new();

        let images: Vec<GrayImage> = result.components.iter().map(stretch_to_u8).collect();
        for (k, image) in images.iter().enumerate() {
            let path = out_dir.join(format!("Image_PC{}.jpg", k + 1));
            self.writer.write_gray(image, &path, &self.config)?;
            written.push(path);
        }

        for ((r, g, b), image) in composites(&images) {
            let path = out_dir.join(format!("RGB-ImagePC_{r}-{g}-{b}.jpg"));
            self.writer.write_rgb(&image, &path, &self.config)?;
            written.push(path);
        }

        info!(
            bands = bands.len(),
            components = images.len(),
            files = written.len(),
            "PCA complete"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn gradient(width: usize, height: usize, base: f32, step: f32) -> Raster {
        let data = (0..width * height).map(|i| base + i as f32 * step).collect();
        Raster::from_vec(width, height, data).unwrap()
    }

    #[test]
    fn test_jacobi_diagonalizes() {
        let matrix = vec![vec![4.0, 1.0], vec![1.0, 3.0]];
        let (mut values, vectors) = jacobi_eigen(&matrix);
        values.sort_by(f64::total_cmp);

        let disc = (1.25f64).sqrt();
        assert_relative_eq!(values[0], 3.5 - disc, epsilon = 1e-9);
        assert_relative_eq!(values[1], 3.5 + disc, epsilon = 1e-9);
        for col in 0..2 {
            let norm: f64 = vectors.iter().map(|row| row[col] * row[col]).sum();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_correlated_bands_load_first_component() {
        let bands = vec![gradient(10, 10, 0.0, 1.0), gradient(10, 10, 0.0, 2.0)];
        let result = principal_components(&bands, 10).unwrap();

        assert_eq!(result.components.len(), 2);
        assert!(result.variance_explained[0] > 0.99);
        assert!(result.eigenvalues[0] >= result.eigenvalues[1]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            principal_components(&[], 3),
            Err(PipelineError::Analysis(_))
        ));
        let bands = vec![Raster::new(2, 2), Raster::new(3, 2)];
        assert!(principal_components(&bands, 1).is_err());
    }

    #[test]
    fn test_stretch_spans_full_range() {
        let image = stretch_to_u8(&gradient(4, 1, -3.0, 2.0));
        assert_eq!(image.as_raw(), &vec![0, 85, 170, 255]);
        assert!(stretch_to_u8(&Raster::filled(2, 2, 5.0)).as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_composites_use_consecutive_triples() {
        let images: Vec<GrayImage> = (0..4)
            .map(|k| GrayImage::from_pixel(2, 2, image::Luma([k * 10])))
            .collect();
        let rgb = composites(&images);

        assert_eq!(rgb.len(), 2);
        assert_eq!(rgb[0].0, (1, 2, 3));
        assert_eq!(*rgb[0].1.get_pixel(0, 0), Rgb([0, 10, 20]));
        assert_eq!(rgb[1].0, (2, 3, 4));
    }

    struct CaptureWriter {
        paths: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl RasterWriter for CaptureWriter {
        fn write_gray(&self, _image: &GrayImage, path: &Path, _config: &PipelineConfig) -> Result<()> {
            self.paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn write_rgb(&self, _image: &RgbImage, path: &Path, _config: &PipelineConfig) -> Result<()> {
            self.paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn write_float_tiff(&self, _raster: &Raster, path: &Path, _config: &PipelineConfig) -> Result<()> {
            self.paths.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    #[test]
    fn test_pipeline_writes_components_and_composites() {
        let folder = TempDir::new().unwrap();
        let cube = folder.path().join("Spectral_Cube");
        std::fs::create_dir_all(&cube).unwrap();
        for (k, wavelength) in [400u32, 405, 410, 415].iter().enumerate() {
            GrayImage::from_fn(8, 6, |x, y| image::Luma([((x * (k as u32 + 1) + y * 3) % 256) as u8]))
                .save(cube.join(format!("image{wavelength}.png")))
                .unwrap();
        }

        let paths = Arc::new(Mutex::new(Vec::new()));
        let pipeline = PcaPipeline::with_custom(
            ImageBandReader,
            CaptureWriter {
                paths: paths.clone(),
            },
            PipelineConfig::default(),
            PcaParams::default(),
        );
        let written = pipeline.run(folder.path()).unwrap();

        // Four bands give four components and two composites.
        assert_eq!(written.len(), 6);
        assert_eq!(written[0], folder.path().join("PCA-Out/Image_PC1.jpg"));
        assert_eq!(written[5], folder.path().join("PCA-Out/RGB-ImagePC_2-3-4.jpg"));
        assert_eq!(*paths.lock().unwrap(), written);
    }
}
