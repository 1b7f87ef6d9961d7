use std::path::{Path, PathBuf};

use tracing::{error, info, instrument, warn};

use crate::spectral_pipeline::calibration::{
    ReflectanceStandard, SelectionEvent, SelectionSession, StandardExtractor, correct_band,
    quantize, render_preview, run_selection,
};
use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::conversions::types::{BatchReport, ROI_DIR, SELECTION_PREVIEW_FILE};
use crate::spectral_pipeline::cube::{
    ALL_WAVELENGTHS, BandImageReader, CubeLoader, ImageBandReader, LONGEST_WAVELENGTH, Raster,
    Region, band_path, detect_extension,
};
use crate::spectral_pipeline::manifest::{SampleManifest, corrected_name, spectral_cube_dir};
use crate::spectral_pipeline::render::{RasterWriter, StandardImageWriter};

/// Radiometric correction of every object folder of a manifest.
pub struct CorrectionPipeline<R: BandImageReader, W: RasterWriter> {
    loader: CubeLoader<R>,
    writer: W,
    config: PipelineConfig,
    wavelengths: Vec<u32>,
}

impl CorrectionPipeline<ImageBandReader, StandardImageWriter> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_custom(ImageBandReader, StandardImageWriter, config)
    }
}

impl<R: BandImageReader, W: RasterWriter> CorrectionPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig) -> Self {
        Self {
            loader: CubeLoader::with_reader(reader),
            writer,
            config,
            wavelengths: ALL_WAVELENGTHS.to_vec(),
        }
    }

    /// Restricts the band set corrected (the full catalogue by default).
    pub fn with_wavelengths(mut self, wavelengths: &[u32]) -> Self {
        self.wavelengths = wavelengths.to_vec();
        self
    }

    pub fn wavelengths(&self) -> &[u32] {
        &self.wavelengths
    }

    /// Band shown for the selection: the longest wavelength corrected.
    fn selection_wavelength(&self) -> u32 {
        self.wavelengths
            .iter()
            .copied()
            .max()
            .unwrap_or(LONGEST_WAVELENGTH)
    }

    /// Lets the user pick the standard rectangle on the longest band of the
    /// standard capture.
    ///
    /// The preview with the committed rectangle is written to
    /// `<root>/ROI/standard_selection.png`. Returns the rectangle in
    /// full-resolution pixels.
    #[instrument(skip(self, root, manifest, events), fields(root = %root.display()))]
    pub fn select_standard_region<I>(
        &self,
        root: &Path,
        manifest: &SampleManifest,
        events: I,
    ) -> Result<Region>
    where
        I: IntoIterator<Item = SelectionEvent>,
    {
        let standard_dir = spectral_cube_dir(&root.join(&manifest.standard));
        let wavelength = self.selection_wavelength();

        let band = {
            let _span = tracing::info_span!("load_selection_band", wavelength).entered();
            let format = detect_extension(&standard_dir)?;
            self.loader.load_band(&standard_dir, wavelength, format)?
        };

        let mut session = SelectionSession::for_image(band.width, band.height, &self.config.viewport);
        info!(
            scale = session.scale(),
            "Select the reflectance standard: press/release corners, 'r' to reset, 'p' to proceed, 'q' to quit"
        );
        let region = run_selection(&mut session, events)?;

        let preview = render_preview(&band, session.scale(), session.selection());
        let preview_path = root.join(ROI_DIR).join(SELECTION_PREVIEW_FILE);
        self.writer.write_rgb(&preview, &preview_path, &self.config)?;

        info!(?region, preview = %preview_path.display(), "Standard rectangle committed");
        Ok(region)
    }

    /// Computes the standard spectrum over `region` of the standard capture.
    pub fn extract_standard(
        &self,
        root: &Path,
        manifest: &SampleManifest,
        region: Region,
    ) -> Result<ReflectanceStandard> {
        let _span = tracing::info_span!("extract_standard").entered();
        StandardExtractor::new(&self.loader, &self.config).extract(
            &spectral_cube_dir(&root.join(&manifest.standard)),
            &spectral_cube_dir(&root.join(&manifest.dark)),
            &spectral_cube_dir(&root.join(&manifest.flat)),
            region,
            &self.wavelengths,
        )
    }

    /// Corrects one object folder into `<root>/Corrected_<name>/Spectral_Cube`.
    ///
    /// Every object, dark and flat band is loaded and corrected before
    /// anything is written, so a missing, unreadable or mis-sized band aborts
    /// the folder without touching `Corrected_<name>`.
    #[instrument(skip(self, root, manifest, standard))]
    pub fn correct_folder(
        &self,
        root: &Path,
        manifest: &SampleManifest,
        name: &str,
        standard: &ReflectanceStandard,
    ) -> Result<PathBuf> {
        let object_dir = spectral_cube_dir(&root.join(name));
        let dark_dir = spectral_cube_dir(&root.join(&manifest.dark));
        let flat_dir = spectral_cube_dir(&root.join(&manifest.flat));

        let object_format = detect_extension(&object_dir)?;
        let dark_format = detect_extension(&dark_dir)?;
        let flat_format = detect_extension(&flat_dir)?;

        {
            let _span = tracing::info_span!("check_bands").entered();
            self.loader.check_bands(&object_dir, &self.wavelengths, object_format)?;
            self.loader.check_bands(&dark_dir, &self.wavelengths, dark_format)?;
            self.loader.check_bands(&flat_dir, &self.wavelengths, flat_format)?;
            if let Some(&wavelength) = self
                .wavelengths
                .iter()
                .find(|&&wl| standard.value(wl).is_none())
            {
                return Err(PipelineError::Analysis(format!(
                    "reflectance standard has no value at {wavelength} nm"
                )));
            }
        }

        let mut corrected_bands = Vec::with_capacity(self.wavelengths.len());
        let mut cube_size = None;

        for &wavelength in &self.wavelengths {
            let _span = tracing::info_span!("correct_band", wavelength).entered();

            let object_path = band_path(&object_dir, wavelength, object_format);
            let dark_path = band_path(&dark_dir, wavelength, dark_format);
            let flat_path = band_path(&flat_dir, wavelength, flat_format);
            let object = self.loader.load_band(&object_dir, wavelength, object_format)?;
            let dark = self.loader.load_band(&dark_dir, wavelength, dark_format)?;
            let flat = self.loader.load_band(&flat_dir, wavelength, flat_format)?;
            if self.config.validate_dimensions {
                let expected = *cube_size.get_or_insert(object.dimensions());
                if object.dimensions() != expected {
                    return Err(PipelineError::DimensionMismatch {
                        path: object_path,
                        expected,
                        actual: object.dimensions(),
                    });
                }
                ensure_matching_group([
                    (&object, object_path),
                    (&dark, dark_path),
                    (&flat, flat_path),
                ])?;
            }

            let standard_value = standard.value(wavelength).unwrap_or_default() as f32;
            let corrected = correct_band(&object, &dark, &flat, standard_value, &self.config);
            if corrected.guarded_pixels > 0 {
                warn!(
                    wavelength,
                    pixels = corrected.guarded_pixels,
                    "Zero flat-field or standard denominator, pixels set to 0"
                );
            }
            corrected_bands.push((wavelength, quantize(&corrected.raster)));
        }

        // Only a fully corrected cube is written.
        let output_folder = root.join(corrected_name(name));
        let output_dir = spectral_cube_dir(&output_folder);
        for (wavelength, image) in &corrected_bands {
            let path = band_path(&output_dir, *wavelength, object_format);
            self.writer.write_gray(image, &path, &self.config)?;
        }

        info!(output = %output_folder.display(), bands = self.wavelengths.len(), "Folder corrected");
        Ok(output_folder)
    }

    /// Corrects every object folder; a failing folder does not stop the batch.
    #[instrument(
        skip(self, root, manifest, standard),
        fields(root = %root.display(), objects = manifest.objects.len())
    )]
    pub fn correct_all(
        &self,
        root: &Path,
        manifest: &SampleManifest,
        standard: &ReflectanceStandard,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for name in &manifest.objects {
            if !root.join(name).is_dir() {
                warn!(folder = %name, "Folder not found, skipping");
                report.skipped.push(name.clone());
                continue;
            }
            match self.correct_folder(root, manifest, name, standard) {
                Ok(output) => report.processed.push(output),
                Err(e) => {
                    error!(folder = %name, "Correction failed: {}", e);
                    report.failed.push((name.clone(), e));
                }
            }
        }

        info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Correction batch complete"
        );
        report
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PipelineConfig) {
        self.config = config;
    }
}

/// Fails with `DimensionMismatch` naming the raster whose size disagrees with
/// the other two (or with the first, when all three differ).
fn ensure_matching_group(group: [(&Raster, PathBuf); 3]) -> Result<()> {
    let [(object, object_path), (dark, dark_path), (flat, flat_path)] = group;
    let (o, d, f) = (object.dimensions(), dark.dimensions(), flat.dimensions());
    if o == d && o == f {
        return Ok(());
    }

    let (path, expected, actual) = if d == f {
        (object_path, d, o)
    } else if o == d {
        (flat_path, o, f)
    } else {
        (dark_path, o, d)
    };
    Err(PipelineError::DimensionMismatch { path, expected, actual })
}
