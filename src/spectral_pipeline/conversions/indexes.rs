use std::path::{Path, PathBuf};

use tracing::{error, info, instrument, warn};

use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::common::error::{PipelineError, Result};
use crate::spectral_pipeline::conversions::types::{BatchReport, FLOAT_OUTPUT_DIR, INDEX_OUTPUT_DIR};
use crate::spectral_pipeline::cube::{BandImageReader, CubeLoader, ImageBandReader};
use crate::spectral_pipeline::indices::{IndexEngine, IndexRaster};
use crate::spectral_pipeline::manifest::{SampleManifest, resolve_folder, spectral_cube_dir};
use crate::spectral_pipeline::render::{RasterWriter, StandardImageWriter, render_heatmap};

/// Computes and renders the index catalogue for sample folders.
pub struct IndexPipeline<R: BandImageReader, W: RasterWriter> {
    loader: CubeLoader<R>,
    engine: IndexEngine,
    writer: W,
    config: PipelineConfig,
}

impl IndexPipeline<ImageBandReader, StandardImageWriter> {
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_custom(ImageBandReader, StandardImageWriter, config)
    }
}

impl<R: BandImageReader, W: RasterWriter> IndexPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig) -> Self {
        Self {
            loader: CubeLoader::with_reader(reader),
            engine: IndexEngine::new(),
            writer,
            config,
        }
    }

    pub fn with_engine(mut self, engine: IndexEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Heatmap path of `index` inside a sample folder.
    pub fn heatmap_path(&self, folder: &Path, index: &str) -> PathBuf {
        folder.join(INDEX_OUTPUT_DIR).join(format!(
            "Image_{}.{}",
            index,
            self.config.index_output_format.extension()
        ))
    }

    pub fn float_path(&self, folder: &Path, index: &str) -> PathBuf {
        folder
            .join(INDEX_OUTPUT_DIR)
            .join(FLOAT_OUTPUT_DIR)
            .join(format!("Image_{index}.tif"))
    }

    fn write_index(&self, folder: &Path, index: &IndexRaster) -> Result<PathBuf> {
        let _span = tracing::info_span!("render_index", index = index.name).entered();

        let heatmap = render_heatmap(&index.raster, index.fixed_range, &self.config);
        let path = self.heatmap_path(folder, index.name);
        self.writer.write_rgb(&heatmap.image, &path, &self.config)?;

        if self.config.export_float_tiff {
            self.writer
                .write_float_tiff(&index.raster, &self.float_path(folder, index.name), &self.config)?;
        }

        info!(
            index = index.name,
            min = heatmap.bounds.min,
            max = heatmap.bounds.max,
            source = ?heatmap.bounds.source,
            "Index image written"
        );
        Ok(path)
    }

    /// Computes every index for the sample `name` under `root`.
    ///
    /// The corrected folder is used when present. Returns the heatmap paths.
    #[instrument(skip(self, root), fields(root = %root.display()))]
    pub fn process_folder(&self, root: &Path, name: &str) -> Result<Vec<PathBuf>> {
        let folder = resolve_folder(root, name)
            .ok_or_else(|| PipelineError::MissingFolder(root.join(name)))?;

        let cube = {
            let _span = tracing::info_span!("load_cube").entered();
            self.loader
                .load_cube(&spectral_cube_dir(&folder), self.engine.required_wavelengths())?
        };

        let indices = {
            let _span = tracing::info_span!("compute_indices").entered();
            self.engine.compute_all(&cube)?
        };

        indices
            .iter()
            .map(|index| self.write_index(&folder, index))
            .collect()
    }

    /// Processes every object folder of the manifest.
    #[instrument(
        skip(self, root, manifest),
        fields(root = %root.display(), objects = manifest.objects.len())
    )]
    pub fn process_all(&self, root: &Path, manifest: &SampleManifest) -> BatchReport {
        let mut report = BatchReport::default();

        for name in &manifest.objects {
            let Some(folder) = resolve_folder(root, name) else {
                warn!(folder = %name, "Folder not found, skipping");
                report.skipped.push(name.clone());
                continue;
            };
            match self.process_folder(root, name) {
                Ok(_) => report.processed.push(folder.join(INDEX_OUTPUT_DIR)),
                Err(e) => {
                    error!(folder = %name, "Index computation failed: {}", e);
                    report.failed.push((name.clone(), e));
                }
            }
        }

        info!(
            processed = report.processed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Index batch complete"
        );
        report
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
