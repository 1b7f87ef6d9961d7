use std::path::PathBuf;

use crate::spectral_pipeline::common::error::PipelineError;

/// Folder receiving the selection preview, relative to the working root
pub const ROI_DIR: &str = "ROI";
pub const SELECTION_PREVIEW_FILE: &str = "standard_selection.png";

/// Folder holding index heatmaps inside a sample folder
pub const INDEX_OUTPUT_DIR: &str = "Indexes_out";
/// Sub-folder of [`INDEX_OUTPUT_DIR`] holding the float TIFF exports
pub const FLOAT_OUTPUT_DIR: &str = "float";

/// Outcome of a batch over the object folders of a manifest
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Output folder of every sample processed successfully
    pub processed: Vec<PathBuf>,
    /// Listed folders absent from disk
    pub skipped: Vec<String>,
    /// Folders whose processing failed, with the error that stopped them
    pub failed: Vec<(String, PipelineError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}
