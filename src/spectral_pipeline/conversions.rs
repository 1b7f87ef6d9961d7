//! Batch conversions module
//!
//! Orchestrators running the correction and index stages over the folders of
//! a sample manifest. Both are generic over the band reader and the raster
//! writer so they can be driven by mocks in tests.

mod correction;
mod indexes;
pub mod types;


pub use correction::CorrectionPipeline;
pub use indexes::IndexPipeline;
pub use types::{
    BatchReport, FLOAT_OUTPUT_DIR, INDEX_OUTPUT_DIR, ROI_DIR, SELECTION_PREVIEW_FILE,
};
