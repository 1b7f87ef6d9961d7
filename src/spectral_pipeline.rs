//! Hyperspectral processing pipeline module
//!
//! This module provides the band-cube reader, the radiometric calibration
//! stages, the spectral index engine and its visualizer, plus the batch
//! orchestrators and secondary tools built on them.

pub mod calibration;
pub mod common;
pub mod conversions;
pub mod cube;
pub mod gather;
pub mod indices;
pub mod manifest;
pub mod pca;
pub mod render;
pub mod spectrum;

pub use common::{
    PipelineConfig,
    PipelineConfigBuilder,
    PipelineError,
    Result,
};

pub use cube::{
    BandCube,
    BandImageReader,
    CubeLoader,
    ImageBandReader,
    Raster,
    Region,
};

pub use calibration::{
    ReflectanceStandard,
    SelectionEvent,
    SelectionSession,
};

pub use indices::{
    IndexEngine,
    IndexRaster,
    SpectralIndex,
};

pub use render::{
    RasterWriter,
    StandardImageWriter,
};

pub use conversions::{
    BatchReport,
    CorrectionPipeline,
    IndexPipeline,
};

pub use manifest::SampleManifest;
