//! Common utilities module
//!
//! This module contains the error type and configuration shared across the spectral pipeline.

pub mod config;
pub mod error;

pub use config::{
    LegendStyle, OutputFormat, PipelineConfig, PipelineConfigBuilder, TiffCompression, Viewport,
};
pub use error::{PipelineError, Result};
