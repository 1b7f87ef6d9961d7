//! Radiometric calibration module
//!
//! This module turns raw band images into calibrated reflectance: rectangle
//! selection on the standard target, extraction of the standard spectrum,
//! and per-band correction against dark-current and flat-field captures.

mod corrector;
mod preview;
mod selection;
mod standard;

pub use corrector::{CorrectedBand, correct_band, quantize};
pub use preview::{raster_to_gray, render_preview};
pub use selection::{
    Point, SelectionEvent, SelectionSession, events_from_reader, run_selection,
};
pub use standard::{ReflectanceStandard, StandardExtractor, region_mean, standard_pixel};
