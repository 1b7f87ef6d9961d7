//! Index visualization module
//!
//! This module maps index rasters to jet heatmaps with an attached legend and
//! owns the writer seam every pipeline persists its images through.

mod bounds;
mod colormap;
mod heatmap;
mod legend;
mod standard_writer;
mod writer;

pub use bounds::{DisplayBounds, RangeSource, display_bounds, normalize, percentile};
pub use colormap::{apply_jet, jet};
pub use heatmap::{Heatmap, render_heatmap};
pub use legend::{draw_label, render_legend, tick_values};
pub use standard_writer::StandardImageWriter;
pub use writer::RasterWriter;
