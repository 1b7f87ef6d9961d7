//! Spectral index module
//!
//! A fixed table of band-algebra formulas and the engine evaluating it over
//! a corrected cube.

mod catalogue;
mod engine;

pub use catalogue::{
    CATALOGUE, INDEX_EPSILON, Pixel, REQUIRED_WAVELENGTHS, SpectralIndex, find_index,
};
pub use engine::{IndexEngine, IndexRaster};
