//! Display bounds and normalization of index rasters.

use image::GrayImage;
use tracing::warn;

use crate::spectral_pipeline::cube::Raster;

/// Ranges narrower than this are treated as collapsed
const COLLAPSE_TOLERANCE: f64 = 1e-12;

/// Where the bounds of a heatmap came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSource {
    /// Fixed range of the index
    Fixed,
    /// Lower/upper percentiles of the finite values
    Percentile,
    /// Percentiles collapsed, finite min/max used instead
    MinMax,
    /// No finite value at all
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayBounds {
    pub min: f64,
    pub max: f64,
    pub source: RangeSource,
}

impl DisplayBounds {
    pub fn is_degenerate(&self) -> bool {
        (self.max - self.min).abs() < COLLAPSE_TOLERANCE
    }
}

/// Percentile of sorted data with linear interpolation between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Values as displayed: infinities pinned to a fixed range, NaN kept.
fn display_values(raster: &Raster, fixed: Option<(f32, f32)>) -> Vec<f64> {
    raster
        .data
        .iter()
        .map(|&v| {
            let v = v as f64;
            match fixed {
                Some((lo, hi)) if !v.is_nan() => v.clamp(lo as f64, hi as f64),
                _ => v,
            }
        })
        .collect()
}

/// Chooses display bounds for `raster`.
///
/// A fixed range is used as is. Otherwise the `percentiles` of the finite
/// values are used, falling back to the finite min/max if they collapse, and
/// to `[0, 1]` if nothing is finite.
pub fn display_bounds(
    raster: &Raster,
    fixed: Option<(f32, f32)>,
    percentiles: (f64, f64),
) -> DisplayBounds {
    if let Some((lo, hi)) = fixed {
        return DisplayBounds {
            min: lo as f64,
            max: hi as f64,
            source: RangeSource::Fixed,
        };
    }

    let mut finite: Vec<f64> = raster
        .data
        .iter()
        .map(|&v| v as f64)
        .filter(|v| v.is_finite())
        .collect();
    if finite.is_empty() {
        return DisplayBounds {
            min: 0.0,
            max: 1.0,
            source: RangeSource::Empty,
        };
    }
    finite.sort_by(f64::total_cmp);

    let low = percentile(&finite, percentiles.0);
    let high = percentile(&finite, percentiles.1);
    if (high - low).abs() < COLLAPSE_TOLERANCE {
        DisplayBounds {
            min: finite[0],
            max: finite[finite.len() - 1],
            source: RangeSource::MinMax,
        }
    } else {
        DisplayBounds {
            min: low,
            max: high,
            source: RangeSource::Percentile,
        }
    }
}

/// Clips `raster` to `bounds` and rescales it linearly to 0..=255.
///
/// Non-finite pixels map to 0. A degenerate range gives an all-zero image.
pub fn normalize(raster: &Raster, fixed: Option<(f32, f32)>, bounds: &DisplayBounds) -> GrayImage {
    let (width, height) = (raster.width as u32, raster.height as u32);
    let values = display_values(raster, fixed);

    if bounds.is_degenerate() || !values.iter().any(|v| v.is_finite()) {
        warn!(
            min = bounds.min,
            max = bounds.max,
            "Degenerate display range, rendering blank heatmap"
        );
        return GrayImage::new(width, height);
    }

    let span = bounds.max - bounds.min;
    let pixels = values
        .iter()
        .map(|&v| {
            if !v.is_finite() {
                return 0;
            }
            let t = ((v.clamp(bounds.min, bounds.max) - bounds.min) / span).clamp(0.0, 1.0);
            (t * 255.0) as u8
        })
        .collect();
    GrayImage::from_raw(width, height, pixels).unwrap_or_else(|| GrayImage::new(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_interpolates() {
        let data: Vec<f64> = (0..=10).map(|v| v as f64).collect();
        assert_relative_eq!(percentile(&data, 5.0), 0.5);
        assert_relative_eq!(percentile(&data, 95.0), 9.5);
        assert_relative_eq!(percentile(&data, 100.0), 10.0);
    }

    #[test]
    fn test_single_spike_does_not_saturate_scale() {
        let mut data: Vec<f32> = (0..100).map(|i| 1.0 + (i % 10) as f32 * 0.1).collect();
        data[37] = 1.0e6;
        let raster = Raster::from_vec(10, 10, data).unwrap();

        let bounds = display_bounds(&raster, None, (5.0, 95.0));
        assert_eq!(bounds.source, RangeSource::Percentile);
        assert!(bounds.max < 10.0, "spike leaked into bounds: {bounds:?}");

        let levels = normalize(&raster, None, &bounds);
        let distinct: std::collections::BTreeSet<u8> = levels.as_raw().iter().copied().collect();
        assert!(distinct.len() > 5, "colour scale saturated: {distinct:?}");
        assert_eq!(levels.get_pixel(7, 3)[0], 255);
    }

    #[test]
    fn test_collapsed_percentiles_fall_back_to_min_max() {
        let mut data = vec![2.0f32; 100];
        data[0] = -4.0;
        data[99] = 8.0;
        let raster = Raster::from_vec(10, 10, data).unwrap();

        let bounds = display_bounds(&raster, None, (5.0, 95.0));
        assert_eq!(bounds.source, RangeSource::MinMax);
        assert_eq!((bounds.min, bounds.max), (-4.0, 8.0));
    }

    #[test]
    fn test_no_finite_values_gives_blank_unit_range() {
        let raster = Raster::from_vec(2, 1, vec![f32::NAN, f32::INFINITY]).unwrap();
        let bounds = display_bounds(&raster, None, (5.0, 95.0));
        assert_eq!(bounds.source, RangeSource::Empty);
        assert_eq!((bounds.min, bounds.max), (0.0, 1.0));
        assert!(normalize(&raster, None, &bounds).as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_constant_raster_is_blank() {
        let raster = Raster::filled(3, 3, 7.0);
        let bounds = display_bounds(&raster, None, (5.0, 95.0));
        assert!(bounds.is_degenerate());
        assert!(normalize(&raster, None, &bounds).as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_fixed_range_pins_infinities() {
        let raster = Raster::from_vec(4, 1, vec![0.0, f32::INFINITY, f32::NEG_INFINITY, f32::NAN])
            .unwrap();
        let fixed = Some((-1.0, 1.0));
        let bounds = display_bounds(&raster, fixed, (5.0, 95.0));
        assert_eq!(bounds.source, RangeSource::Fixed);

        let levels = normalize(&raster, fixed, &bounds);
        assert_eq!(levels.as_raw(), &vec![127, 255, 0, 0]);
    }
}
