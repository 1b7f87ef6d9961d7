use image::RgbImage;
use image::imageops;

use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::cube::Raster;
use crate::spectral_pipeline::render::bounds::{DisplayBounds, display_bounds, normalize};
use crate::spectral_pipeline::render::colormap::apply_jet;
use crate::spectral_pipeline::render::legend::render_legend;

/// Heatmap with its legend attached on the right
#[derive(Debug, Clone)]
pub struct Heatmap {
    pub image: RgbImage,
    pub bounds: DisplayBounds,
}

/// Colour-maps `raster` and appends a legend for the bounds actually used.
///
/// Output is a pure function of the raster, the fixed range and the config.
pub fn render_heatmap(
    raster: &Raster,
    fixed_range: Option<(f32, f32)>,
    config: &PipelineConfig,
) -> Heatmap {
    let bounds = display_bounds(raster, fixed_range, config.percentile_bounds);
    let heat = apply_jet(&normalize(raster, fixed_range, &bounds));
    let legend = render_legend(raster.height, &bounds, &config.legend);

    let mut image = RgbImage::new(heat.width() + legend.width(), heat.height());
    imageops::replace(&mut image, &heat, 0, 0);
    imageops::replace(&mut image, &legend, heat.width() as i64, 0);

    Heatmap { image, bounds }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral_pipeline::render::bounds::RangeSource;
    use crate::spectral_pipeline::render::colormap::jet;

    #[test]
    fn test_zero_raster_with_fixed_range_centres_palette() {
        let raster = Raster::new(12, 10);
        let heatmap = render_heatmap(&raster, Some((-1.0, 1.0)), &PipelineConfig::default());

        assert_eq!(heatmap.bounds.source, RangeSource::Fixed);
        assert_eq!((heatmap.bounds.min, heatmap.bounds.max), (-1.0, 1.0));
        assert_eq!(heatmap.image.dimensions(), (12 + 260, 10));
        assert_eq!(*heatmap.image.get_pixel(5, 5), jet(127));
    }

    #[test]
    fn test_output_is_deterministic() {
        let data: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let raster = Raster::from_vec(8, 8, data).unwrap();
        let config = PipelineConfig::default();

        let first = render_heatmap(&raster, None, &config);
        let second = render_heatmap(&raster, None, &config);
        assert_eq!(first.image.as_raw(), second.image.as_raw());
    }

    #[test]
    fn test_quantized_correction_renders() {
        use crate::spectral_pipeline::calibration::quantize;

        let corrected: Vec<f32> = (0..30).map(|i| i as f32 / 40.0).collect();
        let stored = quantize(&Raster::from_vec(6, 5, corrected).unwrap());
        let reloaded = Raster::from_gray(&stored);

        let heatmap = render_heatmap(&reloaded, None, &PipelineConfig::default());
        assert_eq!(heatmap.bounds.source, RangeSource::Percentile);
        assert_eq!(heatmap.image.dimensions(), (6 + 260, 5));
    }

    #[test]
    fn test_all_nan_raster_renders_blank() {
        let raster = Raster::filled(5, 4, f32::NAN);
        let heatmap = render_heatmap(&raster, None, &PipelineConfig::default());

        assert_eq!(heatmap.bounds.source, RangeSource::Empty);
        for x in 0..5 {
            for y in 0..4 {
                assert_eq!(*heatmap.image.get_pixel(x, y), jet(0));
            }
        }
    }
}
