//! Radiometric correction of one band.
//!
//! `corrected = brightness * max(object - dark, 0) / (flat * standard)`
//!
//! Arithmetic runs in `f32` so nothing clips before the division. The result
//! is then quantized to 8 bits (`|v * 255|`, rounded, saturated). Storage
//! stays compact at the cost of dynamic range: values above
//! `1 / brightness` times the standard saturate and sub-1/255 detail is lost.

use image::GrayImage;

use crate::spectral_pipeline::common::config::PipelineConfig;
use crate::spectral_pipeline::cube::Raster;

/// A corrected band before quantization
#[derive(Debug, Clone)]
pub struct CorrectedBand {
    pub raster: Raster,
    /// Pixels whose `flat * standard` fell below the epsilon and were zeroed
    pub guarded_pixels: usize,
}

/// Applies the correction formula to one wavelength.
///
/// All three rasters must share dimensions.
pub fn correct_band(
    object: &Raster,
    dark: &Raster,
    flat: &Raster,
    standard: f32,
    config: &PipelineConfig,
) -> CorrectedBand {
    let mut guarded_pixels = 0usize;
    let data = object
        .data
        .iter()
        .zip(&dark.data)
        .zip(&flat.data)
        .map(|((&o, &d), &f)| {
            let denominator = f * standard;
            if denominator.abs() < config.denominator_epsilon {
                guarded_pixels += 1;
                return 0.0;
            }
            config.brightness * (o - d).max(0.0) / denominator
        })
        .collect();

    CorrectedBand {
        raster: Raster {
            width: object.width,
            height: object.height,
            data,
        },
        guarded_pixels,
    }
}

/// Quantizes reflectance to 8-bit storage: `round(|v * 255|)` saturated to 0..=255.
pub fn quantize(raster: &Raster) -> GrayImage {
    let pixels = raster
        .data
        .iter()
        .map(|&v| {
            let scaled = (v * 255.0).abs();
            if scaled.is_nan() {
                0
            } else {
                scaled.round().min(255.0) as u8
            }
        })
        .collect();
    GrayImage::from_raw(raster.width as u32, raster.height as u32, pixels)
        .unwrap_or_else(|| GrayImage::new(raster.width as u32, raster.height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn test_zero_signal_is_exactly_zero() {
        for &level in &[0.0f32, 17.0, 255.0] {
            let object = Raster::filled(4, 4, level);
            let dark = object.clone();
            let flat = Raster::filled(4, 4, 128.0);

            let corrected = correct_band(&object, &dark, &flat, 0.5, &config());
            assert!(corrected.raster.data.iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_formula() {
        let object = Raster::filled(1, 1, 150.0);
        let dark = Raster::filled(1, 1, 10.0);
        let flat = Raster::filled(1, 1, 200.0);

        let corrected = correct_band(&object, &dark, &flat, 0.7, &config());
        assert_relative_eq!(corrected.raster.data[0], 0.8 * 140.0 / (200.0 * 0.7), epsilon = 1e-6);
        assert_eq!(corrected.guarded_pixels, 0);
    }

    #[test]
    fn test_dark_above_object_saturates_to_zero() {
        let object = Raster::filled(1, 1, 5.0);
        let dark = Raster::filled(1, 1, 9.0);
        let flat = Raster::filled(1, 1, 1.0);

        let corrected = correct_band(&object, &dark, &flat, 1.0, &config());
        assert_eq!(corrected.raster.data[0], 0.0);
    }

    #[test]
    fn test_zero_flat_is_guarded() {
        let object = Raster::from_vec(2, 1, vec![100.0, 100.0]).unwrap();
        let dark = Raster::new(2, 1);
        let flat = Raster::from_vec(2, 1, vec![0.0, 100.0]).unwrap();

        let corrected = correct_band(&object, &dark, &flat, 1.0, &config());
        assert_eq!(corrected.guarded_pixels, 1);
        assert_eq!(corrected.raster.data[0], 0.0);
        assert!(corrected.raster.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_quantize_scales_and_saturates() {
        let raster = Raster::from_vec(4, 1, vec![0.0, 0.5, 2.0, f32::NAN]).unwrap();
        let quantized = quantize(&raster);
        assert_eq!(quantized.as_raw(), &vec![0, 128, 255, 0]);
    }
}
