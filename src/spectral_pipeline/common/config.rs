//! Pipeline configuration types

/// TIFF compression methods for the float index export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    /// No compression (fastest, largest file)
    None,
    /// LZW compression (slow, good compression)
    Lzw,
    /// Deflate compression - fast level (good speed/size balance)
    DeflateFast,
    /// Deflate compression - balanced
    DeflateBalanced,
    /// Deflate compression - best compression (slower)
    DeflateBest,
}

/// 8-bit raster formats accepted for band cubes and written for heatmaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Parses an extension (with or without the dot, any case).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

/// Bounding box an image is scaled into for on-screen selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 600,
        }
    }
}

impl Viewport {
    /// Scale factor that fits `width`x`height` into the viewport.
    ///
    /// Images already inside the viewport are never enlarged.
    pub fn scale_for(&self, width: usize, height: usize) -> f64 {
        let max_w = self.max_width as f64;
        let max_h = self.max_height as f64;
        if width as f64 > max_w || height as f64 > max_h {
            (max_w / width as f64).min(max_h / height as f64)
        } else {
            1.0
        }
    }
}

/// Layout of the vertical colour legend attached to every heatmap
#[derive(Debug, Clone, PartialEq)]
pub struct LegendStyle {
    /// Total legend width in pixels
    pub width: usize,
    /// Horizontal extent of the gradient bar inside the legend
    pub bar_x0: usize,
    pub bar_x1: usize,
    /// Number of evenly spaced tick labels from min to max
    pub ticks: usize,
    /// Label font size in pixels
    pub font_size: f32,
    /// Space kept free above the top label and below the bottom label
    pub top_margin: usize,
    pub bottom_margin: usize,
}

impl Default for LegendStyle {
    fn default() -> Self {
        Self {
            width: 260,
            bar_x0: 20,
            bar_x1: 60,
            ticks: 9,
            font_size: 22.0,
            top_margin: 60,
            bottom_margin: 60,
        }
    }
}

/// Configuration shared by correction, index computation and rendering
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Uniform scale applied to corrected reflectance before quantization
    pub brightness: f32,
    /// Denominators below this value are treated as zero during correction
    pub denominator_epsilon: f32,
    /// Viewport used for the selection preview
    pub viewport: Viewport,
    /// JPEG quality (1-100) for every JPEG written
    pub jpeg_quality: u8,
    /// Lower/upper percentiles used for automatic heatmap bounds
    pub percentile_bounds: (f64, f64),
    pub legend: LegendStyle,
    /// Format of `Indexes_out/Image_<name>.<ext>`
    pub index_output_format: OutputFormat,
    /// Also write each index raster as 32-bit float TIFF
    pub export_float_tiff: bool,
    pub tiff_compression: TiffCompression,
    /// Whether rasters combined in one step must share dimensions
    pub validate_dimensions: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            brightness: 0.8,
            denominator_epsilon: 1e-6,
            viewport: Viewport::default(),
            jpeg_quality: 95,
            percentile_bounds: (5.0, 95.0),
            legend: LegendStyle::default(),
            index_output_format: OutputFormat::Jpeg,
            export_float_tiff: false,
            tiff_compression: TiffCompression::None,
            validate_dimensions: true,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    brightness: Option<f32>,
    denominator_epsilon: Option<f32>,
    viewport: Option<Viewport>,
    jpeg_quality: Option<u8>,
    percentile_bounds: Option<(f64, f64)>,
    legend: Option<LegendStyle>,
    index_output_format: Option<OutputFormat>,
    export_float_tiff: Option<bool>,
    tiff_compression: Option<TiffCompression>,
    validate_dimensions: Option<bool>,
}

impl PipelineConfigBuilder {
    pub fn brightness(mut self, brightness: f32) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn denominator_epsilon(mut self, epsilon: f32) -> Self {
        self.denominator_epsilon = Some(epsilon);
        self
    }

    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = Some(quality.clamp(1, 100));
        self
    }

    pub fn percentile_bounds(mut self, low: f64, high: f64) -> Self {
        self.percentile_bounds = Some((low, high));
        self
    }

    pub fn legend(mut self, legend: LegendStyle) -> Self {
        self.legend = Some(legend);
        self
    }

    pub fn index_output_format(mut self, format: OutputFormat) -> Self {
        self.index_output_format = Some(format);
        self
    }

    pub fn export_float_tiff(mut self, enable: bool) -> Self {
        self.export_float_tiff = Some(enable);
        self
    }

    pub fn tiff_compression(mut self, compression: TiffCompression) -> Self {
        self.tiff_compression = Some(compression);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn build(self) -> PipelineConfig {
        let default = PipelineConfig::default();
        PipelineConfig {
            brightness: self.brightness.unwrap_or(default.brightness),
            denominator_epsilon: self
                .denominator_epsilon
                .unwrap_or(default.denominator_epsilon),
            viewport: self.viewport.unwrap_or(default.viewport),
            jpeg_quality: self.jpeg_quality.unwrap_or(default.jpeg_quality),
            percentile_bounds: self.percentile_bounds.unwrap_or(default.percentile_bounds),
            legend: self.legend.unwrap_or(default.legend),
            index_output_format: self
                .index_output_format
                .unwrap_or(default.index_output_format),
            export_float_tiff: self.export_float_tiff.unwrap_or(default.export_float_tiff),
            tiff_compression: self.tiff_compression.unwrap_or(default.tiff_compression),
            validate_dimensions: self
                .validate_dimensions
                .unwrap_or(default.validate_dimensions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = PipelineConfig::builder()
            .brightness(0.5)
            .jpeg_quality(250)
            .tiff_compression(TiffCompression::DeflateBest)
            .export_float_tiff(true)
            .build();

        assert_eq!(config.brightness, 0.5);
        assert_eq!(config.jpeg_quality, 100);
        assert_eq!(config.tiff_compression, TiffCompression::DeflateBest);
        assert!(config.export_float_tiff);
        assert_eq!(config.denominator_epsilon, 1e-6);
        assert_eq!(config.percentile_bounds, (5.0, 95.0));
    }

    #[test]
    fn test_viewport_scale() {
        let viewport = Viewport::default();
        assert_eq!(viewport.scale_for(400, 300), 1.0);
        assert_eq!(viewport.scale_for(1600, 1200), 0.5);
        assert_eq!(viewport.scale_for(2400, 600), 800.0 / 2400.0);
    }

    #[test]
    fn test_output_format_extension() {
        assert_eq!(OutputFormat::from_extension(".JPG"), Some(OutputFormat::Jpeg));
        assert_eq!(OutputFormat::from_extension("png"), Some(OutputFormat::Png));
        assert_eq!(OutputFormat::from_extension("tif"), None);
    }
}
