use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use hyperspec_rs::logger;
use hyperspec_rs::spectral_pipeline::calibration::{Point, events_from_reader};
use hyperspec_rs::spectral_pipeline::common::{OutputFormat, TiffCompression};
use hyperspec_rs::spectral_pipeline::gather::{GATHER_DIR, gather_indexes};
use hyperspec_rs::spectral_pipeline::manifest::{MANIFEST_FILE, resolve_folder};
use hyperspec_rs::spectral_pipeline::pca::{PcaParams, PcaPipeline};
use hyperspec_rs::spectral_pipeline::spectrum::{BackgroundMode, SpectrumPipeline, SpectrumTable};
use hyperspec_rs::spectral_pipeline::{
    BatchReport, CorrectionPipeline, IndexPipeline, PipelineConfig, ReflectanceStandard, Region,
    SampleManifest, SelectionEvent,
};

/// Parse a rectangle in format "x0,y0,x1,y1"
fn parse_rect(s: &str) -> Result<Region, String> {
    let parts: Vec<usize> = s
        .split(',')
        .map(|v| v.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|_| "Rectangle must be in format 'x0,y0,x1,y1' (pixels)".to_string())?;
    match parts.as_slice() {
        &[x0, y0, x1, y1] => Ok(Region::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))),
        _ => Err("Rectangle must have exactly four coordinates".to_string()),
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImageFormat {
    Jpg,
    Png,
}

impl From<ImageFormat> for OutputFormat {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpg => OutputFormat::Jpeg,
            ImageFormat::Png => OutputFormat::Png,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Compression {
    None,
    Lzw,
    DeflateFast,
    DeflateBalanced,
    DeflateBest,
}

impl From<Compression> for TiffCompression {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::None => TiffCompression::None,
            Compression::Lzw => TiffCompression::Lzw,
            Compression::DeflateFast => TiffCompression::DeflateFast,
            Compression::DeflateBalanced => TiffCompression::DeflateBalanced,
            Compression::DeflateBest => TiffCompression::DeflateBest,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "hyperspec",
    about = "Radiometric correction, spectral indices and ROI tools for hyperspectral band cubes",
    long_about = None
)]
struct Cli {
    /// Working folder holding the sample folders
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Sample manifest, relative to the root unless absolute
    #[arg(long, default_value = MANIFEST_FILE)]
    manifest: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    /// JPEG quality for every JPEG written
    #[arg(long, default_value_t = 95)]
    jpeg_quality: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Correct every object folder against the calibration folders
    Correct(CorrectArgs),
    /// Compute and render the spectral index catalogue
    Indices(IndicesArgs),
    /// Collect index images of all samples into one folder per index
    Gather {
        /// Destination folder, relative to the root
        #[arg(long, default_value = GATHER_DIR)]
        dest: PathBuf,
    },
    /// Principal component analysis of sample cubes
    Pca(PcaArgs),
    /// Mean and SD spectra of rectangles, exported as CSV
    Spectrum(SpectrumArgs),
}

#[derive(Args, Debug)]
struct CorrectArgs {
    /// Standard rectangle in preview coordinates ("x0,y0,x1,y1"); read from stdin when absent
    #[arg(long, value_parser = parse_rect, conflicts_with = "standard_csv")]
    roi: Option<Region>,

    /// Reuse a previously saved standard spectrum instead of selecting one
    #[arg(long)]
    standard_csv: Option<PathBuf>,

    /// Save the extracted standard spectrum to this CSV
    #[arg(long)]
    save_standard: Option<PathBuf>,

    /// Scale applied to corrected reflectance before quantization
    #[arg(long, default_value_t = 0.8)]
    brightness: f32,
}

#[derive(Args, Debug)]
struct IndicesArgs {
    /// Heatmap file format
    #[arg(long, value_enum, default_value = "jpg")]
    format: ImageFormat,

    /// Also write every index as a 32-bit float TIFF
    #[arg(long)]
    float_tiff: bool,

    /// Compression of the float TIFFs
    #[arg(long, value_enum, default_value = "none")]
    compression: Compression,

    /// Lower and upper percentile of the automatic display range
    #[arg(long, num_args = 2, value_names = ["LOW", "HIGH"], default_values_t = [5.0, 95.0])]
    percentiles: Vec<f64>,
}

#[derive(Args, Debug)]
struct PcaArgs {
    /// Sample folders to analyse; all manifest objects when empty
    folders: Vec<String>,

    /// Downscale factor applied before the analysis
    #[arg(long, default_value_t = 0.5)]
    scale: f64,

    /// Number of principal components written
    #[arg(long, default_value_t = 10)]
    components: usize,
}

#[derive(Args, Debug)]
struct SpectrumArgs {
    /// Sample folders to measure; all manifest objects when empty
    folders: Vec<String>,

    /// Background rectangle in full-resolution pixels ("x0,y0,x1,y1")
    #[arg(long, value_parser = parse_rect, required_unless_present = "no_background")]
    background: Option<Region>,

    /// Count every positive pixel instead of thresholding against a background
    #[arg(long, conflicts_with = "background")]
    no_background: bool,

    /// Measurement rectangle in full-resolution pixels; repeat for several
    #[arg(long = "measure", value_parser = parse_rect, required = true)]
    measurements: Vec<Region>,
}

fn load_manifest(cli: &Cli) -> anyhow::Result<SampleManifest> {
    let path = if cli.manifest.is_absolute() {
        cli.manifest.clone()
    } else {
        cli.root.join(&cli.manifest)
    };
    SampleManifest::from_file(&path).with_context(|| format!("reading {}", path.display()))
}

fn finish(stage: &str, report: &BatchReport) -> anyhow::Result<()> {
    for name in &report.skipped {
        warn!(folder = %name, "Skipped, folder not found");
    }
    for (name, e) in &report.failed {
        error!(folder = %name, "{}", e);
    }
    if !report.is_success() {
        bail!("{stage}: {} folder(s) failed", report.failed.len());
    }
    info!("{stage}: {} folder(s) processed", report.processed.len());
    Ok(())
}

fn run_correct(
    root: &Path,
    manifest: &SampleManifest,
    config: PipelineConfig,
    args: &CorrectArgs,
) -> anyhow::Result<()> {
    let config = PipelineConfig {
        brightness: args.brightness,
        ..config
    };
    let pipeline = CorrectionPipeline::new(config);

    let standard = match &args.standard_csv {
        Some(path) => ReflectanceStandard::read_csv(path)
            .with_context(|| format!("reading standard spectrum {}", path.display()))?,
        None => {
            let region = match args.roi {
                Some(roi) => pipeline.select_standard_region(
                    root,
                    manifest,
                    SelectionEvent::scripted(
                        Point::new(roi.x0 as u32, roi.y0 as u32),
                        Point::new(roi.x1 as u32, roi.y1 as u32),
                    ),
                )?,
                None => {
                    let stdin = std::io::stdin();
                    pipeline.select_standard_region(root, manifest, events_from_reader(stdin.lock()))?
                }
            };
            pipeline.extract_standard(root, manifest, region)?
        }
    };

    if let Some(path) = &args.save_standard {
        standard.write_csv(path)?;
        info!(path = %path.display(), "Standard spectrum saved");
    }

    finish("correct", &pipeline.correct_all(root, manifest, &standard))
}

fn sample_folders(manifest: &SampleManifest, folders: &[String]) -> Vec<String> {
    if folders.is_empty() {
        manifest.objects.clone()
    } else {
        folders.to_vec()
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init_with_default(if cli.verbose { "debug" } else { logger::DEFAULT_FILTER });

    let manifest = load_manifest(&cli)?;
    let root = cli.root.as_path();
    let config = PipelineConfig::builder().jpeg_quality(cli.jpeg_quality).build();

    match &cli.command {
        Command::Correct(args) => run_correct(root, &manifest, config, args),
        Command::Indices(args) => {
            let (low, high) = match args.percentiles.as_slice() {
                &[low, high] => (low, high),
                _ => (5.0, 95.0),
            };
            let config = PipelineConfig {
                index_output_format: args.format.into(),
                export_float_tiff: args.float_tiff,
                tiff_compression: args.compression.into(),
                percentile_bounds: (low, high),
                ..config
            };
            finish("indices", &IndexPipeline::new(config).process_all(root, &manifest))
        }
        Command::Gather { dest } => {
            let report = gather_indexes(root, &manifest, &root.join(dest))?;
            info!(
                copied = report.copied.len(),
                skipped = report.skipped.len(),
                "Done collecting index images"
            );
            Ok(())
        }
        Command::Pca(args) => {
            let params = PcaParams {
                scale: args.scale,
                components: args.components,
            };
            let pipeline = PcaPipeline::new(config, params);
            for name in sample_folders(&manifest, &args.folders) {
                let Some(folder) = resolve_folder(root, &name) else {
                    warn!(folder = %name, "Folder not found, skipping");
                    continue;
                };
                pipeline.run(&folder)?;
            }
            Ok(())
        }
        Command::Spectrum(args) => {
            let background = match args.background {
                Some(region) if !args.no_background => BackgroundMode::Region(region),
                _ => BackgroundMode::None,
            };
            let pipeline = SpectrumPipeline::new(config);
            let mut table = SpectrumTable::new();
            for name in sample_folders(&manifest, &args.folders) {
                if let Err(e) =
                    pipeline.measure_folder(root, &name, background, &args.measurements, &mut table)
                {
                    error!(folder = %name, "{}", e);
                }
            }
            if table.is_empty() {
                bail!("no spectrum measured");
            }
            let (means, sds) = table.write_csv(root)?;
            info!(means = %means.display(), sd = %sds.display(), "Spectra exported");
            Ok(())
        }
    }
}
