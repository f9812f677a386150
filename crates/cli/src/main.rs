//! escarp CLI - cliff-aware DEM upsampling

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use escarp_algorithms::cliff::{
    cliff_aware_upsample, region_palette, CliffAwareOutput, CliffLine, CliffParams, InjectionStrategy,
    Transect,
};
use escarp_algorithms::interpolation::threshold_resample;
use escarp_core::io::{read_geotiff, write_geotiff, write_rgb_tiff, GeoTiffOptions};
use escarp_core::{GeoTransform, Raster, RasterElement};

/// Metres per degree of latitude
const METERS_PER_DEGREE_LAT: f64 = 111_000.0;
/// Metres per degree of longitude at the equator
const METERS_PER_DEGREE_LON: f64 = 111_320.0;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "escarp")]
#[command(author, version, about = "Cliff-aware DEM upsampling", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Upsample a DEM keeping cliff edges sharp
    Upsample {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// JSON file with pipeline parameters; flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        #[command(flatten)]
        window: WindowArgs,
        #[command(flatten)]
        params: ParamArgs,
        /// Directory for gradient, mask, region and line diagnostics
        #[arg(long)]
        diagnostics: Option<PathBuf>,
        /// Seed for the region colours in regions_rgb.tif
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Fast upsampling: bilinear, or nearest where the local range exceeds a threshold
    Quick {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        #[command(flatten)]
        window: WindowArgs,
        /// Output cells per input cell along each axis
        #[arg(short, long, default_value = "8")]
        factor: usize,
        /// Local elevation range above which the nearest sample is used
        #[arg(short, long, default_value = "50")]
        threshold: f64,
    },
}

#[derive(Args)]
struct WindowArgs {
    /// Latitude (or map Y) of the window centre
    #[arg(long, requires = "center_lon")]
    center_lat: Option<f64>,
    /// Longitude (or map X) of the window centre
    #[arg(long, requires = "center_lat")]
    center_lon: Option<f64>,
    /// Window edge length in metres
    #[arg(long, default_value = "1000")]
    window_m: f64,
}

/// Per-field overrides of [`CliffParams`]
#[derive(Args)]
struct ParamArgs {
    /// Output cells per input cell along each axis
    #[arg(short = 'f', long)]
    upscale_factor: Option<usize>,
    /// Gradient above which a cell is a cliff cell
    #[arg(short = 't', long)]
    cliff_threshold: Option<f64>,
    /// Minimum number of points in a cliff line
    #[arg(long)]
    min_length: Option<usize>,
    /// Largest elevation jump between consecutive line points
    #[arg(long)]
    similarity_threshold: Option<f64>,
    /// Gaussian sigma for pre-smoothing and influence blur
    #[arg(long)]
    smoothing_sigma: Option<f64>,
    /// Skip the Gaussian pre-smoothing
    #[arg(long)]
    no_pre_smooth: bool,
    /// Share of the additive half-width taken by the cliff face
    #[arg(long)]
    cliff_width_percent: Option<f64>,
    /// Share of the additive half-width ramped on each side
    #[arg(long)]
    side_percent: Option<f64>,
    /// Distance of the additive side probes
    #[arg(long)]
    sample_distance: Option<f64>,
    /// Smoothing-spline residual budget
    #[arg(long)]
    curve_smoothness: Option<f64>,
    /// Minimum number of dense samples per curve
    #[arg(long)]
    min_curve_samples: Option<usize>,
    /// Transect length in output pixels
    #[arg(long)]
    segment_length: Option<f64>,
    /// Stride between transects along the dense curve
    #[arg(long)]
    sample_interval: Option<usize>,
    /// Injection strategy: additive, subtractive
    #[arg(short = 's', long)]
    strategy: Option<InjectionStrategy>,
    /// Nudge line points by the directional gradient ratios
    #[arg(long)]
    subpixel_refine: bool,
    /// Diagonal damping in the directional ratios
    #[arg(long)]
    ratio_alpha: Option<f64>,
    /// Value written into excised cells (default NaN)
    #[arg(long)]
    nodata: Option<f64>,
}

impl ParamArgs {
    fn apply(self, p: &mut CliffParams) {
        macro_rules! set {
            ($($flag:ident => $field:ident),* $(,)?) => {
                $(if let Some(v) = self.$flag { p.$field = v; })*
            };
        }
        set!(
            upscale_factor => upscale_factor,
            cliff_threshold => cliff_threshold,
            min_length => min_length,
            similarity_threshold => similarity_threshold,
            smoothing_sigma => smoothing_sigma,
            cliff_width_percent => cliff_width_percent,
            side_percent => side_percent,
            sample_distance => sample_distance,
            curve_smoothness => curve_smoothness,
            min_curve_samples => min_curve_samples,
            segment_length => segment_length,
            sample_interval => sample_interval,
            strategy => injection_strategy,
            ratio_alpha => ratio_alpha,
            nodata => nodata_value,
        );
        if self.no_pre_smooth {
            p.pre_smooth = false;
        }
        if self.subpixel_refine {
            p.subpixel_refine = true;
        }
    }
}

/// Cliff lines and transects written to `lines.json`
#[derive(Serialize)]
struct LinesReport<'a> {
    lines: &'a [CliffLine],
    transects: &'a [Vec<Transect>],
    fallback: Option<String>,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_dem(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result<T: RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions { write_nodata: true }))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Pixel window `(row0, col0, rows, cols)` of edge `window_m` around a map
/// position, clamped to the raster.
///
/// Transforms with sub-metre pixels are taken to be geographic degrees.
fn window_bounds(
    transform: &GeoTransform,
    shape: (usize, usize),
    lat: f64,
    lon: f64,
    window_m: f64,
) -> Result<(usize, usize, usize, usize)> {
    anyhow::ensure!(window_m > 0.0, "Window size must be positive, got {}", window_m);

    let (half_x, half_y) = if transform.cell_size() < 0.01 {
        let deg_lat = window_m / METERS_PER_DEGREE_LAT;
        let deg_lon = window_m / (METERS_PER_DEGREE_LON * lat.to_radians().cos());
        (deg_lon / 2.0, deg_lat / 2.0)
    } else {
        (window_m / 2.0, window_m / 2.0)
    };

    let (ca, ra) = transform.geo_to_pixel(lon - half_x, lat + half_y);
    let (cb, rb) = transform.geo_to_pixel(lon + half_x, lat - half_y);
    anyhow::ensure!(
        ca.is_finite() && ra.is_finite() && cb.is_finite() && rb.is_finite(),
        "Raster transform cannot locate ({}, {})",
        lat,
        lon
    );

    let (rows, cols) = shape;
    let clamp = |v: f64, n: usize| v.clamp(0.0, n as f64) as usize;
    let row0 = clamp(ra.min(rb).floor(), rows);
    let row1 = clamp(ra.max(rb).ceil(), rows);
    let col0 = clamp(ca.min(cb).floor(), cols);
    let col1 = clamp(ca.max(cb).ceil(), cols);

    anyhow::ensure!(
        row1 > row0 && col1 > col0,
        "Window around ({}, {}) does not overlap the raster",
        lat,
        lon
    );
    Ok((row0, col0, row1 - row0, col1 - col0))
}

fn load_window(input: &Path, window: &WindowArgs) -> Result<Raster<f64>> {
    let dem = read_dem(input)?;
    let (Some(lat), Some(lon)) = (window.center_lat, window.center_lon) else {
        return Ok(dem);
    };
    let (row0, col0, rows, cols) = window_bounds(dem.transform(), dem.shape(), lat, lon, window.window_m)?;
    info!("Window: rows {}..{}, cols {}..{}", row0, row0 + rows, col0, col0 + cols);
    dem.window(row0, col0, rows, cols).context("Failed to extract window")
}

fn load_params(config: Option<&Path>, overrides: ParamArgs) -> Result<CliffParams> {
    let mut params = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => CliffParams::default(),
    };
    overrides.apply(&mut params);
    params.validate().context("Invalid parameters")?;
    Ok(params)
}

fn write_diagnostics(dir: &Path, dem: &Raster<f64>, out: &CliffAwareOutput, seed: u64) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let diag = &out.diagnostics;

    if let Some(gradient) = &diag.gradient {
        write_result(&gradient.magnitude, &dir.join("gradient.tif"))?;
    }
    if let Some(mask) = &diag.mask {
        write_result(&mask.to_raster(dem), &dir.join("cliff_mask.tif"))?;
    }
    if let Some(regions) = &diag.regions {
        write_result(&regions.label_grid(&out.grid), &dir.join("regions.tif"))?;

        let mut rng = StdRng::seed_from_u64(seed);
        let palette = region_palette(regions.region_count(), &mut rng);
        let (rows, cols) = regions.shape();
        write_rgb_tiff(
            &regions.render_rgb(&palette),
            rows,
            cols,
            out.grid.transform(),
            dir.join("regions_rgb.tif"),
        )
        .context("Failed to write regions_rgb.tif")?;
    }

    let report = LinesReport {
        lines: &diag.lines,
        transects: &diag.transects,
        fallback: diag.fallback.as_ref().map(ToString::to_string),
    };
    let file = File::create(dir.join("lines.json")).context("Failed to create lines.json")?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report).context("Failed to write lines.json")?;

    info!("Diagnostics written to {}", dir.display());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster = read_dem(&input)?;
            let (rows, cols) = raster.shape();
            let gt = raster.transform();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", gt.cell_size());
            println!("Origin: ({:.6}, {:.6})", gt.origin_x, gt.origin_y);
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        Commands::Upsample {
            input,
            output,
            config,
            window,
            params,
            diagnostics,
            seed,
        } => {
            let params = load_params(config.as_deref(), params)?;
            let dem = load_window(&input, &window)?;

            let start = Instant::now();
            let pb = spinner("Upsampling...");
            let result = cliff_aware_upsample(&dem, &params).context("Failed to upsample")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();

            let diag = &result.diagnostics;
            match &diag.fallback {
                Some(reason) => warn!("Output is the plain bicubic surface: {}", reason),
                None => info!(
                    "{} cliff lines, {} transects, {} lines dropped ({} strategy)",
                    diag.lines.len(),
                    diag.transect_count(),
                    diag.dropped.total(),
                    params.injection_strategy
                ),
            }
            if diag.excised_pixels > 0 {
                info!("Excised {} pixels", diag.excised_pixels);
            }

            write_result(&result.grid, &output)?;
            if let Some(dir) = &diagnostics {
                write_diagnostics(dir, &dem, &result, seed)?;
            }
            done("Upsampled DEM", &output, elapsed);
        }

        Commands::Quick {
            input,
            output,
            window,
            factor,
            threshold,
        } => {
            let dem = load_window(&input, &window)?;
            let start = Instant::now();
            let result = threshold_resample(&dem, factor, threshold).context("Failed to resample")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Resampled DEM", &output, elapsed);
        }
    }

    Ok(())
}
