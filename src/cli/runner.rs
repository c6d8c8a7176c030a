use std::path::{Path, PathBuf};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use s2mosaic::api::{compute_ndi45, export_bands, export_ndi45, open_product};
use s2mosaic::{Product, ReaderParams};

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s2mosaic=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config file first, then command line overrides
fn reader_params(args: &CliArgs) -> Result<ReaderParams, AppError> {
    let mut params = match &args.config {
        Some(path) => ReaderParams::from_json_file(path)?,
        None => ReaderParams::default(),
    };
    if let Some(resolution) = args.reference_resolution {
        params.reference_resolution = resolution;
    }
    if let Some(background) = args.background {
        params.background = background;
    }
    if let Some(dir) = &args.cache_dir {
        params.cache_dir = Some(dir.clone());
    }
    if args.no_cache {
        params.use_cache = false;
    }
    Ok(params)
}

fn output_dir(args: &CliArgs) -> Result<PathBuf, AppError> {
    args.output_dir.clone().ok_or(AppError::MissingArgument {
        arg: "--output-dir".to_string(),
    })
}

fn run_ndi45(product: &Product, detector: &str, level: usize, out: &Path) -> Result<(), AppError> {
    let result = compute_ndi45(product, detector, level)?;
    let files = export_ndi45(product, &result, out)?;
    for f in &files {
        info!("Wrote {:?}", f.raster);
    }
    Ok(())
}

fn run_export(product: &Product, args: &CliArgs, out: &Path) -> Result<(), AppError> {
    let total = if args.bands.is_empty() {
        product.bands.len()
    } else {
        args.bands.len()
    };
    info!(
        "Exporting {} band(s) at level {} to {:?}",
        total, args.level, out
    );
    let report = export_bands(product, &args.bands, args.level, out, args.continue_on_error)?;

    info!("Export complete!");
    info!("Exported: {}", report.exported);
    info!("Errors: {}", report.errors);
    if report.errors > 0 {
        return Err(AppError::PartialExport {
            errors: report.errors,
            total,
        });
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        init_logging();
    }

    let input = args.input.clone().ok_or(AppError::MissingArgument {
        arg: "--input".to_string(),
    })?;
    let params = reader_params(&args)?;
    info!("Opening {:?} (reference {})", input, params.reference_resolution);
    let product = open_product(&input, &params)?;

    if args.info {
        print!("{}", product);
        return Ok(());
    }

    let out = output_dir(&args)?;
    if let Some(detector) = &args.ndi45 {
        if !args.bands.is_empty() {
            warn!("--band is ignored when --ndi45 is given");
        }
        run_ndi45(&product, detector, args.level, &out)?;
    } else {
        run_export(&product, &args, &out)?;
    }
    Ok(())
}
