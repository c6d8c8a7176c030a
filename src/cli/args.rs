use clap::Parser;
use std::path::PathBuf;

use s2mosaic::SpatialResolution;

#[derive(Parser)]
#[command(name = "s2mosaic", version, about = "Sentinel-2 L1B detector mosaic reader")]
pub struct CliArgs {
    /// Product metadata file (MTD_SAFL1B.xml), granule metadata file, or product directory
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Print the product structure and exit
    #[arg(long, default_value_t = false)]
    pub info: bool,

    /// Band to export, detector first (e.g. D04B2). Repeatable; default is all bands
    #[arg(short, long = "band")]
    pub bands: Vec<String>,

    /// Pyramid level to read (0 is full resolution)
    #[arg(short, long, default_value_t = 0)]
    pub level: usize,

    /// Output directory for exported rasters
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Tier whose pixel grid defines the scene (overrides the config file)
    #[arg(long, value_enum)]
    pub reference_resolution: Option<SpatialResolution>,

    /// Value of canvas pixels not covered by any tile (overrides the config file)
    #[arg(long)]
    pub background: Option<u16>,

    /// JSON reader configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root directory of the decode cache
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Decode tiles directly, without the on-disk cache
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Compute the NDI45 index for this detector (e.g. 04) instead of exporting bands
    #[arg(long, value_name = "DETECTOR")]
    pub ndi45: Option<String>,

    /// Keep exporting the remaining bands when one fails
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Enable logging
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
