use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::layout::TileLayouts;
use crate::error::{Error, Result};
use crate::types::SpatialResolution;

/// Reader parameters suitable for config files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderParams {
    /// Tier whose pixel grid defines the scene rectangle
    pub reference_resolution: SpatialResolution,
    /// Sample value for canvas pixels not covered by any tile
    pub background: u16,
    /// Root of the decode cache; None means the platform cache directory
    pub cache_dir: Option<PathBuf>,
    pub use_cache: bool,
    /// Only assemble these detectors (e.g. ["04", "05"]); None means all
    pub detectors: Option<Vec<String>>,
    pub tile_layouts: TileLayouts,
}

impl Default for ReaderParams {
    fn default() -> Self {
        Self {
            reference_resolution: SpatialResolution::R10M,
            background: 0,
            cache_dir: None,
            use_cache: true,
            detectors: None,
            tile_layouts: TileLayouts::default(),
        }
    }
}

impl ReaderParams {
    /// Load parameters from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn accepts_detector(&self, detector_id: &str) -> bool {
        match &self.detectors {
            Some(list) => list.iter().any(|d| d == detector_id),
            None => true,
        }
    }
}
