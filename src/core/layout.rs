use serde::{Deserialize, Serialize};

use crate::types::SpatialResolution;

/// Static pixel geometry of one resolution tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLayout {
    /// Full image width in pixels
    pub width: usize,
    /// Full image height in pixels
    pub height: usize,
    pub tile_width: usize,
    pub tile_height: usize,
    pub num_x_tiles: usize,
    pub num_y_tiles: usize,
    /// Number of pyramid levels, level 0 included
    pub num_resolutions: usize,
    pub bits_per_sample: u8,
}

impl TileLayout {
    pub const fn single(width: usize, height: usize, num_resolutions: usize) -> Self {
        Self {
            width,
            height,
            tile_width: width,
            tile_height: height,
            num_x_tiles: 1,
            num_y_tiles: 1,
            num_resolutions,
            bits_per_sample: 15,
        }
    }
}

/// Granule image layouts of an L1B product, indexed by tier
pub const L1B_TILE_LAYOUTS: [TileLayout; 3] = [
    TileLayout::single(2552, 2304, 6),
    TileLayout::single(1276, 1152, 6),
    TileLayout::single(425, 384, 6),
];

/// Per-tier layouts, overridable from the reader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLayouts {
    pub r10m: TileLayout,
    pub r20m: TileLayout,
    pub r60m: TileLayout,
}

impl Default for TileLayouts {
    fn default() -> Self {
        Self {
            r10m: L1B_TILE_LAYOUTS[0],
            r20m: L1B_TILE_LAYOUTS[1],
            r60m: L1B_TILE_LAYOUTS[2],
        }
    }
}

impl TileLayouts {
    pub fn get(&self, resolution: SpatialResolution) -> &TileLayout {
        match resolution {
            SpatialResolution::R10M => &self.r10m,
            SpatialResolution::R20M => &self.r20m,
            SpatialResolution::R60M => &self.r60m,
        }
    }

    /// Maximum level count over all tiers
    pub fn max_resolutions(&self) -> usize {
        SpatialResolution::ALL
            .iter()
            .map(|r| self.get(*r).num_resolutions)
            .max()
            .unwrap_or(1)
    }
}
