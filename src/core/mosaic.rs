//! Mosaic of the tiles of one band group.
//!
//! For a level `n`, each tile is decoded at level `n` and placed at its scene
//! offset scaled by `1 / (2^n * ratio)` (floored), where `ratio` is the band's
//! pixel size over the reference pixel size. Tiles are laid onto a canvas
//! filled with the background value; the first tile to cover a pixel keeps
//! it. The canvas is then border-extended (right/bottom) or cropped to the
//! scene size at that level and, for bands not at the reference tier,
//! rescaled with nearest-neighbour to the band's native scene size. Every
//! tile of the detector strip takes part, with or without an image file, so
//! border extension only covers rounding loss.
use ndarray::{Array2, Zip, s};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::cancel::CancellationToken;
use crate::core::processing::padding::fit_border_copy;
use crate::core::processing::resize::resize_nearest_u16;
use crate::core::pyramid::{SingleTileSource, check_level};
use crate::core::scene::SceneDescription;
use crate::error::Result;
use crate::io::decoder::level_dim;
use crate::types::{BandGroupKey, Rectangle, SpatialResolution};

/// One tile's contribution to a level: its reference-tier scene rectangle,
/// its expected level size and the decoded raster, if decoding succeeded
#[derive(Debug, Clone)]
pub struct LevelTile {
    pub tile_id: String,
    pub scene_rect: Rectangle,
    /// (width, height) at the requested level
    pub size: (usize, usize),
    pub raster: Option<Array2<u16>>,
}

/// Composites level rasters of one band group into a scene-aligned canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicCompositor {
    pub scene_rectangle: Rectangle,
    pub reference: SpatialResolution,
    pub band_resolution: SpatialResolution,
    pub background: u16,
}

impl MosaicCompositor {
    /// Band pixel size over reference pixel size
    pub fn resolution_ratio(&self) -> f64 {
        self.band_resolution.ratio_to(self.reference)
    }

    fn level_scale(&self, level: usize) -> f64 {
        (1u64 << level) as f64 * self.resolution_ratio()
    }

    /// Offset of a reference-tier rectangle at `level`, floored
    pub fn level_offset(&self, rect: &Rectangle, level: usize) -> (usize, usize) {
        let scale = self.level_scale(level);
        (
            (rect.x as f64 / scale).floor() as usize,
            (rect.y as f64 / scale).floor() as usize,
        )
    }

    /// Scene size at `level` before the native rescale: ceil(W / (2^n * ratio))
    pub fn padded_size(&self, level: usize) -> (usize, usize) {
        let scale = self.level_scale(level);
        let dim = |d: usize| ((d as f64 / scale).ceil() as usize).max(1);
        (
            dim(self.scene_rectangle.width),
            dim(self.scene_rectangle.height),
        )
    }

    /// Native scene size of the band at `level`
    pub fn native_size(&self, level: usize) -> (usize, usize) {
        if self.band_resolution == self.reference {
            return self.padded_size(level);
        }
        let ratio = self.resolution_ratio();
        let native = |d: usize| ((d as f64 / ratio).floor() as usize).max(1);
        (
            level_dim(native(self.scene_rectangle.width), level),
            level_dim(native(self.scene_rectangle.height), level),
        )
    }

    pub fn compose(&self, tiles: &[LevelTile], level: usize) -> Result<Array2<u16>> {
        let placed: Vec<((usize, usize), &LevelTile)> = tiles
            .iter()
            .map(|t| (self.level_offset(&t.scene_rect, level), t))
            .collect();

        let canvas_width = placed
            .iter()
            .map(|((x, _), t)| x + t.size.0)
            .max()
            .unwrap_or(0);
        let canvas_height = placed
            .iter()
            .map(|((_, y), t)| y + t.size.1)
            .max()
            .unwrap_or(0);

        let mut canvas = Array2::from_elem((canvas_height, canvas_width), self.background);
        let mut covered = Array2::from_elem((canvas_height, canvas_width), false);

        for ((x, y), tile) in &placed {
            let Some(raster) = &tile.raster else {
                continue;
            };
            let (rows, cols) = raster.dim();
            let rows = rows.min(canvas_height - y);
            let cols = cols.min(canvas_width - x);
            let mut overlaps = 0usize;
            Zip::from(canvas.slice_mut(s![*y..y + rows, *x..x + cols]))
                .and(covered.slice_mut(s![*y..y + rows, *x..x + cols]))
                .and(raster.slice(s![..rows, ..cols]))
                .for_each(|dst, seen, &value| {
                    if *seen {
                        overlaps += 1;
                    } else {
                        *dst = value;
                        *seen = true;
                    }
                });
            if overlaps > 0 {
                warn!(
                    "Tile {} overlaps earlier tiles on {} pixels at level {}; keeping the earlier samples",
                    tile.tile_id, overlaps, level
                );
            }
        }

        let (width, height) = self.padded_size(level);
        debug!(
            "Level {} canvas {}x{}, scene {}x{} ({} -> {})",
            level, canvas_width, canvas_height, width, height, self.band_resolution, self.reference
        );

        let padded = fit_border_copy(canvas.view(), width, height);
        if self.band_resolution == self.reference {
            return Ok(padded);
        }
        let (native_width, native_height) = self.native_size(level);
        resize_nearest_u16(&padded, native_width, native_height)
    }
}

/// One tile of a detector strip. `source` is None when the band has no
/// image file for the tile; its area then stays background.
#[derive(Debug, Clone)]
pub struct MosaicTile {
    pub tile_index: usize,
    pub tile_id: String,
    /// Native size at level 0, in band pixels
    pub width: usize,
    pub height: usize,
    pub source: Option<SingleTileSource>,
}

impl MosaicTile {
    pub fn present(source: SingleTileSource) -> Self {
        let image = source.image();
        Self {
            tile_index: image.tile_index,
            tile_id: image.tile_id.clone(),
            width: image.width,
            height: image.height,
            source: Some(source),
        }
    }

    pub fn missing(tile_index: usize, tile_id: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            tile_index,
            tile_id: tile_id.into(),
            width,
            height,
            source: None,
        }
    }

    /// (width, height) of `level`
    pub fn level_size(&self, level: usize) -> (usize, usize) {
        (level_dim(self.width, level), level_dim(self.height, level))
    }
}

/// Lazily composited mosaic of one (band, detector) group
#[derive(Debug, Clone)]
pub struct MosaicSource {
    key: BandGroupKey,
    scene: Arc<SceneDescription>,
    tiles: Vec<MosaicTile>,
    compositor: MosaicCompositor,
    num_resolutions: usize,
}

impl MosaicSource {
    /// `tiles` must be ordered by ascending position; that order decides
    /// which tile wins an overlap. Tiles without a file still size the canvas.
    pub fn new(
        key: BandGroupKey,
        scene: Arc<SceneDescription>,
        tiles: Vec<MosaicTile>,
        compositor: MosaicCompositor,
        num_resolutions: usize,
    ) -> Self {
        Self {
            key,
            scene,
            tiles,
            compositor,
            num_resolutions: num_resolutions.max(1),
        }
    }

    pub fn key(&self) -> &BandGroupKey {
        &self.key
    }

    pub fn tiles(&self) -> &[MosaicTile] {
        &self.tiles
    }

    pub fn compositor(&self) -> &MosaicCompositor {
        &self.compositor
    }

    pub fn num_resolutions(&self) -> usize {
        self.num_resolutions
    }

    pub fn level_size(&self, level: usize) -> (usize, usize) {
        self.compositor.native_size(level)
    }

    pub fn level(&self, level: usize) -> Result<Array2<u16>> {
        self.level_with_cancel(level, &CancellationToken::new())
    }

    pub fn level_with_cancel(&self, level: usize, cancel: &CancellationToken) -> Result<Array2<u16>> {
        check_level(level, self.num_resolutions)?;
        let mut level_tiles = Vec::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            cancel.check()?;
            let scene_rect = self.scene.tile_rectangle(tile.tile_index)?;
            let raster = match &tile.source {
                Some(source) => match source.level(level) {
                    Ok(raster) => Some(raster),
                    Err(e) => {
                        warn!(
                            "{}: tile {} ({:?}) unavailable at level {}, leaving background: {}",
                            self.key,
                            tile.tile_id,
                            source.path(),
                            level,
                            e
                        );
                        None
                    }
                },
                None => None,
            };
            level_tiles.push(LevelTile {
                tile_id: tile.tile_id.clone(),
                scene_rect,
                size: tile.level_size(level),
                raster,
            });
        }
        self.compositor.compose(&level_tiles, level)
    }
}
