#![allow(dead_code)]

use ndarray::Array2;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use s2mosaic::io::decoder::level_dim;
use s2mosaic::io::{DecodeError, Tile, TileGeometry};
use s2mosaic::{GeoPoint, SceneMetadata, SpatialResolution, TileDecoder};

/// In-memory decoder: full-resolution rasters keyed by path. Levels are
/// produced by nearest decimation; unknown paths are missing files.
#[derive(Default)]
pub struct MemoryDecoder {
    rasters: HashMap<PathBuf, Array2<u16>>,
    pub calls: Mutex<Vec<(PathBuf, usize)>>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, raster: Array2<u16>) {
        self.rasters.insert(path.into(), raster);
    }

    /// Constant raster of `cols` x `rows`
    pub fn insert_const<P: Into<PathBuf>>(&mut self, path: P, cols: usize, rows: usize, value: u16) {
        self.insert(path, Array2::from_elem((rows, cols), value));
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl TileDecoder for MemoryDecoder {
    fn decode(&self, path: &Path, level: usize) -> Result<Array2<u16>, DecodeError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((path.to_path_buf(), level));
        }
        let full = self
            .rasters
            .get(path)
            .ok_or_else(|| DecodeError::MissingFile(path.to_path_buf()))?;
        let (rows, cols) = full.dim();
        let step = 1usize << level;
        Ok(Array2::from_shape_fn(
            (level_dim(rows, level), level_dim(cols, level)),
            |(r, c)| full[[r * step, c * step]],
        ))
    }
}

/// c0 TL, c1 BL, c2 BR, c3 TR of a tile spanning latitudes `top`..`bottom`
pub fn corners(top: f64, bottom: f64) -> Vec<GeoPoint> {
    vec![
        GeoPoint::new(top, 10.0),
        GeoPoint::new(bottom, 10.05),
        GeoPoint::new(bottom, 10.35),
        GeoPoint::new(top, 10.3),
    ]
}

/// Tile with one geometry per `(tier, cols, rows)` entry, all at `position`
pub fn tile(
    id: &str,
    detector: &str,
    position: u32,
    tiers: &[(SpatialResolution, usize, usize)],
) -> Tile {
    let mut t = Tile::new(id, detector);
    for &(resolution, cols, rows) in tiers {
        t.geometries.insert(
            resolution,
            TileGeometry::new(resolution, cols, rows).with_position(position),
        );
    }
    let top = 45.0 - position as f64 * 0.1;
    t.corners = corners(top, top - 0.1);
    t
}

pub fn metadata(tiles: Vec<Tile>) -> SceneMetadata {
    SceneMetadata {
        tiles,
        ..Default::default()
    }
}
