//! Scene layout: absolute pixel placement of every tile at the reference tier.
//!
//! Tiles of one detector form a strip. Within a strip, tiles are ordered by
//! ascending `position` and stacked top to bottom, each starting where the
//! previous one ends (`num_rows_detector` rows). All strips share the scene
//! origin; the scene rectangle is the union of every tile rectangle.
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io::metadata::SceneMetadata;
use crate::types::{Rectangle, SpatialResolution};

#[derive(Debug, Clone)]
pub struct SceneDescription {
    reference: SpatialResolution,
    scene_rectangle: Rectangle,
    tile_ids: Vec<String>,
    detector_ids: Vec<String>,
    positions: Vec<u32>,
    tile_rectangles: Vec<Rectangle>,
    tile_index: HashMap<String, usize>,
}

impl SceneDescription {
    /// Compute the placement of all tiles of `metadata` at tier `reference`
    pub fn create(metadata: &SceneMetadata, reference: SpatialResolution) -> Result<Self> {
        if metadata.tiles.is_empty() {
            return Err(Error::layout("<none>", "product has no tiles"));
        }

        let count = metadata.tiles.len();
        let mut tile_index = HashMap::with_capacity(count);
        let mut strips: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut positions = Vec::with_capacity(count);

        for (index, tile) in metadata.tiles.iter().enumerate() {
            if tile_index.insert(tile.id.clone(), index).is_some() {
                return Err(Error::layout(&tile.id, "duplicate tile id"));
            }
            let geom = tile.geometry(reference).ok_or_else(|| {
                Error::layout(&tile.id, format!("no geometry for reference tier {}", reference))
            })?;
            let position = geom.position.ok_or_else(|| {
                Error::layout(&tile.id, format!("missing position at tier {}", reference))
            })?;
            if geom.num_cols == 0 || geom.num_rows_detector == 0 {
                return Err(Error::layout(&tile.id, "empty tile geometry"));
            }
            positions.push(position);
            strips.entry(tile.detector_id.as_str()).or_default().push(index);
        }

        let mut tile_rectangles = vec![Rectangle::default(); count];
        let mut scene_rectangle = Rectangle::default();

        for (detector, mut members) in strips {
            members.sort_by_key(|&i| positions[i]);
            for pair in members.windows(2) {
                if positions[pair[0]] == positions[pair[1]] {
                    return Err(Error::layout(
                        &metadata.tiles[pair[1]].id,
                        format!(
                            "position {} used twice in detector {}",
                            positions[pair[1]], detector
                        ),
                    ));
                }
            }

            let strip_width = metadata.tiles[members[0]]
                .geometry(reference)
                .map(|g| g.num_cols)
                .unwrap_or(0);
            let mut y = 0;
            for &i in &members {
                let tile = &metadata.tiles[i];
                let geom = tile
                    .geometry(reference)
                    .ok_or_else(|| Error::layout(&tile.id, "geometry vanished"))?;
                if geom.num_cols != strip_width {
                    return Err(Error::layout(
                        &tile.id,
                        format!(
                            "width {} differs from strip width {} in detector {}: tiling is not rectangular",
                            geom.num_cols, strip_width, detector
                        ),
                    ));
                }
                let rect = Rectangle::new(0, y, geom.num_cols, geom.num_rows_detector);
                y += geom.num_rows_detector;
                tile_rectangles[i] = rect;
                scene_rectangle = scene_rectangle.union(&rect);
            }
        }

        let scene = Self {
            reference,
            scene_rectangle,
            tile_ids: metadata.tiles.iter().map(|t| t.id.clone()).collect(),
            detector_ids: metadata.tiles.iter().map(|t| t.detector_id.clone()).collect(),
            positions,
            tile_rectangles,
            tile_index,
        };
        debug!("Scene description: {}", scene);
        Ok(scene)
    }

    pub fn reference_resolution(&self) -> SpatialResolution {
        self.reference
    }

    /// Total scene extent at the reference tier
    pub fn scene_rectangle(&self) -> Rectangle {
        self.scene_rectangle
    }

    pub fn tile_rectangle(&self, tile_index: usize) -> Result<Rectangle> {
        self.tile_rectangles
            .get(tile_index)
            .copied()
            .ok_or(Error::UnknownTile {
                index: tile_index,
                count: self.tile_rectangles.len(),
            })
    }

    pub fn tile_index(&self, tile_id: &str) -> Option<usize> {
        self.tile_index.get(tile_id).copied()
    }

    /// Rectangle of a tile looked up by id
    pub fn tile_rectangle_by_id(&self, tile_id: &str) -> Result<Rectangle> {
        let index = self
            .tile_index(tile_id)
            .ok_or_else(|| Error::UnknownTileId(tile_id.to_string()))?;
        self.tile_rectangle(index)
    }

    pub fn tile_ids(&self) -> &[String] {
        &self.tile_ids
    }

    pub fn tile_count(&self) -> usize {
        self.tile_ids.len()
    }

    pub fn detector_of(&self, tile_index: usize) -> Option<&str> {
        self.detector_ids.get(tile_index).map(String::as_str)
    }

    pub fn position_of(&self, tile_index: usize) -> Option<u32> {
        self.positions.get(tile_index).copied()
    }

    /// Tile indices of `detector_id`, ordered by ascending position
    pub fn detector_tiles(&self, detector_id: &str) -> Vec<usize> {
        let mut members: Vec<usize> = (0..self.tile_count())
            .filter(|&i| self.detector_ids[i] == detector_id)
            .collect();
        members.sort_by_key(|&i| self.positions[i]);
        members
    }

    /// Distinct detector ids, sorted
    pub fn detector_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.detector_ids.clone();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl fmt::Display for SceneDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scene {} at {} ({} tiles)",
            self.scene_rectangle,
            self.reference,
            self.tile_count()
        )?;
        for (i, id) in self.tile_ids.iter().enumerate() {
            writeln!(
                f,
                "  #{} {} D{} pos={} {}",
                i, id, self.detector_ids[i], self.positions[i], self.tile_rectangles[i]
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::metadata::{Tile, TileGeometry};

    fn tile(id: &str, detector: &str, position: u32, cols: usize, rows: usize) -> Tile {
        let mut t = Tile::new(id, detector);
        t.geometries.insert(
            SpatialResolution::R10M,
            TileGeometry::new(SpatialResolution::R10M, cols, rows).with_position(position),
        );
        t
    }

    fn metadata(tiles: Vec<Tile>) -> SceneMetadata {
        SceneMetadata {
            tiles,
            ..Default::default()
        }
    }

    #[test]
    fn three_tiles_stack_along_the_strip() {
        // Declared out of order on purpose: placement follows position
        let meta = metadata(vec![
            tile("T2", "01", 2, 100, 2000),
            tile("T0", "01", 0, 100, 2000),
            tile("T1", "01", 1, 100, 2000),
        ]);
        let scene = SceneDescription::create(&meta, SpatialResolution::R10M).unwrap();

        assert_eq!(scene.scene_rectangle(), Rectangle::new(0, 0, 100, 6000));
        let index = scene.tile_index("T1").unwrap();
        assert_eq!(index, 2);
        assert_eq!(
            scene.tile_rectangle(index).unwrap(),
            Rectangle::new(0, 2000, 100, 2000)
        );
        assert_eq!(scene.detector_tiles("01"), vec![1, 2, 0]);
    }

    #[test]
    fn detectors_share_the_scene_origin() {
        let meta = metadata(vec![
            tile("A0", "01", 0, 100, 50),
            tile("A1", "01", 1, 100, 50),
            tile("B0", "02", 7, 120, 60),
        ]);
        let scene = SceneDescription::create(&meta, SpatialResolution::R10M).unwrap();
        assert_eq!(scene.tile_rectangle_by_id("B0").unwrap(), Rectangle::new(0, 0, 120, 60));
        assert_eq!(scene.scene_rectangle(), Rectangle::new(0, 0, 120, 100));
        assert_eq!(scene.detector_ids(), vec!["01".to_string(), "02".to_string()]);
    }

    #[test]
    fn unknown_index_is_reported() {
        let meta = metadata(vec![tile("T0", "01", 0, 10, 10)]);
        let scene = SceneDescription::create(&meta, SpatialResolution::R10M).unwrap();
        assert!(matches!(
            scene.tile_rectangle(5),
            Err(Error::UnknownTile { index: 5, count: 1 })
        ));
    }

    #[test]
    fn missing_position_is_a_layout_error() {
        let mut t = tile("T0", "01", 0, 10, 10);
        t.geometries.get_mut(&SpatialResolution::R10M).unwrap().position = None;
        let result = SceneDescription::create(&metadata(vec![t]), SpatialResolution::R10M);
        assert!(matches!(result, Err(Error::InvalidLayout { .. })));
    }

    #[test]
    fn duplicate_positions_are_a_layout_error() {
        let meta = metadata(vec![tile("T0", "01", 3, 10, 10), tile("T1", "01", 3, 10, 10)]);
        let result = SceneDescription::create(&meta, SpatialResolution::R10M);
        assert!(matches!(result, Err(Error::InvalidLayout { tile_id, .. }) if tile_id == "T1"));
    }

    #[test]
    fn ragged_strip_is_a_layout_error() {
        let meta = metadata(vec![tile("T0", "01", 0, 10, 10), tile("T1", "01", 1, 12, 10)]);
        assert!(SceneDescription::create(&meta, SpatialResolution::R10M).is_err());
    }

    #[test]
    fn missing_reference_tier_is_a_layout_error() {
        let meta = metadata(vec![tile("T0", "01", 0, 10, 10)]);
        assert!(SceneDescription::create(&meta, SpatialResolution::R20M).is_err());
    }
}
