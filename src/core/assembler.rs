//! Builds one pyramid source per (physical band, detector) group.
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::geocoding::GeoCoding;
use crate::core::layout::TileLayouts;
use crate::core::mosaic::{MosaicCompositor, MosaicSource, MosaicTile};
use crate::core::pyramid::{PyramidSource, SingleTileSource, TileImage};
use crate::core::scene::SceneDescription;
use crate::error::{Error, Result};
use crate::io::decoder::TileDecoder;
use crate::io::metadata::{SceneMetadata, SpectralBandInfo};
use crate::types::BandGroupKey;

/// Image files of one band group, keyed by tile id. Only files found on
/// disk are listed; the other tiles of the detector strip stay background.
#[derive(Debug, Clone)]
pub struct BandDescriptor {
    pub key: BandGroupKey,
    pub info: SpectralBandInfo,
    pub tile_files: BTreeMap<String, PathBuf>,
}

/// A band group ready for level requests
#[derive(Debug, Clone)]
pub struct AssembledBand {
    pub key: BandGroupKey,
    pub info: SpectralBandInfo,
    pub source: PyramidSource,
    /// Geocoding of the group's detector; shared by all its bands
    pub geocoding: Option<Arc<GeoCoding>>,
}

pub struct BandAssembler<'a> {
    product_name: String,
    metadata: &'a SceneMetadata,
    scene: Arc<SceneDescription>,
    decoder: Arc<dyn TileDecoder>,
    layouts: TileLayouts,
    background: u16,
}

impl<'a> BandAssembler<'a> {
    pub fn new(
        product_name: impl Into<String>,
        metadata: &'a SceneMetadata,
        scene: Arc<SceneDescription>,
        decoder: Arc<dyn TileDecoder>,
    ) -> Self {
        Self {
            product_name: product_name.into(),
            metadata,
            scene,
            decoder,
            layouts: TileLayouts::default(),
            background: 0,
        }
    }

    pub fn with_layouts(mut self, layouts: TileLayouts) -> Self {
        self.layouts = layouts;
        self
    }

    pub fn with_background(mut self, background: u16) -> Self {
        self.background = background;
        self
    }

    pub fn assemble(
        &self,
        descriptors: &[BandDescriptor],
        geocodings: &HashMap<String, Arc<GeoCoding>>,
    ) -> Result<BTreeMap<BandGroupKey, AssembledBand>> {
        let mut bands = BTreeMap::new();
        for descriptor in descriptors {
            if descriptor.tile_files.is_empty() {
                warn!("{}: no image files, band skipped", descriptor.key);
                continue;
            }
            if bands.contains_key(&descriptor.key) {
                warn!("{}: duplicate band group, keeping the first", descriptor.key);
                continue;
            }
            let source = self.build_source(descriptor)?;
            let geocoding = geocodings.get(&descriptor.key.detector_id).cloned();
            if geocoding.is_none() {
                debug!("{}: no geocoding for detector {}", descriptor.key, descriptor.key.detector_id);
            }
            bands.insert(
                descriptor.key.clone(),
                AssembledBand {
                    key: descriptor.key.clone(),
                    info: descriptor.info.clone(),
                    source,
                    geocoding,
                },
            );
        }

        if bands.is_empty() {
            return Err(Error::NoBandsFound {
                product: self.product_name.clone(),
            });
        }
        info!("Assembled {} band groups", bands.len());
        Ok(bands)
    }

    fn build_source(&self, descriptor: &BandDescriptor) -> Result<PyramidSource> {
        let resolution = descriptor.info.native_resolution();
        let num_resolutions = self.layouts.get(resolution).num_resolutions;
        let ratio = resolution.ratio_to(self.scene.reference_resolution());

        // The whole detector strip, plus any listed tile outside it
        let mut members = self.scene.detector_tiles(&descriptor.key.detector_id);
        for tile_id in descriptor.tile_files.keys() {
            let tile_index = self
                .scene
                .tile_index(tile_id)
                .ok_or_else(|| Error::UnknownTileId(tile_id.clone()))?;
            if !members.contains(&tile_index) {
                members.push(tile_index);
            }
        }
        members.sort_by_key(|&i| (self.scene.position_of(i), i));

        let mut tiles = Vec::with_capacity(members.len());
        for tile_index in members {
            let tile = self.metadata.tiles.get(tile_index).ok_or(Error::UnknownTile {
                index: tile_index,
                count: self.metadata.tiles.len(),
            })?;
            let geometry = tile.geometry(resolution);
            let (width, height) = match geometry {
                Some(geom) => (geom.num_cols, geom.num_rows_detector),
                None => {
                    // Only the file is missing; size the gap from the reference tier
                    let rect = self.scene.tile_rectangle(tile_index)?;
                    let native = |d: usize| ((d as f64 / ratio).ceil() as usize).max(1);
                    (native(rect.width), native(rect.height))
                }
            };
            match descriptor.tile_files.get(&tile.id) {
                Some(path) => {
                    if geometry.is_none() {
                        return Err(Error::layout(
                            &tile.id,
                            format!("no geometry for band tier {}", resolution),
                        ));
                    }
                    let image = TileImage {
                        tile_index,
                        tile_id: tile.id.clone(),
                        path: path.clone(),
                        width,
                        height,
                    };
                    let source = SingleTileSource::new(image, Arc::clone(&self.decoder), num_resolutions)
                        .with_background(self.background);
                    tiles.push(MosaicTile::present(source));
                }
                None => {
                    debug!("{}: no file for tile {}, left as background", descriptor.key, tile.id);
                    tiles.push(MosaicTile::missing(tile_index, tile.id.clone(), width, height));
                }
            }
        }

        let scene_rectangle = self.scene.scene_rectangle();
        if let [only] = tiles.as_slice() {
            if let Some(source) = &only.source {
                if self.scene.tile_rectangle(only.tile_index)? == scene_rectangle {
                    debug!("{}: single tile {}", descriptor.key, only.tile_id);
                    return Ok(PyramidSource::SingleTile(source.clone()));
                }
            }
        }

        debug!(
            "{}: mosaic of {} tiles ({} with files)",
            descriptor.key,
            tiles.len(),
            descriptor.tile_files.len()
        );
        let compositor = MosaicCompositor {
            scene_rectangle,
            reference: self.scene.reference_resolution(),
            band_resolution: resolution,
            background: self.background,
        };
        Ok(PyramidSource::Mosaic(MosaicSource::new(
            descriptor.key.clone(),
            Arc::clone(&self.scene),
            tiles,
            compositor,
            num_resolutions,
        )))
    }
}
