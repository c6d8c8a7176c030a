//! Multi-level raster sources.
//!
//! Level 0 is full resolution; every further level halves both dimensions,
//! rounding up. Nothing is cached here: each `level` call decodes again.
//! Wrap the decoder in `io::cache::CachingDecoder` to reuse decoded tiles.
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::cancel::CancellationToken;
use crate::core::mosaic::MosaicSource;
use crate::core::processing::resize::resize_nearest_u16;
use crate::error::{Error, Result};
use crate::io::decoder::{TileDecoder, level_dim};

/// One tile image file and its native pixel size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileImage {
    /// Index of the tile in the scene description
    pub tile_index: usize,
    pub tile_id: String,
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
}

/// A single decoded tile, fitted to the expected size of each level
#[derive(Clone)]
pub struct SingleTileSource {
    image: TileImage,
    decoder: Arc<dyn TileDecoder>,
    num_resolutions: usize,
    background: u16,
}

impl std::fmt::Debug for SingleTileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleTileSource")
            .field("image", &self.image)
            .field("num_resolutions", &self.num_resolutions)
            .field("background", &self.background)
            .finish()
    }
}

impl SingleTileSource {
    pub fn new(image: TileImage, decoder: Arc<dyn TileDecoder>, num_resolutions: usize) -> Self {
        Self {
            image,
            decoder,
            num_resolutions: num_resolutions.max(1),
            background: 0,
        }
    }

    /// Fill value used by `level_or_background`
    pub fn with_background(mut self, background: u16) -> Self {
        self.background = background;
        self
    }

    pub fn image(&self) -> &TileImage {
        &self.image
    }

    pub fn path(&self) -> &Path {
        &self.image.path
    }

    pub fn num_resolutions(&self) -> usize {
        self.num_resolutions
    }

    /// (width, height) of `level`
    pub fn level_size(&self, level: usize) -> (usize, usize) {
        (
            level_dim(self.image.width, level),
            level_dim(self.image.height, level),
        )
    }

    pub fn level(&self, level: usize) -> Result<Array2<u16>> {
        check_level(level, self.num_resolutions)?;
        let raster = self.decoder.decode(&self.image.path, level)?;
        let (width, height) = self.level_size(level);
        let (rows, cols) = raster.dim();
        if rows == height && cols == width {
            return Ok(raster);
        }
        debug!(
            "Tile {} level {}: decoded {}x{}, fitting to {}x{}",
            self.image.tile_id, level, cols, rows, width, height
        );
        resize_nearest_u16(&raster, width, height)
    }

    /// Like `level`, but a tile that cannot be decoded yields a raster of
    /// the background value instead of an error
    pub fn level_or_background(&self, level: usize) -> Result<Array2<u16>> {
        match self.level(level) {
            Err(Error::Decode(e)) => {
                warn!(
                    "Tile {} ({:?}) unavailable at level {}, returning background: {}",
                    self.image.tile_id, self.image.path, level, e
                );
                let (width, height) = self.level_size(level);
                Ok(Array2::from_elem((height, width), self.background))
            }
            other => other,
        }
    }
}

/// Source of one band group's levels
#[derive(Debug, Clone)]
pub enum PyramidSource {
    SingleTile(SingleTileSource),
    Mosaic(MosaicSource),
}

impl PyramidSource {
    pub fn level(&self, level: usize) -> Result<Array2<u16>> {
        self.level_with_cancel(level, &CancellationToken::new())
    }

    /// Like `level`, aborting with `Error::Cancelled` before the next tile
    /// decode once `cancel` is set
    pub fn level_with_cancel(&self, level: usize, cancel: &CancellationToken) -> Result<Array2<u16>> {
        match self {
            PyramidSource::SingleTile(source) => {
                cancel.check()?;
                source.level_or_background(level)
            }
            PyramidSource::Mosaic(source) => source.level_with_cancel(level, cancel),
        }
    }

    pub fn num_resolutions(&self) -> usize {
        match self {
            PyramidSource::SingleTile(source) => source.num_resolutions(),
            PyramidSource::Mosaic(source) => source.num_resolutions(),
        }
    }

    /// (width, height) of the raster `level` returns
    pub fn level_size(&self, level: usize) -> (usize, usize) {
        match self {
            PyramidSource::SingleTile(source) => source.level_size(level),
            PyramidSource::Mosaic(source) => source.level_size(level),
        }
    }

    /// Tile images feeding this source, in composition order
    pub fn tile_images(&self) -> Vec<&TileImage> {
        match self {
            PyramidSource::SingleTile(source) => vec![source.image()],
            PyramidSource::Mosaic(source) => source
                .tiles()
                .iter()
                .filter_map(|t| t.source.as_ref().map(|s| s.image()))
                .collect(),
        }
    }
}

pub(crate) fn check_level(level: usize, num_resolutions: usize) -> Result<()> {
    if level >= num_resolutions {
        return Err(Error::LevelOutOfRange {
            level,
            num_resolutions,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::decoder::DecodeError;

    /// Always returns a full-resolution ramp, ignoring the level
    struct FullResDecoder;

    impl TileDecoder for FullResDecoder {
        fn decode(&self, _path: &Path, _level: usize) -> std::result::Result<Array2<u16>, DecodeError> {
            Ok(Array2::from_shape_fn((40, 30), |(r, c)| (r * 30 + c) as u16))
        }
    }

    fn source() -> SingleTileSource {
        SingleTileSource::new(
            TileImage {
                tile_index: 0,
                tile_id: "T0".into(),
                path: PathBuf::from("t0.jp2"),
                width: 30,
                height: 40,
            },
            Arc::new(FullResDecoder),
            4,
        )
    }

    #[test]
    fn levels_are_fitted_to_pyramid_size() {
        let src = source();
        for n in 0..4 {
            let raster = src.level(n).unwrap();
            let (w, h) = src.level_size(n);
            assert_eq!(raster.dim(), (h, w));
        }
        assert_eq!(src.level_size(3), (4, 5));
    }

    #[test]
    fn level_past_the_pyramid_is_rejected() {
        let src = PyramidSource::SingleTile(source());
        assert!(matches!(
            src.level(4),
            Err(Error::LevelOutOfRange { level: 4, num_resolutions: 4 })
        ));
    }

    #[test]
    fn cancelled_single_tile_does_not_decode() {
        let src = PyramidSource::SingleTile(source());
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(src.level_with_cancel(0, &token), Err(Error::Cancelled)));
    }

    struct MissingDecoder;

    impl TileDecoder for MissingDecoder {
        fn decode(&self, path: &Path, _level: usize) -> std::result::Result<Array2<u16>, DecodeError> {
            Err(DecodeError::MissingFile(path.to_path_buf()))
        }
    }

    #[test]
    fn undecodable_single_tile_is_background() {
        let image = source().image().clone();
        let single = SingleTileSource::new(image, Arc::new(MissingDecoder), 4).with_background(9);
        assert!(matches!(single.level(1), Err(Error::Decode(_))));

        let src = PyramidSource::SingleTile(single);
        let raster = src.level(1).unwrap();
        assert_eq!(raster.dim(), (20, 15));
        assert!(raster.iter().all(|&v| v == 9));
        assert!(matches!(src.level(4), Err(Error::LevelOutOfRange { .. })));
    }
}
