use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while decoding a single tile image
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Tile image not found: {0:?}")]
    MissingFile(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::gdal::GdalError),
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
    #[error("Unexpected raster shape in {path:?}: {reason}")]
    Shape { path: PathBuf, reason: String },
}

/// Decodes one tile file into a 16-bit sample buffer of shape (rows, cols).
///
/// `level` asks for the pyramid level of the tile (each level halves both
/// dimensions, rounding up). Implementations may ignore it and return the full
/// resolution image; callers fit the result to the expected level size.
pub trait TileDecoder: Send + Sync {
    fn decode(&self, path: &Path, level: usize) -> Result<Array2<u16>, DecodeError>;
}

impl<T: TileDecoder + ?Sized> TileDecoder for Arc<T> {
    fn decode(&self, path: &Path, level: usize) -> Result<Array2<u16>, DecodeError> {
        (**self).decode(path, level)
    }
}

/// Size of `full` at pyramid `level`
pub fn level_dim(full: usize, level: usize) -> usize {
    let scale = 1usize << level;
    full.div_ceil(scale).max(1)
}
