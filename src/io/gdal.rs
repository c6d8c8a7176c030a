use gdal::raster::ResampleAlg;
use gdal::{Dataset, errors::GdalError as GdalCrateError};
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::io::decoder::{DecodeError, TileDecoder, level_dim};

/// Errors encountered when using GDAL
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {0}x{1}, got {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),
}

/// Tile decoder backed by GDAL (JPEG2000 via OpenJPEG/JP2KAK, GeoTIFF, ...)
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalTileDecoder;

impl GdalTileDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Read band 1 of `path` decimated to pyramid `level`, as (rows, cols)
    pub fn read_level(path: &Path, level: usize) -> Result<Array2<u16>, GdalError> {
        let dataset = Dataset::open(path)?;
        if dataset.raster_count() == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let (size_x, size_y) = dataset.raster_size();
        let (out_x, out_y) = (level_dim(size_x, level), level_dim(size_y, level));
        debug!(
            "GDAL read {:?}: {}x{} -> {}x{} (level {})",
            path, size_x, size_y, out_x, out_y, level
        );
        let band = dataset.rasterband(1)?;
        // GDAL picks the closest JPEG2000 reduction / overview for the buffer size
        let buf = band.read_as::<u16>(
            (0, 0),
            (size_x, size_y),
            (out_x, out_y),
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let (cols, rows) = buf.shape();
        Array2::from_shape_vec((rows, cols), buf.data().to_vec())
            .map_err(|_| GdalError::DimensionMismatch(out_x, out_y, cols, rows))
    }
}

impl TileDecoder for GdalTileDecoder {
    fn decode(&self, path: &Path, level: usize) -> Result<Array2<u16>, DecodeError> {
        if !path.is_file() {
            return Err(DecodeError::MissingFile(path.to_path_buf()));
        }
        Ok(Self::read_level(path, level)?)
    }
}
