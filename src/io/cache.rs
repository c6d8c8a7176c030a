//! Per-product decode cache.
//!
//! Decoded tile levels are stored as 16-bit grayscale TIFFs under
//! `<cache root>/<product name>/`. New entries are written to a temporary file
//! in the same directory and then renamed into place, so concurrent first
//! decodes of the same tile leave one complete, content-identical entry.
use ndarray::Array2;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{TiffEncoder, colortype};
use tracing::{debug, warn};

use crate::io::decoder::{DecodeError, TileDecoder};

/// Default cache root: `<platform cache dir>/s2mosaic`
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("s2mosaic")
}

/// Decorator caching the output of another `TileDecoder` on disk
pub struct CachingDecoder<D: TileDecoder> {
    inner: D,
    dir: PathBuf,
}

impl<D: TileDecoder> CachingDecoder<D> {
    /// Cache for `product_name` under `cache_root`; creates the directory.
    pub fn new(inner: D, cache_root: &Path, product_name: &str) -> Result<Self, DecodeError> {
        let dir = cache_root.join(product_name);
        fs::create_dir_all(&dir)?;
        Ok(Self { inner, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, path: &Path, level: usize) -> PathBuf {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tile".to_string());
        self.dir.join(format!("{}_L{}.tif", stem, level))
    }

    fn read_entry(entry: &Path) -> Result<Array2<u16>, DecodeError> {
        let mut decoder = Decoder::new(BufReader::new(File::open(entry)?))?;
        let (width, height) = decoder.dimensions()?;
        match decoder.read_image()? {
            DecodingResult::U16(data) => {
                Array2::from_shape_vec((height as usize, width as usize), data).map_err(|e| {
                    DecodeError::Shape {
                        path: entry.to_path_buf(),
                        reason: e.to_string(),
                    }
                })
            }
            _ => Err(DecodeError::Shape {
                path: entry.to_path_buf(),
                reason: "cache entry is not 16-bit".to_string(),
            }),
        }
    }

    fn write_entry(&self, entry: &Path, raster: &Array2<u16>) -> Result<(), DecodeError> {
        let (rows, cols) = raster.dim();
        let data: Vec<u16> = raster.iter().copied().collect();
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            let mut encoder = TiffEncoder::new(tmp.as_file_mut())?;
            encoder.write_image::<colortype::Gray16>(cols as u32, rows as u32, &data)?;
        }
        tmp.persist(entry).map_err(|e| e.error)?;
        Ok(())
    }
}

impl<D: TileDecoder> TileDecoder for CachingDecoder<D> {
    fn decode(&self, path: &Path, level: usize) -> Result<Array2<u16>, DecodeError> {
        let entry = self.entry_path(path, level);
        if entry.is_file() {
            match Self::read_entry(&entry) {
                Ok(raster) => {
                    debug!("Cache hit: {:?}", entry);
                    return Ok(raster);
                }
                Err(e) => warn!("Ignoring unreadable cache entry {:?}: {}", entry, e),
            }
        }

        let raster = self.inner.decode(path, level)?;
        if let Err(e) = self.write_entry(&entry, &raster) {
            warn!("Could not write cache entry {:?}: {}", entry, e);
        }
        Ok(raster)
    }
}
