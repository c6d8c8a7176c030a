//! I/O layer: product and granule metadata, tile decoders (GDAL, on-disk
//! cache), the product reader, and `writers` for GeoTIFF outputs, world
//! files and JSON sidecars.
pub mod metadata;
pub use metadata::{
    L1bMetadataParser, MetadataError, MetadataParser, SceneMetadata, SpectralBandInfo, Tile,
    TileGeometry,
};

pub mod filenames;

pub mod decoder;
pub use decoder::{DecodeError, TileDecoder};

pub mod gdal;
pub use gdal::{GdalError, GdalTileDecoder};

pub mod cache;
pub use cache::CachingDecoder;

pub mod product;
pub use product::{Product, ProductBand, ProductReader};

pub mod writers;
