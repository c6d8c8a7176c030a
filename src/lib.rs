#![doc = r#"
s2mosaic: scene mosaics and multi-resolution pyramids for tiled, multi-detector
satellite products (Sentinel-2 MSI Level-1B).

An L1B product delivers every spectral band as many small granule images,
one strip of granules per detector. This crate places every granule in a
common scene grid, composes one mosaic per (physical band, detector) at any
pyramid level, attaches tie-point geocoding built from the granule corner
coordinates, and exports band levels as GeoTIFFs. It powers the `s2mosaic`
CLI and can be embedded in your own Rust applications.

Requirements
------------
- GDAL development headers and runtime with a JPEG2000 driver.
- Rust 2024 edition toolchain.

Quick start: open a product and export a band
---------------------------------------------
```rust,no_run
use std::path::Path;
use s2mosaic::{api, ReaderParams, SpatialResolution};

fn main() -> s2mosaic::Result<()> {
    let params = ReaderParams {
        reference_resolution: SpatialResolution::R10M,
        ..Default::default()
    };
    let product = api::open_product(Path::new("/data/S2A_OPER_MTD_SAFL1B.xml"), &params)?;
    println!("{}", product);

    let raster = api::read_band_level(&product, "D04B2", 2)?;
    println!("level 2 is {}x{}", raster.ncols(), raster.nrows());

    api::export_band_level(&product, "D04B2", 2, Path::new("/out/D04B2_L2.tif"))?;
    Ok(())
}
```

Custom decoders
---------------
Tile decoding goes through the [`TileDecoder`] trait. The default reader
uses GDAL behind an on-disk cache; tests and alternative backends can pass
their own implementation to [`api::open_product_with_decoder`].

Error handling
--------------
All public functions return `s2mosaic::Result<T>`; match on
[`Error`] to handle specific cases such as an invalid tile layout or a
level outside the pyramid.

Useful modules
--------------
- [`api`]: high-level entry points.
- [`core`]: scene layout, geocoding, mosaic composition and band assembly.
- [`io`]: metadata parsing, tile decoding and output writers.
- [`types`]: resolution tiers, rectangles and band keys.
- [`error`]: crate-level `Error` and `Result`.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
pub use crate::core::assembler::{AssembledBand, BandAssembler, BandDescriptor};
pub use crate::core::cancel::CancellationToken;
pub use crate::core::geocoding::{GeoCoding, GeoCodingBuilder, TiePointGrid};
pub use crate::core::mosaic::{MosaicCompositor, MosaicSource, MosaicTile};
pub use crate::core::params::ReaderParams;
pub use crate::core::pyramid::{PyramidSource, SingleTileSource, TileImage};
pub use crate::core::scene::SceneDescription;
pub use crate::error::{Error, Result};
pub use crate::types::{BandGroupKey, GeoPoint, Rectangle, SpatialResolution};

pub use crate::io::{
    DecodeError, GdalError, GdalTileDecoder, L1bMetadataParser, MetadataParser, Product,
    ProductBand, ProductReader, SceneMetadata, TileDecoder,
};

pub use crate::api::{
    BatchReport, ExportedFiles, Ndi45Result, compute_ndi45, export_band_level, export_bands,
    export_ndi45, open_product, open_product_with_decoder, read_band_level,
};
