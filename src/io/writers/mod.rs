//! Output writers: GeoTIFF via GDAL, world/projection files and JSON sidecars.
pub mod metadata;
pub mod tiff;
pub mod worldfile;

pub use metadata::{OutputMetadata, write_json_sidecar};
pub use tiff::{write_geotiff_f32, write_geotiff_u16};
pub use worldfile::{write_prj_file, write_world_file};
