//! Core building blocks: scene layout, geocoding, pyramid sources and the
//! mosaic compositor, band assembly, masks and spectral indices. Consumed by
//! the product reader and the high-level `api` module.
pub mod assembler;
pub mod cancel;
pub mod geocoding;
pub mod indices;
pub mod layout;
pub mod masks;
pub mod mosaic;
pub mod params;
pub mod processing;
pub mod pyramid;
pub mod scene;
