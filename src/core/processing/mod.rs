//! Raster primitives shared by the pyramid sources.
pub mod padding;
pub mod resize;
