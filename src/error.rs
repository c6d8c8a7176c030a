//! Crate-level error type and `Result` alias.
//! Product-level failures (layout, no bands, metadata) are fatal and carry the
//! identifiers needed to diagnose them; tile-level decode failures are wrapped
//! here only when they escape a single-tile source.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] crate::io::MetadataError),

    #[error("Decode error: {0}")]
    Decode(#[from] crate::io::DecodeError),

    #[error("GDAL error: {0}")]
    Gdal(#[from] crate::io::GdalError),

    #[error("Invalid scene layout at tile {tile_id}: {reason}")]
    InvalidLayout { tile_id: String, reason: String },

    #[error("Unknown tile index {index} (scene has {count} tiles)")]
    UnknownTile { index: usize, count: usize },

    #[error("Unknown tile id: {0}")]
    UnknownTileId(String),

    #[error("Detector {detector}: need at least one tile with 4 corners, found {found}")]
    InsufficientCorners { detector: String, found: usize },

    #[error("Detector {detector}: corner points are collinear")]
    DegenerateGeometry { detector: String },

    #[error("Level {level} out of range (source has {num_resolutions} resolutions)")]
    LevelOutOfRange { level: usize, num_resolutions: usize },

    #[error("No valid bands found in product {product}")]
    NoBandsFound { product: String },

    #[error("Unknown band: {0}")]
    UnknownBand(String),

    #[error("Level construction cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl Error {
    pub fn layout<S: Into<String>, R: Into<String>>(tile_id: S, reason: R) -> Self {
        Error::InvalidLayout {
            tile_id: tile_id.into(),
            reason: reason.into(),
        }
    }
}
