//! Shared types used across s2mosaic.
//! Includes `SpatialResolution`, pixel `Rectangle`, `GeoPoint` and the
//! `BandGroupKey` that identifies one (physical band, detector) mosaic.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported resolution tiers of an MSI product.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
pub enum SpatialResolution {
    R10M,
    R20M,
    R60M,
}

impl SpatialResolution {
    pub const ALL: [SpatialResolution; 3] = [
        SpatialResolution::R10M,
        SpatialResolution::R20M,
        SpatialResolution::R60M,
    ];

    /// Ground sampling distance in meters
    pub fn meters(self) -> u32 {
        match self {
            SpatialResolution::R10M => 10,
            SpatialResolution::R20M => 20,
            SpatialResolution::R60M => 60,
        }
    }

    pub fn from_meters(meters: u32) -> Option<Self> {
        match meters {
            10 => Some(SpatialResolution::R10M),
            20 => Some(SpatialResolution::R20M),
            60 => Some(SpatialResolution::R60M),
            _ => None,
        }
    }

    /// Native pixel size of `self` divided by the pixel size of `reference`.
    pub fn ratio_to(self, reference: SpatialResolution) -> f64 {
        self.meters() as f64 / reference.meters() as f64
    }
}

impl std::fmt::Display for SpatialResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.meters())
    }
}

/// Integer pixel rectangle; origin is the upper-left corner.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rectangle {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn union(&self, other: &Rectangle) -> Rectangle {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rectangle::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

impl std::fmt::Display for Rectangle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[x={}, y={}, w={}, h={}]",
            self.x, self.y, self.width, self.height
        )
    }
}

/// Geographic position in decimal degrees (WGS84).
#[derive(Copy, Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// The unit of mosaic assembly: one physical band seen by one detector.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct BandGroupKey {
    pub physical_band: String,
    pub detector_id: String,
}

impl BandGroupKey {
    pub fn new<B: Into<String>, D: Into<String>>(physical_band: B, detector_id: D) -> Self {
        Self {
            physical_band: physical_band.into(),
            detector_id: detector_id.into(),
        }
    }

    /// Product band name, detector first (e.g. `D04B2`)
    pub fn band_name(&self) -> String {
        format!("D{}{}", self.detector_id, self.physical_band)
    }
}

impl std::fmt::Display for BandGroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.band_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_ratios() {
        assert_eq!(SpatialResolution::R60M.ratio_to(SpatialResolution::R20M), 3.0);
        assert_eq!(SpatialResolution::R10M.ratio_to(SpatialResolution::R10M), 1.0);
        assert_eq!(SpatialResolution::from_meters(20), Some(SpatialResolution::R20M));
        assert_eq!(SpatialResolution::from_meters(30), None);
    }

    #[test]
    fn rectangles_touching_edges_do_not_intersect() {
        let a = Rectangle::new(0, 0, 100, 2000);
        let b = Rectangle::new(0, 2000, 100, 2000);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&Rectangle::new(50, 1999, 10, 10)));
        assert_eq!(a.union(&b), Rectangle::new(0, 0, 100, 4000));
    }

    #[test]
    fn band_name_puts_detector_first() {
        let key = BandGroupKey::new("B2", "04");
        assert_eq!(key.band_name(), "D04B2");
        assert_eq!(BandGroupKey::new("B8A", "12").band_name(), "D12B8A");
    }
}
