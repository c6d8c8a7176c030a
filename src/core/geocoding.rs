//! Geocoding of a detector strip from tile footprint corners.
//!
//! Corner numbering follows the granule footprint: counterclockwise starting
//! at the first pixel, i.e. `c0` top-left, `c1` bottom-left, `c2` bottom-right,
//! `c3` top-right. A strip is anchored by `c0`/`c3` of its first tile and
//! `c1`/`c2` of its last tile.
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::metadata::Tile;
use crate::types::{GeoPoint, SpatialResolution};

const COLLINEAR_EPSILON: f64 = 1e-12;

/// Sparse lattice of geographic values anchored at pixel coordinates.
/// Missing values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiePointGrid {
    pub name: String,
    pub grid_width: usize,
    pub grid_height: usize,
    pub offset_x: f64,
    pub offset_y: f64,
    pub sub_sampling_x: f64,
    pub sub_sampling_y: f64,
    /// Row-major values, `grid_width * grid_height` long
    pub values: Vec<f32>,
}

impl TiePointGrid {
    pub fn new(name: impl Into<String>, sub_sampling_x: f64, sub_sampling_y: f64, values: [f32; 4]) -> Self {
        Self {
            name: name.into(),
            grid_width: 2,
            grid_height: 2,
            offset_x: 0.0,
            offset_y: 0.0,
            sub_sampling_x,
            sub_sampling_y,
            values: values.to_vec(),
        }
    }

    fn at(&self, gx: usize, gy: usize) -> f64 {
        self.values
            .get(gy * self.grid_width + gx)
            .map(|v| *v as f64)
            .unwrap_or(f64::NAN)
    }

    /// Bilinear interpolation at pixel position (x, y); extrapolates linearly
    /// outside the grid.
    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        if self.grid_width < 2 || self.grid_height < 2 {
            return self.at(0, 0);
        }
        let fx = (x - self.offset_x) / self.sub_sampling_x;
        let fy = (y - self.offset_y) / self.sub_sampling_y;
        let gx = (fx.floor().max(0.0) as usize).min(self.grid_width - 2);
        let gy = (fy.floor().max(0.0) as usize).min(self.grid_height - 2);
        let wx = fx - gx as f64;
        let wy = fy - gy as f64;
        let top = self.at(gx, gy) * (1.0 - wx) + self.at(gx + 1, gy) * wx;
        let bottom = self.at(gx, gy + 1) * (1.0 - wx) + self.at(gx + 1, gy + 1) * wx;
        top * (1.0 - wy) + bottom * wy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TiePointGeoCoding {
    pub latitude: TiePointGrid,
    pub longitude: TiePointGrid,
}

/// Affine pixel-to-map transform in GDAL geotransform order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrsGeoCoding {
    pub crs: String,
    pub geotransform: [f64; 6],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GeoCoding {
    TiePoint(TiePointGeoCoding),
    Crs(CrsGeoCoding),
}

impl GeoCoding {
    /// Geographic position of pixel (x, y) at the reference tier
    pub fn geo_pos(&self, x: f64, y: f64) -> GeoPoint {
        match self {
            GeoCoding::TiePoint(tp) => {
                GeoPoint::new(tp.latitude.interpolate(x, y), tp.longitude.interpolate(x, y))
            }
            GeoCoding::Crs(crs) => {
                let gt = &crs.geotransform;
                GeoPoint::new(
                    gt[3] + x * gt[4] + y * gt[5],
                    gt[0] + x * gt[1] + y * gt[2],
                )
            }
        }
    }

    /// Affine approximation (GDAL order, x = lon, y = lat) at the reference tier
    pub fn geotransform(&self) -> [f64; 6] {
        match self {
            GeoCoding::TiePoint(tp) => {
                let w = tp.latitude.sub_sampling_x;
                let h = tp.latitude.sub_sampling_y;
                let tl = self.geo_pos(0.0, 0.0);
                let tr = self.geo_pos(w, 0.0);
                let bl = self.geo_pos(0.0, h);
                affine_from_corners(tl, tr, bl, w, h)
            }
            GeoCoding::Crs(crs) => crs.geotransform,
        }
    }

    pub fn crs(&self) -> &str {
        match self {
            GeoCoding::TiePoint(_) => WGS84,
            GeoCoding::Crs(crs) => &crs.crs,
        }
    }

    pub fn tie_point_grids(&self) -> Option<(&TiePointGrid, &TiePointGrid)> {
        match self {
            GeoCoding::TiePoint(tp) => Some((&tp.latitude, &tp.longitude)),
            GeoCoding::Crs(_) => None,
        }
    }
}

pub const WGS84: &str = "EPSG:4326";

/// Geotransform for a raster whose pixels are `factor` reference pixels wide
pub fn scale_geotransform(gt: [f64; 6], factor: f64) -> [f64; 6] {
    [gt[0], gt[1] * factor, gt[2] * factor, gt[3], gt[4] * factor, gt[5] * factor]
}

fn affine_from_corners(tl: GeoPoint, tr: GeoPoint, bl: GeoPoint, width: f64, height: f64) -> [f64; 6] {
    [
        tl.lon,
        (tr.lon - tl.lon) / width,
        (bl.lon - tl.lon) / height,
        tl.lat,
        (tr.lat - tl.lat) / width,
        (bl.lat - tl.lat) / height,
    ]
}

/// Turns strip anchor corners into a map-based geocoding
pub trait CoordinateTransform {
    /// `corners` are top-left, top-right, bottom-left, bottom-right of a
    /// `width` x `height` pixel strip
    fn corners_to_geocoding(&self, corners: &[GeoPoint; 4], width: f64, height: f64) -> Result<GeoCoding>;
}

/// Affine WGS84 transform fitted through the top-left, top-right and
/// bottom-left corners
#[derive(Debug, Clone)]
pub struct AffineCornerTransform {
    pub crs: String,
}

impl Default for AffineCornerTransform {
    fn default() -> Self {
        Self {
            crs: WGS84.to_string(),
        }
    }
}

impl CoordinateTransform for AffineCornerTransform {
    fn corners_to_geocoding(&self, corners: &[GeoPoint; 4], width: f64, height: f64) -> Result<GeoCoding> {
        let [tl, tr, bl, _] = *corners;
        Ok(GeoCoding::Crs(CrsGeoCoding {
            crs: self.crs.clone(),
            geotransform: affine_from_corners(tl, tr, bl, width, height),
        }))
    }
}

/// Anchor points and pixel extent of one detector strip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StripAnchors {
    /// top-left, top-right, bottom-left, bottom-right
    pub corners: [GeoPoint; 4],
    pub width: f64,
    pub height: f64,
}

/// Builds the geocoding of a detector strip at one reference tier
#[derive(Debug, Clone, Copy)]
pub struct GeoCodingBuilder {
    reference: SpatialResolution,
}

impl GeoCodingBuilder {
    pub fn new(reference: SpatialResolution) -> Self {
        Self { reference }
    }

    /// Strip anchors from tiles ordered by ascending position
    pub fn anchors(&self, detector_id: &str, tiles: &[&Tile]) -> Result<StripAnchors> {
        let (first, last) = match (tiles.first(), tiles.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(Error::InsufficientCorners {
                    detector: detector_id.to_string(),
                    found: 0,
                });
            }
        };
        for tile in [first, last] {
            if tile.corners.len() < 4 {
                return Err(Error::InsufficientCorners {
                    detector: detector_id.to_string(),
                    found: tile.corners.len(),
                });
            }
        }

        let corners = [
            first.corners[0],
            first.corners[3],
            last.corners[1],
            last.corners[2],
        ];
        if is_degenerate(&corners) {
            return Err(Error::DegenerateGeometry {
                detector: detector_id.to_string(),
            });
        }

        let first_geom = first.geometry(self.reference).ok_or_else(|| {
            Error::layout(&first.id, format!("no geometry for tier {}", self.reference))
        })?;
        let mut height = 0usize;
        for tile in tiles {
            let geom = tile.geometry(self.reference).ok_or_else(|| {
                Error::layout(&tile.id, format!("no geometry for tier {}", self.reference))
            })?;
            height += geom.num_rows_detector;
        }

        Ok(StripAnchors {
            corners,
            width: first_geom.num_cols as f64,
            height: height as f64,
        })
    }

    /// 2x2 latitude/longitude tie-point geocoding of the strip
    pub fn build(&self, detector_id: &str, tiles: &[&Tile]) -> Result<GeoCoding> {
        let anchors = self.anchors(detector_id, tiles)?;
        let [tl, tr, bl, br] = anchors.corners;
        let lats = [tl.lat as f32, tr.lat as f32, bl.lat as f32, br.lat as f32];
        let lons = [tl.lon as f32, tr.lon as f32, bl.lon as f32, br.lon as f32];
        debug!(
            "Tie-point geocoding for detector {}: {}x{} px, lats={:?} lons={:?}",
            detector_id, anchors.width, anchors.height, lats, lons
        );
        Ok(GeoCoding::TiePoint(TiePointGeoCoding {
            latitude: TiePointGrid::new(
                format!("D{}_latitude", detector_id),
                anchors.width,
                anchors.height,
                lats,
            ),
            longitude: TiePointGrid::new(
                format!("D{}_longitude", detector_id),
                anchors.width,
                anchors.height,
                lons,
            ),
        }))
    }

    /// Same anchors, converted by an external coordinate transform
    pub fn build_with(
        &self,
        transform: &dyn CoordinateTransform,
        detector_id: &str,
        tiles: &[&Tile],
    ) -> Result<GeoCoding> {
        let anchors = self.anchors(detector_id, tiles)?;
        transform.corners_to_geocoding(&anchors.corners, anchors.width, anchors.height)
    }
}

/// True when every triple of the four points is collinear
fn is_degenerate(points: &[GeoPoint; 4]) -> bool {
    let cross = |a: GeoPoint, b: GeoPoint, c: GeoPoint| {
        ((b.lon - a.lon) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lon - a.lon)).abs()
    };
    let [p0, p1, p2, p3] = *points;
    let max = cross(p0, p1, p2)
        .max(cross(p0, p1, p3))
        .max(cross(p0, p2, p3))
        .max(cross(p1, p2, p3));
    max < COLLINEAR_EPSILON
}
