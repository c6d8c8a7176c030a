use gdal::raster::{Buffer, ColorInterpretation, GdalType};
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;
use tracing::{debug, warn};

use crate::io::gdal::GdalError;
use crate::io::writers::metadata::{OutputMetadata, embed_tiff_metadata};

fn is_identity(gt: &[f64; 6]) -> bool {
    *gt == [0.0, 1.0, 0.0, 0.0, 0.0, 1.0]
}

/// Resolve "EPSG:xxxx" (or any OGC definition) to WKT; WKT passes through
fn projection_wkt(crs: &str) -> Result<String, GdalError> {
    if crs.trim_start().starts_with("GEOGCS") || crs.trim_start().starts_with("PROJCS") {
        return Ok(crs.to_string());
    }
    Ok(SpatialRef::from_definition(crs)?.to_wkt()?)
}

fn write_single_band<T: GdalType + Copy>(
    output: &Path,
    raster: &Array2<T>,
    meta: &OutputMetadata,
    no_data: Option<f64>,
) -> Result<Dataset, GdalError> {
    let (rows, cols) = raster.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<T, _>(output, cols, rows, 1)?;

    if let Some(gt) = meta.geotransform.filter(|gt| !is_identity(gt)) {
        ds.set_geo_transform(&gt)?;
        if let Some(crs) = meta.crs.as_deref().filter(|c| !c.is_empty()) {
            match projection_wkt(crs) {
                Ok(wkt) => ds.set_projection(&wkt)?,
                Err(e) => warn!("Unknown projection {:?}, written without it: {}", crs, e),
            }
        }
    }
    embed_tiff_metadata(&mut ds, meta)?;

    {
        let mut band = ds.rasterband(1)?;
        band.set_color_interpretation(ColorInterpretation::GrayIndex)?;
        if let Some(v) = no_data {
            band.set_no_data_value(Some(v))?;
        }
        let mut buf = Buffer::new((cols, rows), raster.iter().copied().collect());
        band.write((0, 0), (cols, rows), &mut buf)?;
    }
    debug!("Wrote {}x{} GeoTIFF {:?}", cols, rows, output);
    Ok(ds)
}

/// Single-band 16-bit GeoTIFF with embedded georeferencing and metadata
pub fn write_geotiff_u16(
    output: &Path,
    raster: &Array2<u16>,
    meta: &OutputMetadata,
    no_data: Option<u16>,
) -> Result<(), GdalError> {
    write_single_band(output, raster, meta, no_data.map(f64::from))?;
    Ok(())
}

/// Single-band float GeoTIFF (index outputs)
pub fn write_geotiff_f32(
    output: &Path,
    raster: &Array2<f32>,
    meta: &OutputMetadata,
) -> Result<(), GdalError> {
    write_single_band(output, raster, meta, None)?;
    Ok(())
}

/// Single-band 8-bit GeoTIFF (flag outputs)
pub fn write_geotiff_u8(
    output: &Path,
    raster: &Array2<u8>,
    meta: &OutputMetadata,
) -> Result<(), GdalError> {
    write_single_band(output, raster, meta, None)?;
    Ok(())
}
