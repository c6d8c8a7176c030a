//! High-level library API: open a product, read or export band levels, batch
//! export with a report, and the NDI45 index. Prefer these entry points over
//! the `core` modules when integrating s2mosaic.
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::cancel::CancellationToken;
use crate::core::geocoding::scale_geotransform;
use crate::core::indices::{
    B4_WAVELENGTH_RANGE, B5_WAVELENGTH_RANGE, NDI45_BAND_NAME, NDI45_FLAGS_BAND_NAME,
    find_band_by_wavelength, ndi45,
};
use crate::core::params::ReaderParams;
use crate::core::processing::resize::resize_nearest_u16;
use crate::error::{Error, Result};
use crate::io::decoder::TileDecoder;
use crate::io::product::{Product, ProductBand, ProductReader};
use crate::io::writers::metadata::OutputMetadata;
use crate::io::writers::tiff::write_geotiff_u8;
use crate::io::writers::{
    write_geotiff_f32, write_geotiff_u16, write_json_sidecar, write_prj_file, write_world_file,
};

/// Open a product (or a single granule) with the GDAL decoder
pub fn open_product(input: &Path, params: &ReaderParams) -> Result<Product> {
    ProductReader::new().open(input, params)
}

/// Open a product decoding tiles with `decoder`
pub fn open_product_with_decoder(
    input: &Path,
    params: &ReaderParams,
    decoder: Arc<dyn TileDecoder>,
) -> Result<Product> {
    ProductReader::new().with_decoder(decoder).open(input, params)
}

fn find_band<'a>(product: &'a Product, band_name: &str) -> Result<&'a ProductBand> {
    product
        .band(band_name)
        .ok_or_else(|| Error::UnknownBand(band_name.to_string()))
}

/// Raster of `band_name` at pyramid `level`
pub fn read_band_level(product: &Product, band_name: &str, level: usize) -> Result<Array2<u16>> {
    read_band_level_with_cancel(product, band_name, level, &CancellationToken::new())
}

pub fn read_band_level_with_cancel(
    product: &Product,
    band_name: &str,
    level: usize,
    cancel: &CancellationToken,
) -> Result<Array2<u16>> {
    find_band(product, band_name)?
        .source
        .level_with_cancel(level, cancel)
}

/// Geotransform of a band level: the detector geotransform with pixels
/// `2^level * band/reference` reference pixels wide
pub fn band_level_geotransform(product: &Product, band: &ProductBand, level: usize) -> Option<[f64; 6]> {
    let geocoding = band.geocoding.as_ref()?;
    let factor = (1u64 << level) as f64 * band.resolution().ratio_to(product.reference_resolution);
    Some(scale_geotransform(geocoding.geotransform(), factor))
}

/// Metadata items written with an exported band level
pub fn band_output_metadata(product: &Product, band: &ProductBand, level: usize) -> OutputMetadata {
    let c = &product.metadata.characteristics;
    let mut meta = OutputMetadata::default();
    meta.insert("PRODUCT_NAME", &product.name);
    meta.insert("PRODUCT_TYPE", &product.product_type);
    meta.insert("SPACECRAFT", &c.spacecraft);
    meta.insert("PRODUCTION_DATE", &c.production_date);
    meta.insert("PROCESSING_LEVEL", &c.processing_level);
    meta.insert("BAND_NAME", &band.name);
    meta.insert("PHYSICAL_BAND", &band.key.physical_band);
    meta.insert("DETECTOR_ID", &band.key.detector_id);
    meta.insert("BAND_ID", band.info.band_id);
    meta.insert("RESOLUTION", band.resolution().meters());
    meta.insert("WAVELENGTH", band.info.wavelength_central);
    meta.insert("BANDWIDTH", band.info.bandwidth);
    if let Some(irradiance) = band.info.solar_irradiance {
        meta.insert("SOLAR_IRRADIANCE", irradiance);
    }
    meta.insert("NO_DATA_VALUE", band.no_data_value);
    meta.insert("VALID_PIXEL_EXPRESSION", &band.valid_pixel_expression);
    meta.insert("LEVEL", level);
    meta.insert("TILE_COUNT", band.source.tile_images().len());
    meta.insert("EXPORT_TIMESTAMP", chrono::Utc::now().to_rfc3339());
    meta.geotransform = band_level_geotransform(product, band, level);
    if meta.geotransform.is_some() {
        meta.crs = band.geocoding.as_ref().map(|g| g.crs().to_string());
    }
    meta
}

/// Files written for one exported raster
#[derive(Debug, Clone, Default)]
pub struct ExportedFiles {
    pub raster: PathBuf,
    pub sidecar: Option<PathBuf>,
    pub world_file: Option<PathBuf>,
    pub prj_file: Option<PathBuf>,
}

fn write_georef_files(output: &Path, meta: &OutputMetadata, files: &mut ExportedFiles) -> Result<()> {
    if let Some(gt) = meta.geotransform {
        files.world_file = Some(write_world_file(output, gt)?);
        if let Some(crs) = &meta.crs {
            files.prj_file = Some(write_prj_file(output, crs)?);
        }
    }
    files.sidecar = Some(write_json_sidecar(output, meta)?);
    Ok(())
}

/// Write one band level as a 16-bit GeoTIFF plus world, prj and JSON files
pub fn export_band_level(
    product: &Product,
    band_name: &str,
    level: usize,
    output: &Path,
) -> Result<ExportedFiles> {
    let band = find_band(product, band_name)?;
    let raster = band.source.level(level)?;
    let meta = band_output_metadata(product, band, level);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write_geotiff_u16(output, &raster, &meta, Some(band.no_data_value))?;
    let mut files = ExportedFiles {
        raster: output.to_path_buf(),
        ..Default::default()
    };
    write_georef_files(output, &meta, &mut files)?;
    info!(
        "Exported {} level {} ({}x{}) to {:?}",
        band_name,
        level,
        raster.ncols(),
        raster.nrows(),
        output
    );
    Ok(files)
}

/// Default output file name of a band level
pub fn band_level_filename(band_name: &str, level: usize) -> String {
    format!("{}_L{}.tif", band_name, level)
}

/// Counts of a batch export
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub exported: usize,
    pub errors: usize,
}

/// Export several bands (all when `band_names` is empty) into `output_dir`.
/// With `continue_on_error` failures are counted and logged, otherwise the
/// first one is returned.
pub fn export_bands(
    product: &Product,
    band_names: &[String],
    level: usize,
    output_dir: &Path,
    continue_on_error: bool,
) -> Result<BatchReport> {
    std::fs::create_dir_all(output_dir)?;
    let names: Vec<String> = if band_names.is_empty() {
        product.bands.iter().map(|b| b.name.clone()).collect()
    } else {
        band_names.to_vec()
    };

    let mut report = BatchReport::default();
    for name in &names {
        let output = output_dir.join(band_level_filename(name, level));
        match export_band_level(product, name, level, &output) {
            Ok(_) => report.exported += 1,
            Err(e) => {
                report.errors += 1;
                if !continue_on_error {
                    return Err(e);
                }
                warn!("Export of {} failed: {}", name, e);
            }
        }
    }
    Ok(report)
}

/// NDI45 of one detector at one level, on the B5 grid
#[derive(Debug, Clone)]
pub struct Ndi45Result {
    pub detector_id: String,
    pub level: usize,
    pub b4_band: String,
    pub b5_band: String,
    pub values: Array2<f32>,
    pub flags: Array2<u8>,
    pub geotransform: Option<[f64; 6]>,
    pub crs: Option<String>,
}

pub fn compute_ndi45(product: &Product, detector_id: &str, level: usize) -> Result<Ndi45Result> {
    compute_ndi45_with_factors(product, detector_id, level, 1.0, 1.0)
}

pub fn compute_ndi45_with_factors(
    product: &Product,
    detector_id: &str,
    level: usize,
    b4_factor: f32,
    b5_factor: f32,
) -> Result<Ndi45Result> {
    let bands = &product.metadata.bands;
    let b4_info = find_band_by_wavelength(bands, B4_WAVELENGTH_RANGE).ok_or_else(|| {
        Error::UnknownBand("no band usable as red input (B4), 650-680 nm".to_string())
    })?;
    let b5_info = find_band_by_wavelength(bands, B5_WAVELENGTH_RANGE).ok_or_else(|| {
        Error::UnknownBand("no band usable as red-edge input (B5), 698-713 nm".to_string())
    })?;

    let lookup = |physical: &str| {
        product
            .detector_band(detector_id, physical)
            .ok_or_else(|| Error::UnknownBand(format!("D{}{}", detector_id, physical)))
    };
    let b4 = lookup(&b4_info.physical_band)?;
    let b5 = lookup(&b5_info.physical_band)?;
    info!("NDI45 for detector {}: B4={} B5={}", detector_id, b4.name, b5.name);

    let b5_raster = b5.source.level(level)?;
    let b4_raster = b4.source.level(level)?;
    let (rows, cols) = b5_raster.dim();
    let b4_raster = resize_nearest_u16(&b4_raster, cols, rows)?;
    let (values, flags) = ndi45(&b4_raster, &b5_raster, b4_factor, b5_factor)?;

    let geotransform = band_level_geotransform(product, b5, level);
    let crs = geotransform
        .and(b5.geocoding.as_ref())
        .map(|g| g.crs().to_string());
    Ok(Ndi45Result {
        detector_id: detector_id.to_string(),
        level,
        b4_band: b4.name.clone(),
        b5_band: b5.name.clone(),
        values,
        flags,
        geotransform,
        crs,
    })
}

/// Write the index and its flags as GeoTIFFs into `output_dir`
pub fn export_ndi45(product: &Product, result: &Ndi45Result, output_dir: &Path) -> Result<Vec<ExportedFiles>> {
    std::fs::create_dir_all(output_dir)?;
    let mut meta = OutputMetadata::default();
    meta.insert("PRODUCT_NAME", &product.name);
    meta.insert("DETECTOR_ID", &result.detector_id);
    meta.insert("LEVEL", result.level);
    meta.insert("B4_SOURCE", &result.b4_band);
    meta.insert("B5_SOURCE", &result.b5_band);
    meta.insert("EXPORT_TIMESTAMP", chrono::Utc::now().to_rfc3339());
    meta.geotransform = result.geotransform;
    meta.crs = result.crs.clone();

    let path_for = |name: &str| {
        output_dir.join(format!("D{}_{}_L{}.tif", result.detector_id, name, result.level))
    };
    let mut written = Vec::with_capacity(2);

    let values_path = path_for(NDI45_BAND_NAME);
    let mut values_meta = meta.clone();
    values_meta.insert("BAND_NAME", NDI45_BAND_NAME);
    write_geotiff_f32(&values_path, &result.values, &values_meta)?;
    let mut files = ExportedFiles {
        raster: values_path.clone(),
        ..Default::default()
    };
    write_georef_files(&values_path, &values_meta, &mut files)?;
    written.push(files);

    let flags_path = path_for(NDI45_FLAGS_BAND_NAME);
    let mut flags_meta = meta;
    flags_meta.insert("BAND_NAME", NDI45_FLAGS_BAND_NAME);
    flags_meta.insert("FLAG_ARITHMETIC", 1);
    flags_meta.insert("FLAG_LOW", 2);
    flags_meta.insert("FLAG_HIGH", 4);
    write_geotiff_u8(&flags_path, &result.flags, &flags_meta)?;
    let mut files = ExportedFiles {
        raster: flags_path.clone(),
        ..Default::default()
    };
    write_georef_files(&flags_path, &flags_meta, &mut files)?;
    written.push(files);

    info!("Exported NDI45 of detector {} to {:?}", result.detector_id, output_dir);
    Ok(written)
}
