use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::io::filenames::GranuleDirName;
use crate::types::{GeoPoint, SpatialResolution};

/// Errors encountered when parsing product or granule metadata
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Missing field `{0}` in metadata")]
    MissingField(&'static str),
    #[error("Invalid value for `{field}`: {value}")]
    InvalidValue { field: String, value: String },
    #[error("Duplicate spectral band id {0}")]
    DuplicateBand(u32),
    #[error("Unsupported resolution {0} m")]
    UnsupportedResolution(u32),
}

/// Pixel geometry of one tile at one resolution tier
#[derive(Debug, Clone, PartialEq)]
pub struct TileGeometry {
    pub resolution: SpatialResolution,
    pub num_rows: usize,
    pub num_cols: usize,
    /// Rows seen by the detector; equals `num_rows` unless the granule states otherwise
    pub num_rows_detector: usize,
    /// Placement order along the detector strip
    pub position: Option<u32>,
    pub x_dim: Option<f64>,
    pub y_dim: Option<f64>,
}

impl TileGeometry {
    pub fn new(resolution: SpatialResolution, num_cols: usize, num_rows: usize) -> Self {
        Self {
            resolution,
            num_rows,
            num_cols,
            num_rows_detector: num_rows,
            position: None,
            x_dim: None,
            y_dim: None,
        }
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }
}

/// Mean solar or viewing angles attached to a tile
#[derive(Debug, Clone, PartialEq)]
pub struct AnglesGrid {
    pub band_id: Option<u32>,
    pub detector_id: Option<String>,
    pub zenith: f64,
    pub azimuth: f64,
}

/// One granule of the product
#[derive(Debug, Clone)]
pub struct Tile {
    pub id: String,
    pub detector_id: String,
    pub geometries: BTreeMap<SpatialResolution, TileGeometry>,
    /// Footprint corners, counterclockwise from the first pixel:
    /// 0 = top-left, 1 = bottom-left, 2 = bottom-right, 3 = top-right
    pub corners: Vec<GeoPoint>,
    pub sun_angles: Option<AnglesGrid>,
    pub viewing_incidence_angles: Vec<AnglesGrid>,
}

impl Tile {
    pub fn new<I: Into<String>, D: Into<String>>(id: I, detector_id: D) -> Self {
        Self {
            id: id.into(),
            detector_id: detector_id.into(),
            geometries: BTreeMap::new(),
            corners: Vec::new(),
            sun_angles: None,
            viewing_incidence_angles: Vec::new(),
        }
    }

    pub fn geometry(&self, resolution: SpatialResolution) -> Option<&TileGeometry> {
        self.geometries.get(&resolution)
    }
}

/// Spectral band descriptor from the product header
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectralBandInfo {
    pub band_id: u32,
    pub physical_band: String,
    pub resolution: Option<SpatialResolution>,
    pub wavelength_min: f64,
    pub wavelength_max: f64,
    pub wavelength_central: f64,
    pub bandwidth: f64,
    pub solar_irradiance: Option<f64>,
}

impl SpectralBandInfo {
    /// Native resolution tier; always set once the header passed validation
    pub fn native_resolution(&self) -> SpatialResolution {
        self.resolution.unwrap_or(SpatialResolution::R10M)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductCharacteristics {
    pub spacecraft: String,
    pub production_date: String,
    pub processing_level: String,
    pub product_type: String,
}

/// Parsed product: everything the mosaic core consumes
#[derive(Debug, Clone, Default)]
pub struct SceneMetadata {
    pub tiles: Vec<Tile>,
    pub bands: Vec<SpectralBandInfo>,
    pub characteristics: ProductCharacteristics,
    pub crs: Option<String>,
}

impl SceneMetadata {
    pub fn band_by_physical(&self, physical_band: &str) -> Option<&SpectralBandInfo> {
        self.bands.iter().find(|b| b.physical_band == physical_band)
    }

    /// Keep only the granule `tile_id` (single-granule reading)
    pub fn retain_tile(&mut self, tile_id: &str) {
        self.tiles.retain(|t| t.id.eq_ignore_ascii_case(tile_id));
    }
}

/// Source of parsed metadata
pub trait MetadataParser {
    fn parse(&self, path: &Path) -> Result<SceneMetadata, MetadataError>;
}

/// Parser for the L1B product header and its granule headers
#[derive(Debug, Default, Clone, Copy)]
pub struct L1bMetadataParser;

/// Product-level header content before granules are resolved
#[derive(Debug, Default)]
pub struct ProductHeader {
    pub characteristics: ProductCharacteristics,
    pub bands: Vec<SpectralBandInfo>,
    pub granule_ids: Vec<String>,
    pub crs: Option<String>,
}

impl MetadataParser for L1bMetadataParser {
    fn parse(&self, path: &Path) -> Result<SceneMetadata, MetadataError> {
        info!("Parsing product metadata: {:?}", path);
        let mut reader = Reader::from_file(path)?;
        let header = parse_product_header(&mut reader)?;
        let product_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut tiles = Vec::with_capacity(header.granule_ids.len());
        for granule_id in &header.granule_ids {
            let granule_dir = product_dir.join("GRANULE").join(granule_id);
            if !granule_dir.is_dir() {
                warn!("Granule directory not found: {:?}", granule_dir);
                continue;
            }
            match find_granule_metadata(&granule_dir, granule_id)? {
                Some(file) => {
                    debug!("Parsing granule metadata: {:?}", file);
                    let mut reader = Reader::from_file(&file)?;
                    let mut tile = parse_granule_header(&mut reader)?;
                    if tile.id.is_empty() {
                        tile.id = granule_id.clone();
                    }
                    tiles.push(tile);
                }
                None => warn!(
                    "Corrupted product: the metadata file for granule {} is missing",
                    granule_id
                ),
            }
        }

        info!(
            "Parsed {} bands and {} of {} granules",
            header.bands.len(),
            tiles.len(),
            header.granule_ids.len()
        );

        Ok(SceneMetadata {
            tiles,
            bands: header.bands,
            characteristics: header.characteristics,
            crs: header.crs,
        })
    }
}

fn find_granule_metadata(
    granule_dir: &Path,
    granule_id: &str,
) -> Result<Option<PathBuf>, MetadataError> {
    if let Some(name) = GranuleDirName::parse(granule_id) {
        let candidate = granule_dir.join(name.metadata_filename());
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
    }
    let mut xml_files = Vec::new();
    for entry in fs::read_dir(granule_dir)? {
        let path = entry?.path();
        if path.extension().map(|e| e == "xml").unwrap_or(false) {
            xml_files.push(path);
        }
    }
    xml_files.sort();
    Ok(xml_files.into_iter().next())
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>, MetadataError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_value<T: std::str::FromStr>(field: &str, txt: &str) -> Result<T, MetadataError> {
    txt.trim()
        .parse::<T>()
        .map_err(|_| MetadataError::InvalidValue {
            field: field.to_string(),
            value: txt.to_string(),
        })
}

fn parse_resolution(field: &str, txt: &str) -> Result<SpatialResolution, MetadataError> {
    let meters: u32 = parse_value(field, txt)?;
    SpatialResolution::from_meters(meters).ok_or(MetadataError::UnsupportedResolution(meters))
}

/// Parse the product header (`MTD_*.xml`)
pub fn parse_product_header<R: BufRead>(
    reader: &mut Reader<R>,
) -> Result<ProductHeader, MetadataError> {
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut header = ProductHeader::default();
    let mut curr = String::new();
    let mut current_band: Option<SpectralBandInfo> = None;
    let mut irradiance_band: Option<u32> = None;
    let mut irradiances: Vec<(u32, f64)> = Vec::new();
    let mut in_wavelength = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "Spectral_Information" => {
                        let band_id = attribute(e, "bandId")?
                            .ok_or(MetadataError::MissingField("bandId"))?;
                        current_band = Some(SpectralBandInfo {
                            band_id: parse_value("bandId", &band_id)?,
                            physical_band: attribute(e, "physicalBand")?
                                .ok_or(MetadataError::MissingField("physicalBand"))?,
                            ..Default::default()
                        });
                    }
                    "Wavelength" => in_wavelength = true,
                    "Granules" | "Granule" => {
                        if let Some(id) = attribute(e, "granuleIdentifier")? {
                            header.granule_ids.push(id);
                        }
                    }
                    "SOLAR_IRRADIANCE" => {
                        irradiance_band = match attribute(e, "bandId")? {
                            Some(id) => Some(parse_value("bandId", &id)?),
                            None => None,
                        };
                    }
                    _ => {}
                }
                curr = tag;
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "Spectral_Information" => {
                        if let Some(mut band) = current_band.take() {
                            band.bandwidth = (band.wavelength_max - band.wavelength_min).abs();
                            header.bands.push(band);
                        }
                    }
                    "Wavelength" => in_wavelength = false,
                    _ => {}
                }
                curr.clear();
            }
            Event::Text(e) => {
                let txt = e.unescape()?;
                match curr.as_str() {
                    "SPACECRAFT_NAME" => header.characteristics.spacecraft = txt.to_string(),
                    "GENERATION_TIME" => {
                        header.characteristics.production_date = txt.to_string()
                    }
                    "PROCESSING_LEVEL" => {
                        header.characteristics.processing_level = txt.to_string()
                    }
                    "PRODUCT_TYPE" => header.characteristics.product_type = txt.to_string(),
                    "HORIZONTAL_CS_CODE" => header.crs = Some(txt.to_string()),
                    "RESOLUTION" => {
                        if let Some(band) = current_band.as_mut() {
                            band.resolution = Some(parse_resolution("RESOLUTION", &txt)?);
                        }
                    }
                    "MIN" if in_wavelength => {
                        if let Some(band) = current_band.as_mut() {
                            band.wavelength_min = parse_value("MIN", &txt)?;
                        }
                    }
                    "MAX" if in_wavelength => {
                        if let Some(band) = current_band.as_mut() {
                            band.wavelength_max = parse_value("MAX", &txt)?;
                        }
                    }
                    "CENTRAL" if in_wavelength => {
                        if let Some(band) = current_band.as_mut() {
                            band.wavelength_central = parse_value("CENTRAL", &txt)?;
                        }
                    }
                    "SOLAR_IRRADIANCE" => {
                        if let Some(id) = irradiance_band {
                            irradiances.push((id, parse_value("SOLAR_IRRADIANCE", &txt)?));
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    for (band_id, value) in irradiances {
        if let Some(band) = header.bands.iter_mut().find(|b| b.band_id == band_id) {
            band.solar_irradiance = Some(value);
        }
    }

    let mut seen = HashSet::new();
    for band in &header.bands {
        if !seen.insert(band.band_id) {
            return Err(MetadataError::DuplicateBand(band.band_id));
        }
        if band.resolution.is_none() {
            return Err(MetadataError::MissingField("RESOLUTION"));
        }
    }

    Ok(header)
}

/// Parse one granule header (`GRANULE/<id>/*.xml`)
pub fn parse_granule_header<R: BufRead>(reader: &mut Reader<R>) -> Result<Tile, MetadataError> {
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut tile = Tile::new("", "");
    let mut curr = String::new();
    let mut size_resolution: Option<SpatialResolution> = None;
    let mut geopos_resolution: Option<SpatialResolution> = None;
    let mut position_resolution: Option<SpatialResolution> = None;
    let mut untiered_position: Option<u32> = None;
    let mut in_sun_angle = false;
    let mut pos_list_dimension: Option<usize> = None;
    let mut current_incidence: Option<AnglesGrid> = None;
    let mut sun = AnglesGrid {
        band_id: None,
        detector_id: None,
        zenith: f64::NAN,
        azimuth: f64::NAN,
    };

    fn geometry_mut(tile: &mut Tile, resolution: SpatialResolution) -> &mut TileGeometry {
        tile.geometries
            .entry(resolution)
            .or_insert_with(|| TileGeometry::new(resolution, 0, 0))
    }

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "Size" => {
                        size_resolution = match attribute(e, "resolution")? {
                            Some(r) => Some(parse_resolution("Size@resolution", &r)?),
                            None => None,
                        }
                    }
                    "Geoposition" => {
                        geopos_resolution = match attribute(e, "resolution")? {
                            Some(r) => Some(parse_resolution("Geoposition@resolution", &r)?),
                            None => None,
                        }
                    }
                    "POSITION" => {
                        position_resolution = match attribute(e, "resolution")? {
                            Some(r) => Some(parse_resolution("POSITION@resolution", &r)?),
                            None => None,
                        }
                    }
                    "EXT_POS_LIST" => {
                        pos_list_dimension = match attribute(e, "srsDimension")? {
                            Some(d) => Some(parse_value("EXT_POS_LIST@srsDimension", &d)?),
                            None => None,
                        }
                    }
                    "Mean_Sun_Angle" => in_sun_angle = true,
                    "Mean_Viewing_Incidence_Angle" => {
                        let band_id = match attribute(e, "bandId")? {
                            Some(id) => Some(parse_value("bandId", &id)?),
                            None => None,
                        };
                        current_incidence = Some(AnglesGrid {
                            band_id,
                            detector_id: attribute(e, "detectorId")?,
                            zenith: f64::NAN,
                            azimuth: f64::NAN,
                        });
                    }
                    _ => {}
                }
                curr = tag;
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "Size" => size_resolution = None,
                    "Geoposition" => geopos_resolution = None,
                    "Mean_Sun_Angle" => in_sun_angle = false,
                    "Mean_Viewing_Incidence_Angle" => {
                        if let Some(grid) = current_incidence.take() {
                            tile.viewing_incidence_angles.push(grid);
                        }
                    }
                    _ => {}
                }
                curr.clear();
            }
            Event::Text(e) => {
                let txt = e.unescape()?;
                match curr.as_str() {
                    "GRANULE_ID" => tile.id = txt.to_string(),
                    "DETECTOR_ID" => tile.detector_id = txt.to_string(),
                    "NROWS" => {
                        if let Some(r) = size_resolution {
                            let rows = parse_value("NROWS", &txt)?;
                            let geom = geometry_mut(&mut tile, r);
                            if geom.num_rows_detector == geom.num_rows {
                                geom.num_rows_detector = rows;
                            }
                            geom.num_rows = rows;
                        }
                    }
                    "NCOLS" => {
                        if let Some(r) = size_resolution {
                            geometry_mut(&mut tile, r).num_cols = parse_value("NCOLS", &txt)?;
                        }
                    }
                    "NROWS_DETECTOR" => {
                        if let Some(r) = size_resolution {
                            geometry_mut(&mut tile, r).num_rows_detector =
                                parse_value("NROWS_DETECTOR", &txt)?;
                        }
                    }
                    "XDIM" => {
                        if let Some(r) = geopos_resolution {
                            geometry_mut(&mut tile, r).x_dim = Some(parse_value("XDIM", &txt)?);
                        }
                    }
                    "YDIM" => {
                        if let Some(r) = geopos_resolution {
                            geometry_mut(&mut tile, r).y_dim = Some(parse_value("YDIM", &txt)?);
                        }
                    }
                    "POSITION" => {
                        let position = parse_value("POSITION", &txt)?;
                        match position_resolution.take() {
                            Some(r) => geometry_mut(&mut tile, r).position = Some(position),
                            None => untiered_position = Some(position),
                        }
                    }
                    "EXT_POS_LIST" => tile.corners = parse_pos_list(&txt, pos_list_dimension)?,
                    "ZENITH_ANGLE" => {
                        let value = parse_value("ZENITH_ANGLE", &txt)?;
                        if let Some(grid) = current_incidence.as_mut() {
                            grid.zenith = value;
                        } else if in_sun_angle {
                            sun.zenith = value;
                        }
                    }
                    "AZIMUTH_ANGLE" => {
                        let value = parse_value("AZIMUTH_ANGLE", &txt)?;
                        if let Some(grid) = current_incidence.as_mut() {
                            grid.azimuth = value;
                        } else if in_sun_angle {
                            sun.azimuth = value;
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // A POSITION without a tier applies to every tier without one
    if let Some(position) = untiered_position {
        for geom in tile.geometries.values_mut() {
            if geom.position.is_none() {
                geom.position = Some(position);
            }
        }
    }
    if !sun.zenith.is_nan() || !sun.azimuth.is_nan() {
        tile.sun_angles = Some(sun);
    }
    if tile.detector_id.is_empty() {
        if let Some(name) = GranuleDirName::parse(&tile.id) {
            tile.detector_id = name.detector_id;
        }
    }
    if tile.id.is_empty() {
        return Err(MetadataError::MissingField("GRANULE_ID"));
    }

    Ok(tile)
}

/// Footprint list "lat lon h lat lon h ..." or lat/lon pairs; a closing
/// point equal to the first one is dropped. Without `srsDimension` the
/// dimension whose reading closes the ring wins, 3 first.
fn parse_pos_list(txt: &str, dimension: Option<usize>) -> Result<Vec<GeoPoint>, MetadataError> {
    let values = txt
        .split_whitespace()
        .map(|v| parse_value::<f64>("EXT_POS_LIST", v))
        .collect::<Result<Vec<_>, _>>()?;
    let closes = |stride: usize| {
        values.len() >= 2 * stride
            && values.len() % stride == 0
            && values[..2] == values[values.len() - stride..values.len() - stride + 2]
    };
    let stride = match dimension {
        Some(d) => d,
        None if closes(3) => 3,
        None if closes(2) => 2,
        None if values.len() % 3 == 0 => 3,
        None => 2,
    };
    if !(2..=3).contains(&stride) || values.len() % stride != 0 {
        return Err(MetadataError::InvalidValue {
            field: "EXT_POS_LIST".to_string(),
            value: txt.to_string(),
        });
    }
    let mut points: Vec<GeoPoint> = values
        .chunks_exact(stride)
        .map(|c| GeoPoint::new(c[0], c[1]))
        .collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1B_User_Product xmlns:n1="https://psd-12.sentinel2.eo.esa.int/PSD/User_Product_Level-1B.xsd">
  <n1:General_Info>
    <Product_Info>
      <PROCESSING_LEVEL>Level-1B</PROCESSING_LEVEL>
      <PRODUCT_TYPE>S2MSI1B</PRODUCT_TYPE>
      <GENERATION_TIME>2015-12-29T10:42:23.000Z</GENERATION_TIME>
      <Datatake><SPACECRAFT_NAME>Sentinel-2A</SPACECRAFT_NAME></Datatake>
      <Product_Organisation>
        <Granule_List>
          <Granules granuleIdentifier="S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091926_D04_N02.01"/>
          <Granules granuleIdentifier="S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091930_D04_N02.01"/>
        </Granule_List>
      </Product_Organisation>
    </Product_Info>
    <Product_Image_Characteristics>
      <Spectral_Information_List>
        <Spectral_Information bandId="0" physicalBand="B1">
          <RESOLUTION>60</RESOLUTION>
          <Wavelength><MIN>430</MIN><MAX>457</MAX><CENTRAL>443.9</CENTRAL></Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="1" physicalBand="B2">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength><MIN>440</MIN><MAX>538</MAX><CENTRAL>496.6</CENTRAL></Wavelength>
        </Spectral_Information>
      </Spectral_Information_List>
      <Reflectance_Conversion>
        <Solar_Irradiance_List>
          <SOLAR_IRRADIANCE bandId="1" unit="W/m2/um">1941.63</SOLAR_IRRADIANCE>
        </Solar_Irradiance_List>
      </Reflectance_Conversion>
    </Product_Image_Characteristics>
  </n1:General_Info>
  <n1:Geometric_Info>
    <Coordinate_Reference_System><HORIZONTAL_CS_CODE>EPSG:4326</HORIZONTAL_CS_CODE></Coordinate_Reference_System>
  </n1:Geometric_Info>
</n1:Level-1B_User_Product>"#;

    const GRANULE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1B_Granule xmlns:n1="https://psd-12.sentinel2.eo.esa.int/PSD/S2_PDI_Level-1B_Granule_Metadata.xsd">
  <n1:General_Info>
    <GRANULE_ID>S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091926_D04_N02.01</GRANULE_ID>
    <DETECTOR_ID>04</DETECTOR_ID>
  </n1:General_Info>
  <n1:Geometric_Info>
    <Granule_Footprint><Granule_Footprint><Footprint>
      <EXT_POS_LIST>45.0 10.0 0 44.8 10.1 0 44.8 10.4 0 45.0 10.3 0 45.0 10.0 0</EXT_POS_LIST>
    </Footprint></Granule_Footprint></Granule_Footprint>
    <Granule_Dimensions>
      <Size resolution="10"><NROWS>2304</NROWS><NCOLS>2552</NCOLS></Size>
      <Size resolution="20"><NROWS>1152</NROWS><NCOLS>1276</NCOLS></Size>
      <Size resolution="60"><NROWS>384</NROWS><NCOLS>425</NCOLS></Size>
    </Granule_Dimensions>
    <Granule_Position><POSITION>4609</POSITION></Granule_Position>
    <Mean_Sun_Angle><ZENITH_ANGLE unit="deg">61.5</ZENITH_ANGLE><AZIMUTH_ANGLE unit="deg">160.2</AZIMUTH_ANGLE></Mean_Sun_Angle>
    <Mean_Viewing_Incidence_Angle_List>
      <Mean_Viewing_Incidence_Angle bandId="1"><ZENITH_ANGLE>5.1</ZENITH_ANGLE><AZIMUTH_ANGLE>104.0</AZIMUTH_ANGLE></Mean_Viewing_Incidence_Angle>
    </Mean_Viewing_Incidence_Angle_List>
  </n1:Geometric_Info>
</n1:Level-1B_Granule>"#;

    #[test]
    fn parses_product_header() {
        let mut reader = Reader::from_str(PRODUCT_XML);
        let header = parse_product_header(&mut reader).unwrap();
        assert_eq!(header.characteristics.spacecraft, "Sentinel-2A");
        assert_eq!(header.characteristics.processing_level, "Level-1B");
        assert_eq!(header.granule_ids.len(), 2);
        assert_eq!(header.bands.len(), 2);
        let b2 = &header.bands[1];
        assert_eq!(b2.physical_band, "B2");
        assert_eq!(b2.resolution, Some(SpatialResolution::R10M));
        assert_eq!(b2.bandwidth, 98.0);
        assert_eq!(b2.solar_irradiance, Some(1941.63));
        assert_eq!(header.bands[0].solar_irradiance, None);
        assert_eq!(header.crs.as_deref(), Some("EPSG:4326"));
    }

    #[test]
    fn parses_granule_header() {
        let mut reader = Reader::from_str(GRANULE_XML);
        let tile = parse_granule_header(&mut reader).unwrap();
        assert_eq!(tile.detector_id, "04");
        assert_eq!(tile.corners.len(), 4);
        assert_eq!(tile.corners[2], GeoPoint::new(44.8, 10.4));
        let g10 = tile.geometry(SpatialResolution::R10M).unwrap();
        assert_eq!((g10.num_cols, g10.num_rows_detector), (2552, 2304));
        assert_eq!(g10.position, Some(4609));
        assert_eq!(
            tile.geometry(SpatialResolution::R60M).unwrap().position,
            Some(4609)
        );
        assert_eq!(tile.sun_angles.as_ref().map(|s| s.zenith), Some(61.5));
        assert_eq!(tile.viewing_incidence_angles[0].band_id, Some(1));
    }

    #[test]
    fn duplicate_band_ids_are_rejected() {
        let xml = r#"<P>
            <Spectral_Information bandId="3" physicalBand="B4"><RESOLUTION>10</RESOLUTION></Spectral_Information>
            <Spectral_Information bandId="3" physicalBand="B5"><RESOLUTION>20</RESOLUTION></Spectral_Information>
        </P>"#;
        let mut reader = Reader::from_str(xml);
        assert!(matches!(
            parse_product_header(&mut reader),
            Err(MetadataError::DuplicateBand(3))
        ));
    }

    #[test]
    fn closed_lat_lon_ring_of_twelve_values_is_two_dimensional() {
        // six 2-D points, the last closing the ring
        let txt = "45.0 10.0 44.9 10.05 44.8 10.1 44.8 10.4 45.0 10.3 45.0 10.0";
        let points = parse_pos_list(txt, None).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[1], GeoPoint::new(44.9, 10.05));
        assert_eq!(points[4], GeoPoint::new(45.0, 10.3));
    }

    #[test]
    fn pos_list_follows_the_declared_dimension() {
        let txt = "45.0 10.0 0 44.8 10.1 0 44.8 10.4 0 45.0 10.3 0";
        let points = parse_pos_list(txt, Some(3)).unwrap();
        assert_eq!(points.len(), 4);
        assert_eq!(points[3], GeoPoint::new(45.0, 10.3));

        let points = parse_pos_list("45.0 10.0 44.8 10.1 44.8 10.4", Some(2)).unwrap();
        assert_eq!(points.len(), 3);
        assert!(parse_pos_list("45.0 10.0 44.8 10.1", Some(3)).is_err());
    }

    #[test]
    fn srs_dimension_attribute_is_read() {
        let xml = r#"<G><GRANULE_ID>G1</GRANULE_ID><DETECTOR_ID>04</DETECTOR_ID>
            <EXT_POS_LIST srsDimension="2">45.0 10.0 44.8 10.1 44.8 10.4 45.0 10.3 44.9 10.2 44.9 10.0</EXT_POS_LIST>
        </G>"#;
        let mut reader = Reader::from_str(xml);
        let tile = parse_granule_header(&mut reader).unwrap();
        assert_eq!(tile.corners.len(), 6);
        assert_eq!(tile.corners[5], GeoPoint::new(44.9, 10.0));
    }

    #[test]
    fn unsupported_resolution_is_rejected() {
        let xml = r#"<P><Spectral_Information bandId="0" physicalBand="B1"><RESOLUTION>30</RESOLUTION></Spectral_Information></P>"#;
        let mut reader = Reader::from_str(xml);
        assert!(matches!(
            parse_product_header(&mut reader),
            Err(MetadataError::UnsupportedResolution(30))
        ));
    }
}
