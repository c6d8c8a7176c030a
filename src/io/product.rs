//! Opening an L1B product: metadata, scene layout, geocodings and one
//! pyramid source per (band, detector) group.
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::assembler::{BandAssembler, BandDescriptor};
use crate::core::geocoding::{GeoCoding, GeoCodingBuilder, TiePointGrid};
use crate::core::masks::{LEVEL_L1B, ProductMask, product_masks};
use crate::core::params::ReaderParams;
use crate::core::pyramid::PyramidSource;
use crate::core::scene::SceneDescription;
use crate::error::{Error, Result};
use crate::io::cache::{CachingDecoder, default_cache_root};
use crate::io::decoder::TileDecoder;
use crate::io::filenames::{
    GranuleDirName, image_band_code, is_granule_metadata_filename, is_product_metadata_filename,
};
use crate::io::gdal::GdalTileDecoder;
use crate::io::metadata::{L1bMetadataParser, MetadataError, MetadataParser, SceneMetadata, SpectralBandInfo};
use crate::types::{BandGroupKey, SpatialResolution};

pub const DETECTOR_AUTO_GROUPING: &str = "D01:D02:D03:D04:D05:D06:D07:D08:D09:D10:D11:D12";

/// One output band: a physical band seen by one detector
#[derive(Debug, Clone)]
pub struct ProductBand {
    /// Detector first, e.g. `D04B2`
    pub name: String,
    pub key: BandGroupKey,
    pub info: SpectralBandInfo,
    pub no_data_value: u16,
    pub valid_pixel_expression: String,
    pub source: PyramidSource,
    pub geocoding: Option<Arc<GeoCoding>>,
}

impl ProductBand {
    pub fn resolution(&self) -> SpatialResolution {
        self.info.native_resolution()
    }
}

#[derive(Debug, Clone)]
pub struct Product {
    pub name: String,
    pub product_type: String,
    pub location: PathBuf,
    pub reference_resolution: SpatialResolution,
    pub scene_width: usize,
    pub scene_height: usize,
    pub num_resolutions_max: usize,
    pub auto_grouping: String,
    /// Ordered by name
    pub bands: Vec<ProductBand>,
    /// Latitude/longitude grids, one pair per geocoded detector
    pub tie_point_grids: Vec<TiePointGrid>,
    pub geocodings: BTreeMap<String, Arc<GeoCoding>>,
    pub masks: Vec<ProductMask>,
    pub metadata: SceneMetadata,
    pub scene: Arc<SceneDescription>,
}

impl Product {
    pub fn band(&self, name: &str) -> Option<&ProductBand> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn band_names(&self) -> Vec<&str> {
        self.bands.iter().map(|b| b.name.as_str()).collect()
    }

    /// Band of `detector_id` whose physical band is `physical_band`
    pub fn detector_band(&self, detector_id: &str, physical_band: &str) -> Option<&ProductBand> {
        self.bands
            .iter()
            .find(|b| b.key.detector_id == detector_id && b.key.physical_band == physical_band)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Product:     {}", self.name)?;
        writeln!(f, "Type:        {}", self.product_type)?;
        writeln!(f, "Location:    {}", self.location.display())?;
        writeln!(
            f,
            "Scene:       {}x{} px at {}",
            self.scene_width, self.scene_height, self.reference_resolution
        )?;
        let c = &self.metadata.characteristics;
        writeln!(f, "Spacecraft:  {}", c.spacecraft)?;
        writeln!(f, "Generated:   {}", c.production_date)?;
        writeln!(f, "Granules:    {}", self.metadata.tiles.len())?;
        writeln!(
            f,
            "Detectors:   {} geocoded of {}",
            self.geocodings.len(),
            self.scene.detector_ids().len()
        )?;
        writeln!(f, "Masks:       {}", self.masks.len())?;
        writeln!(f, "Bands:       {}", self.bands.len())?;
        for band in &self.bands {
            let (w, h) = band.source.level_size(0);
            writeln!(
                f,
                "  {:<8} {:>4} {:>7.1} nm  {}x{}  levels={}  tiles={}{}",
                band.name,
                band.resolution(),
                band.info.wavelength_central,
                w,
                h,
                band.source.num_resolutions(),
                band.source.tile_images().len(),
                if band.geocoding.is_some() { "" } else { "  (no geocoding)" }
            )?;
        }
        Ok(())
    }
}

/// Product reader with pluggable metadata parser and tile decoder
pub struct ProductReader<P: MetadataParser = L1bMetadataParser> {
    parser: P,
    decoder: Option<Arc<dyn TileDecoder>>,
}

impl Default for ProductReader<L1bMetadataParser> {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductReader<L1bMetadataParser> {
    pub fn new() -> Self {
        Self {
            parser: L1bMetadataParser,
            decoder: None,
        }
    }
}

impl<P: MetadataParser> ProductReader<P> {
    pub fn with_parser<Q: MetadataParser>(self, parser: Q) -> ProductReader<Q> {
        ProductReader {
            parser,
            decoder: self.decoder,
        }
    }

    /// Decode tiles with `decoder` instead of GDAL (the cache settings of
    /// the reader parameters are then ignored)
    pub fn with_decoder(mut self, decoder: Arc<dyn TileDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Open a product metadata file, or a granule metadata file to read that
    /// granule only
    pub fn open(&self, input: &Path, params: &ReaderParams) -> Result<Product> {
        if !input.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}", input.display()),
            )));
        }
        let (metadata_file, granule_filter) = resolve_input(input)?;
        let product_dir = metadata_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let product_name = metadata_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Opening product {} from {:?}", product_name, metadata_file);

        let mut metadata = self.parser.parse(&metadata_file)?;
        if let Some(tile_id) = &granule_filter {
            info!("Reading granule {} only", tile_id);
            metadata.retain_tile(tile_id);
        }
        if params.detectors.is_some() {
            metadata.tiles.retain(|t| params.accepts_detector(&t.detector_id));
        }

        let reference = params.reference_resolution;
        let scene = Arc::new(SceneDescription::create(&metadata, reference)?);
        let decoder = self.decoder_for(&product_dir, params);

        let descriptors = locate_band_files(&product_dir, &metadata);
        let (geocodings, tie_point_grids) = build_geocodings(&metadata, &scene, &descriptors);

        let assembled = BandAssembler::new(&product_name, &metadata, Arc::clone(&scene), decoder)
            .with_layouts(params.tile_layouts)
            .with_background(params.background)
            .assemble(&descriptors, &geocodings)?;

        let mut bands: Vec<ProductBand> = assembled
            .into_values()
            .map(|band| {
                let name = band.key.band_name();
                ProductBand {
                    valid_pixel_expression: format!("{}.raw > 0", name),
                    name,
                    key: band.key,
                    info: band.info,
                    no_data_value: 0,
                    source: band.source,
                    geocoding: band.geocoding,
                }
            })
            .collect();
        bands.sort_by(|a, b| a.name.cmp(&b.name));

        let masks = product_masks(LEVEL_L1B, &bands.iter().map(|b| b.name.as_str()).collect::<Vec<_>>());
        let scene_rect = scene.scene_rectangle();
        let product = Product {
            name: product_name,
            product_type: format!("S2_MSI_{}", metadata.characteristics.processing_level),
            location: product_dir,
            reference_resolution: reference,
            scene_width: scene_rect.width,
            scene_height: scene_rect.height,
            num_resolutions_max: params.tile_layouts.max_resolutions(),
            auto_grouping: DETECTOR_AUTO_GROUPING.to_string(),
            bands,
            tie_point_grids,
            geocodings: geocodings.into_iter().collect(),
            masks,
            metadata,
            scene,
        };
        info!(
            "Opened {}: {} bands, scene {}x{}",
            product.name,
            product.bands.len(),
            product.scene_width,
            product.scene_height
        );
        Ok(product)
    }

    fn decoder_for(&self, product_dir: &Path, params: &ReaderParams) -> Arc<dyn TileDecoder> {
        if let Some(decoder) = &self.decoder {
            return Arc::clone(decoder);
        }
        if !params.use_cache {
            return Arc::new(GdalTileDecoder::new());
        }
        let root = params.cache_dir.clone().unwrap_or_else(default_cache_root);
        let product_key = product_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "product".to_string());
        match CachingDecoder::new(GdalTileDecoder::new(), &root, &product_key) {
            Ok(cache) => {
                debug!("Decode cache: {:?}", cache.dir());
                Arc::new(cache)
            }
            Err(e) => {
                warn!("Decode cache unavailable under {:?}, decoding uncached: {}", root, e);
                Arc::new(GdalTileDecoder::new())
            }
        }
    }
}

/// Product metadata file and the granule to keep, if any
fn resolve_input(input: &Path) -> Result<(PathBuf, Option<String>)> {
    let file_name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if is_granule_metadata_filename(&file_name) {
        let granule_dir = input.parent();
        let product_dir = granule_dir.and_then(Path::parent).and_then(Path::parent);
        let (Some(granule_dir), Some(product_dir)) = (granule_dir, product_dir) else {
            return Err(unresolved_granule(&file_name));
        };
        let tile_id = granule_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(product_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .map(|n| is_product_metadata_filename(&n.to_string_lossy()))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();
        let metadata_file = candidates
            .into_iter()
            .next()
            .ok_or_else(|| unresolved_granule(&file_name))?;
        return Ok((metadata_file, Some(tile_id)));
    }

    if is_product_metadata_filename(&file_name) {
        return Ok((input.to_path_buf(), None));
    }

    Err(Error::Metadata(MetadataError::InvalidValue {
        field: "input".to_string(),
        value: format!("unhandled file type: {}", file_name),
    }))
}

fn unresolved_granule(file_name: &str) -> Error {
    Error::Metadata(MetadataError::InvalidValue {
        field: "input".to_string(),
        value: format!(
            "unable to retrieve the product of granule metadata file {}",
            file_name
        ),
    })
}

/// Image file of `band` inside a granule directory
fn granule_image_path(product_dir: &Path, tile_id: &str, band: &SpectralBandInfo) -> PathBuf {
    let img_dir = product_dir.join("GRANULE").join(tile_id).join("IMG_DATA");
    match GranuleDirName::parse(tile_id) {
        Some(granule) => img_dir.join(granule.image_filename(&band.physical_band)),
        // Non-standard granule names: pick the file by its band suffix
        None => {
            let suffix = format!("_{}.jp2", image_band_code(&band.physical_band));
            std::fs::read_dir(&img_dir)
                .ok()
                .and_then(|entries| {
                    entries
                        .filter_map(|e| e.ok().map(|e| e.path()))
                        .find(|p| p.to_string_lossy().ends_with(&suffix))
                })
                .unwrap_or_else(|| img_dir.join(format!("{}{}", tile_id, suffix)))
        }
    }
}

/// Existing image files per (band, detector); missing files are logged
pub fn locate_band_files(product_dir: &Path, metadata: &SceneMetadata) -> Vec<BandDescriptor> {
    let mut groups: BTreeMap<BandGroupKey, BandDescriptor> = BTreeMap::new();
    for tile in &metadata.tiles {
        for band in &metadata.bands {
            let path = granule_image_path(product_dir, &tile.id, band);
            if !path.is_file() {
                warn!("Missing file {:?}", path);
                continue;
            }
            let key = BandGroupKey::new(band.physical_band.clone(), tile.detector_id.clone());
            groups
                .entry(key.clone())
                .or_insert_with(|| BandDescriptor {
                    key,
                    info: band.clone(),
                    tile_files: BTreeMap::new(),
                })
                .tile_files
                .insert(tile.id.clone(), path);
        }
    }
    for band in &metadata.bands {
        if !groups.keys().any(|k| k.physical_band == band.physical_band) {
            warn!("No image files found for band {}", band.physical_band);
        }
    }
    groups.into_values().collect()
}

/// One geocoding per detector that has image files, plus its tie-point grids.
/// Degenerate detectors are logged and left without geocoding.
pub fn build_geocodings(
    metadata: &SceneMetadata,
    scene: &SceneDescription,
    descriptors: &[BandDescriptor],
) -> (HashMap<String, Arc<GeoCoding>>, Vec<TiePointGrid>) {
    let builder = GeoCodingBuilder::new(scene.reference_resolution());
    let mut geocodings = HashMap::new();
    let mut grids = Vec::new();

    let mut detectors: Vec<&str> = descriptors.iter().map(|d| d.key.detector_id.as_str()).collect();
    detectors.sort();
    detectors.dedup();

    for detector in detectors {
        let tiles: Vec<_> = scene
            .detector_tiles(detector)
            .into_iter()
            .filter_map(|i| metadata.tiles.get(i))
            .collect();
        match builder.build(detector, &tiles) {
            Ok(geocoding) => {
                if let Some((lat, lon)) = geocoding.tie_point_grids() {
                    grids.push(lat.clone());
                    grids.push(lon.clone());
                }
                geocodings.insert(detector.to_string(), Arc::new(geocoding));
            }
            Err(e) => warn!("Detector {} left without geocoding: {}", detector, e),
        }
    }
    (geocodings, grids)
}
