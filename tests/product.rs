mod common;

use approx::assert_abs_diff_eq;
use ndarray::s;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use s2mosaic::core::indices::LOW_FLAG;
use s2mosaic::io::filenames::GranuleDirName;
use s2mosaic::{Error, PyramidSource, ReaderParams, SpatialResolution, api};

use common::MemoryDecoder;

const PRODUCT_MTD: &str =
    "S2A_OPER_MTD_SAFL1B_PDMC_20151229T140000_R036_V20151229T091926_20151229T092018.xml";

const GRANULES: [&str; 3] = [
    "S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091926_D04_N02.01",
    "S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091930_D04_N02.01",
    "S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091934_D04_N02.01",
];

fn product_xml() -> String {
    let granules: String = GRANULES
        .iter()
        .map(|g| format!("<Granules granuleIdentifier=\"{}\"/>", g))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1B_User_Product xmlns:n1="https://psd-12.sentinel2.eo.esa.int/PSD/User_Product_Level-1B.xsd">
  <n1:General_Info>
    <Product_Info>
      <PROCESSING_LEVEL>Level-1B</PROCESSING_LEVEL>
      <PRODUCT_TYPE>S2MSI1B</PRODUCT_TYPE>
      <GENERATION_TIME>2015-12-29T10:42:23.000Z</GENERATION_TIME>
      <Datatake><SPACECRAFT_NAME>Sentinel-2A</SPACECRAFT_NAME></Datatake>
      <Product_Organisation><Granule_List>{}</Granule_List></Product_Organisation>
    </Product_Info>
    <Product_Image_Characteristics>
      <Spectral_Information_List>
        <Spectral_Information bandId="3" physicalBand="B4">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength><MIN>646</MIN><MAX>685</MAX><CENTRAL>664.6</CENTRAL></Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="4" physicalBand="B5">
          <RESOLUTION>20</RESOLUTION>
          <Wavelength><MIN>694</MIN><MAX>714</MAX><CENTRAL>704.1</CENTRAL></Wavelength>
        </Spectral_Information>
      </Spectral_Information_List>
    </Product_Image_Characteristics>
  </n1:General_Info>
</n1:Level-1B_User_Product>"#,
        granules
    )
}

fn granule_xml(id: &str, position: u32, top: f64) -> String {
    let bottom = top - 0.1;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1B_Granule xmlns:n1="https://psd-12.sentinel2.eo.esa.int/PSD/S2_PDI_Level-1B_Granule_Metadata.xsd">
  <n1:General_Info>
    <GRANULE_ID>{id}</GRANULE_ID>
    <DETECTOR_ID>04</DETECTOR_ID>
  </n1:General_Info>
  <n1:Geometric_Info>
    <Granule_Footprint><Granule_Footprint><Footprint>
      <EXT_POS_LIST>{top} 10.0 0 {bottom} 10.05 0 {bottom} 10.35 0 {top} 10.3 0 {top} 10.0 0</EXT_POS_LIST>
    </Footprint></Granule_Footprint></Granule_Footprint>
    <Granule_Dimensions>
      <Size resolution="10"><NROWS>30</NROWS><NCOLS>20</NCOLS></Size>
      <Size resolution="20"><NROWS>15</NROWS><NCOLS>10</NCOLS></Size>
    </Granule_Dimensions>
    <Granule_Position><POSITION>{position}</POSITION></Granule_Position>
  </n1:Geometric_Info>
</n1:Level-1B_Granule>"#
    )
}

struct Fixture {
    _dir: tempfile::TempDir,
    product_dir: PathBuf,
    decoder: Arc<MemoryDecoder>,
}

impl Fixture {
    fn metadata_file(&self) -> PathBuf {
        self.product_dir.join(PRODUCT_MTD)
    }

    fn granule_metadata_file(&self, index: usize) -> PathBuf {
        let name = GranuleDirName::parse(GRANULES[index]).unwrap();
        self.product_dir
            .join("GRANULE")
            .join(GRANULES[index])
            .join(name.metadata_filename())
    }

    fn open(&self, input: &Path, background: u16) -> s2mosaic::Result<s2mosaic::Product> {
        let params = ReaderParams {
            background,
            use_cache: false,
            ..Default::default()
        };
        api::open_product_with_decoder(input, &params, self.decoder.clone())
    }
}

fn image_path(product_dir: &Path, index: usize, physical_band: &str) -> PathBuf {
    let name = GranuleDirName::parse(GRANULES[index]).unwrap();
    product_dir
        .join("GRANULE")
        .join(GRANULES[index])
        .join("IMG_DATA")
        .join(name.image_filename(physical_band))
}

/// Three granules of detector 04; B4 everywhere, B5 missing in the middle granule
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let product_dir = dir.path().join("S2A_OPER_PRD_MSIL1B.SAFE");
    fs::create_dir_all(&product_dir).unwrap();
    fs::write(product_dir.join(PRODUCT_MTD), product_xml()).unwrap();

    let mut decoder = MemoryDecoder::new();
    for (i, granule) in GRANULES.iter().enumerate() {
        let name = GranuleDirName::parse(granule).unwrap();
        let granule_dir = product_dir.join("GRANULE").join(granule);
        fs::create_dir_all(granule_dir.join("IMG_DATA")).unwrap();
        let top = 45.0 - i as f64 * 0.1;
        fs::write(
            granule_dir.join(name.metadata_filename()),
            granule_xml(granule, 1 + 30 * i as u32, top),
        )
        .unwrap();

        let b4 = image_path(&product_dir, i, "B4");
        fs::write(&b4, b"").unwrap();
        decoder.insert_const(b4, 20, 30, 100 * (i as u16 + 1));
        if i != 1 {
            let b5 = image_path(&product_dir, i, "B5");
            fs::write(&b5, b"").unwrap();
            decoder.insert_const(b5, 10, 15, 300 * (i as u16 + 1));
        }
    }

    Fixture {
        _dir: dir,
        product_dir,
        decoder: Arc::new(decoder),
    }
}

#[test]
fn opens_the_product_structure() {
    let fx = fixture();
    let product = fx.open(&fx.metadata_file(), 0).unwrap();

    assert_eq!(product.band_names(), vec!["D04B4", "D04B5"]);
    assert_eq!(product.product_type, "S2_MSI_Level-1B");
    assert_eq!((product.scene_width, product.scene_height), (20, 90));
    assert_eq!(product.reference_resolution, SpatialResolution::R10M);
    assert_eq!(product.masks.len(), 20);
    assert!(product.geocodings.contains_key("04"));
    assert_eq!(product.tie_point_grids.len(), 2);

    let b4 = product.band("D04B4").unwrap();
    assert_eq!(b4.valid_pixel_expression, "D04B4.raw > 0");
    assert_eq!(b4.source.tile_images().len(), 3);
    assert_eq!(product.band("D04B5").unwrap().source.tile_images().len(), 2);
}

#[test]
fn band_levels_follow_the_scene_layout() {
    let fx = fixture();
    let product = fx.open(&fx.metadata_file(), 7).unwrap();

    let b4 = api::read_band_level(&product, "D04B4", 0).unwrap();
    assert_eq!(b4.dim(), (90, 20));
    assert_eq!(b4[[0, 0]], 100);
    assert_eq!(b4[[45, 10]], 200);
    assert_eq!(b4[[89, 19]], 300);

    // 20 m band on its native grid; the middle granule has no B5 file
    let b5 = api::read_band_level(&product, "D04B5", 0).unwrap();
    assert_eq!(b5.dim(), (45, 10));
    assert_eq!(b5[[0, 0]], 300);
    assert_eq!(b5[[20, 5]], 7);
    assert_eq!(b5[[44, 9]], 900);

    assert_eq!(api::read_band_level(&product, "D04B4", 1).unwrap().dim(), (45, 10));
}

#[test]
fn file_removed_from_the_last_granule_leaves_background() {
    let fx = fixture();
    fs::remove_file(image_path(&fx.product_dir, 2, "B4")).unwrap();
    fs::remove_file(image_path(&fx.product_dir, 2, "B5")).unwrap();
    let product = fx.open(&fx.metadata_file(), 7).unwrap();
    assert_eq!(product.band("D04B4").unwrap().source.tile_images().len(), 2);

    let b4 = api::read_band_level(&product, "D04B4", 0).unwrap();
    assert_eq!(b4.dim(), (90, 20));
    assert_eq!(b4[[59, 19]], 200);
    assert!(b4.slice(s![60.., ..]).iter().all(|&v| v == 7));

    // only the first granule keeps a B5 file
    let b5 = api::read_band_level(&product, "D04B5", 0).unwrap();
    assert_eq!(b5.dim(), (45, 10));
    assert!(b5.slice(s![..15, ..]).iter().all(|&v| v == 300));
    assert!(b5.slice(s![15.., ..]).iter().all(|&v| v == 7));
}

#[test]
fn granule_metadata_opens_that_granule_only() {
    let fx = fixture();
    let product = fx.open(&fx.granule_metadata_file(2), 0).unwrap();

    assert_eq!((product.scene_width, product.scene_height), (20, 30));
    let b4 = product.band("D04B4").unwrap();
    assert!(matches!(b4.source, PyramidSource::SingleTile(_)));
    let level0 = b4.source.level(0).unwrap();
    assert!(level0.iter().all(|&v| v == 300));
}

#[test]
fn unknown_band_is_reported() {
    let fx = fixture();
    let product = fx.open(&fx.metadata_file(), 0).unwrap();
    assert!(matches!(
        api::read_band_level(&product, "D05B4", 0),
        Err(Error::UnknownBand(name)) if name == "D05B4"
    ));
}

#[test]
fn product_without_image_files_has_no_bands() {
    let fx = fixture();
    for i in 0..GRANULES.len() {
        for band in ["B4", "B5"] {
            let _ = fs::remove_file(image_path(&fx.product_dir, i, band));
        }
    }
    assert!(matches!(
        fx.open(&fx.metadata_file(), 0),
        Err(Error::NoBandsFound { .. })
    ));
}

#[test]
fn ndi45_uses_the_red_edge_grid() {
    let fx = fixture();
    let product = fx.open(&fx.metadata_file(), 7).unwrap();
    let result = api::compute_ndi45(&product, "04", 0).unwrap();

    assert_eq!(result.b4_band, "D04B4");
    assert_eq!(result.b5_band, "D04B5");
    assert_eq!(result.values.dim(), (45, 10));
    // (300 - 100) / (300 + 100)
    assert_abs_diff_eq!(result.values[[0, 0]], 0.5, epsilon = 1e-6);
    assert_eq!(result.flags[[0, 0]], 0);
    // background in B5 drives the index negative
    assert!(result.values[[20, 0]] < 0.0);
    assert_eq!(result.flags[[20, 0]], LOW_FLAG);
    assert!(result.geotransform.is_some());
    assert_eq!(result.crs.as_deref(), Some("EPSG:4326"));
}

#[test]
fn geocoding_spans_the_detector_strip() {
    let fx = fixture();
    let product = fx.open(&fx.metadata_file(), 0).unwrap();
    let geocoding = &product.geocodings["04"];

    let top_left = geocoding.geo_pos(0.0, 0.0);
    assert_abs_diff_eq!(top_left.lat, 45.0, epsilon = 1e-5);
    assert_abs_diff_eq!(top_left.lon, 10.0, epsilon = 1e-5);
    let bottom_right = geocoding.geo_pos(20.0, 90.0);
    assert_abs_diff_eq!(bottom_right.lat, 44.7, epsilon = 1e-5);
    assert_abs_diff_eq!(bottom_right.lon, 10.35, epsilon = 1e-5);
}

#[test]
fn exports_a_band_level_with_sidecars() {
    let fx = fixture();
    let product = fx.open(&fx.metadata_file(), 0).unwrap();
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join(api::band_level_filename("D04B4", 1));

    let files = api::export_band_level(&product, "D04B4", 1, &output).unwrap();
    assert!(files.raster.is_file());
    assert!(files.world_file.as_ref().is_some_and(|p| p.is_file()));
    assert!(files.prj_file.as_ref().is_some_and(|p| p.is_file()));

    let sidecar = files.sidecar.unwrap();
    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(sidecar).unwrap()).unwrap();
    assert_eq!(json["band_name"], "D04B4");
    assert_eq!(json["level"], 1);
    assert_eq!(json["detector_id"], "04");
}
