//! Quality mask definitions of MSI products.
//!
//! Only the definitions are modelled; mask rasters come from the GML quality
//! files, which are not read.
use serde::Serialize;

pub const LEVEL_L1A: u8 = 1 << 0;
pub const LEVEL_L1B: u8 = 1 << 1;
pub const LEVEL_L1C: u8 = 1 << 2;
pub const LEVEL_L2A: u8 = 1 << 3;

const ALL_LEVELS: u8 = LEVEL_L1A | LEVEL_L1B | LEVEL_L1C | LEVEL_L2A;
const DEFAULT_TRANSPARENCY: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const PALETTE: [Rgb; 18] = [
    Rgb(255, 0, 0),
    Rgb(178, 0, 0),
    Rgb(124, 0, 0),
    Rgb(0, 0, 255),
    Rgb(0, 0, 178),
    Rgb(0, 0, 124),
    Rgb(0, 255, 0),
    Rgb(0, 178, 0),
    Rgb(0, 124, 0),
    Rgb(255, 255, 0),
    Rgb(178, 178, 0),
    Rgb(124, 124, 0),
    Rgb(255, 0, 255),
    Rgb(178, 0, 178),
    Rgb(124, 0, 124),
    Rgb(255, 175, 175),
    Rgb(178, 122, 122),
    Rgb(124, 85, 85),
];

const ORANGE: Rgb = Rgb(255, 200, 0);

/// Palette color of the i-th mask
pub fn mask_color(i: usize) -> Rgb {
    PALETTE[i % PALETTE.len()]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskDefinition {
    pub main_type: &'static str,
    pub sub_type: &'static str,
    pub main_description: &'static str,
    pub sub_description: Option<&'static str>,
    pub name: &'static str,
    pub per_band: bool,
    /// Bitwise OR of the `LEVEL_*` flags
    pub levels: u8,
    /// Fixed color; palette color by table index otherwise
    pub color: Option<Rgb>,
    pub transparency: f64,
}

const fn def(
    main_type: &'static str,
    sub_type: &'static str,
    main_description: &'static str,
    sub_description: Option<&'static str>,
    name: &'static str,
    per_band: bool,
    levels: u8,
) -> MaskDefinition {
    MaskDefinition {
        main_type,
        sub_type,
        main_description,
        sub_description,
        name,
        per_band,
        levels,
        color: None,
        transparency: DEFAULT_TRANSPARENCY,
    }
}

pub const MASK_DEFINITIONS: [MaskDefinition; 13] = [
    def("MSK_DETFOO", "DETECTOR_FOOTPRINT", "Detector footprint mask", None, "detector_footprint", true, LEVEL_L1C | LEVEL_L2A),
    def("MSK_NODATA", "QT_NODATA_PIXELS", "Radiometric quality mask", Some("No-data pixels"), "nodata", true, ALL_LEVELS),
    def("MSK_NODATA", "QT_PARTIALLY_CORRECTED_PIXELS", "Radiometric quality mask", Some("Pixels partially corrected during cross-talk processing"), "partially_corrected_crosstalk", true, ALL_LEVELS),
    def("MSK_SATURA", "QT_SATURATED_PIXELS_L1A", "Radiometric quality mask", Some("Saturated pixels before on-ground radiometric processing"), "saturated_l1a", true, ALL_LEVELS),
    def("MSK_SATURA", "QT_SATURATED_PIXELS_L1B", "Radiometric quality mask", Some("Saturated pixels after on-ground radiometric processing"), "saturated_l1b", true, LEVEL_L1B | LEVEL_L1C | LEVEL_L2A),
    def("MSK_DEFECT", "QT_DEFECTIVE_PIXELS", "Radiometric quality mask", Some("Defective pixels (matching defective columns)"), "defective", true, ALL_LEVELS),
    MaskDefinition {
        color: Some(ORANGE),
        ..def("MSK_TECQUA", "ANC_LOST", "Technical quality mask", Some("Ancillary lost data"), "ancillary_lost", true, ALL_LEVELS)
    },
    def("MSK_TECQUA", "ANC_DEG", "Technical quality mask", Some("Ancillary degraded data"), "ancillary_degraded", true, ALL_LEVELS),
    def("MSK_TECQUA", "MSI_LOST", "Technical quality mask", Some("MSI lost data"), "msi_lost", true, ALL_LEVELS),
    def("MSK_TECQUA", "MSI_DEG", "Technical quality mask", Some("MSI degraded data"), "msi_degraded", true, ALL_LEVELS),
    def("MSK_CLOLOW", "CLOUD_INV", "Coarse cloud mask", None, "coarse_cloud", true, LEVEL_L1A | LEVEL_L1B),
    def("MSK_CLOUDS", "OPAQUE", "Finer cloud mask", Some("Opaque clouds"), "opaque_clouds", false, LEVEL_L1C | LEVEL_L2A),
    def("MSK_CLOUDS", "CIRRUS", "Finer cloud mask", Some("Cirrus clouds"), "cirrus_clouds", false, LEVEL_L1C | LEVEL_L2A),
];

impl MaskDefinition {
    pub fn description(&self) -> String {
        match self.sub_description {
            Some(sub) => format!("{} - {}", self.main_description, sub),
            None => self.main_description.to_string(),
        }
    }

    pub fn name_for_band(&self, band_name: &str) -> String {
        format!("{}_{}", self.name, band_name)
    }

    pub fn is_present_at_level(&self, level: u8) -> bool {
        self.levels & level != 0
    }
}

/// A mask attached to a product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductMask {
    pub name: String,
    pub description: String,
    pub main_type: String,
    pub sub_type: String,
    pub color: Rgb,
    pub transparency: f64,
}

/// Definitions present at `level`, each paired with its resolved color
pub fn masks_for_level(level: u8) -> Vec<(&'static MaskDefinition, Rgb)> {
    MASK_DEFINITIONS
        .iter()
        .enumerate()
        .filter(|(_, d)| d.is_present_at_level(level))
        .map(|(i, d)| (d, d.color.unwrap_or_else(|| mask_color(i))))
        .collect()
}

/// Product masks at `level`: one per band for per-band definitions, one
/// otherwise
pub fn product_masks<S: AsRef<str>>(level: u8, band_names: &[S]) -> Vec<ProductMask> {
    let mut masks = Vec::new();
    for (definition, color) in masks_for_level(level) {
        let make = |name: String, description: String| ProductMask {
            name,
            description,
            main_type: definition.main_type.to_string(),
            sub_type: definition.sub_type.to_string(),
            color,
            transparency: definition.transparency,
        };
        if definition.per_band {
            for band in band_names {
                let band = band.as_ref();
                masks.push(make(
                    definition.name_for_band(band),
                    format!("{} - {}", definition.description(), band),
                ));
            }
        } else {
            masks.push(make(definition.name.to_string(), definition.description()));
        }
    }
    masks
}
