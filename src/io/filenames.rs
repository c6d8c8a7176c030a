//! Naming conventions of L1B product packages: granule directories, granule
//! image files and metadata files.
use regex::Regex;
use std::sync::OnceLock;

fn granule_dir_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(S2[A-D_])_([A-Z0-9]{4})_MSI_(L1B)_GR_([A-Z0-9_]{4})_(\d{8}T\d{6})_S(\d{8}T\d{6})_D(\d{2})(?:_N(\d{2}\.\d{2}))?$",
        )
        .expect("granule directory pattern is valid")
    })
}

fn product_metadata_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(S2[A-D_])_([A-Z0-9]{4})_MTD_(SAF|DMP)L1B_.*\.xml$")
            .expect("product metadata pattern is valid")
    })
}

fn granule_metadata_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(S2[A-D_])_([A-Z0-9]{4})_MTD_L1B_GR_.*_D(\d{2})\.xml$")
            .expect("granule metadata pattern is valid")
    })
}

/// Parsed granule directory name, e.g.
/// `S2A_OPER_MSI_L1B_GR_SGS__20151229T104223_S20151229T091926_D04_N02.01`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GranuleDirName {
    pub name: String,
    pub mission: String,
    pub file_class: String,
    pub site_centre: String,
    pub creation_date: String,
    pub start_time: String,
    pub detector_id: String,
    pub baseline: Option<String>,
}

impl GranuleDirName {
    pub fn parse(name: &str) -> Option<Self> {
        let caps = granule_dir_regex().captures(name)?;
        Some(Self {
            name: name.to_string(),
            mission: caps[1].to_string(),
            file_class: caps[2].to_string(),
            site_centre: caps[4].to_string(),
            creation_date: caps[5].to_string(),
            start_time: caps[6].to_string(),
            detector_id: caps[7].to_string(),
            baseline: caps.get(8).map(|m| m.as_str().to_string()),
        })
    }

    fn stem(&self, file_type: &str) -> String {
        format!(
            "{}_{}_{}_L1B_GR_{}_{}_S{}_D{}",
            self.mission,
            self.file_class,
            file_type,
            self.site_centre,
            self.creation_date,
            self.start_time,
            self.detector_id
        )
    }

    /// Granule metadata file inside the granule directory
    pub fn metadata_filename(&self) -> String {
        format!("{}.xml", self.stem("MTD"))
    }

    /// Image file of `physical_band` inside `IMG_DATA`
    pub fn image_filename(&self, physical_band: &str) -> String {
        format!("{}_{}.jp2", self.stem("MSI"), image_band_code(physical_band))
    }
}

/// Band code used in image file names: `B1` -> `B01`, `B8A` stays `B8A`
pub fn image_band_code(physical_band: &str) -> String {
    let digits = physical_band.trim_start_matches('B');
    match digits.parse::<u32>() {
        Ok(n) => format!("B{:02}", n),
        Err(_) => format!("B{}", digits),
    }
}

pub fn is_product_metadata_filename(name: &str) -> bool {
    product_metadata_regex().is_match(name)
}

pub fn is_granule_metadata_filename(name: &str) -> bool {
    granule_metadata_regex().is_match(name)
}
