use gdal::{Dataset, Metadata};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::io::gdal::GdalError;

/// Key/value metadata of one written raster plus its georeferencing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputMetadata {
    /// Upper-case keys, e.g. `BAND_NAME`, `DETECTOR_ID`
    pub items: BTreeMap<String, String>,
    pub geotransform: Option<[f64; 6]>,
    pub crs: Option<String>,
}

impl OutputMetadata {
    pub fn insert<K: Into<String>, V: ToString>(&mut self, key: K, value: V) {
        self.items.insert(key.into(), value.to_string());
    }

    /// JSON object with lower-case keys; numeric strings become numbers,
    /// except zero-padded identifiers such as detector `04`
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (key, value) in &self.items {
            let zero_padded = value.len() > 1 && value.starts_with('0') && !value.starts_with("0.");
            let json = if zero_padded {
                Value::String(value.clone())
            } else if let Ok(n) = value.parse::<u64>() {
                Value::Number(Number::from(n))
            } else if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
                Value::Number(n)
            } else {
                Value::String(value.clone())
            };
            object.insert(key.to_lowercase(), json);
        }
        if let Some(gt) = self.geotransform {
            let values = gt
                .iter()
                .filter_map(|&v| Number::from_f64(v).map(Value::Number))
                .collect();
            object.insert("geotransform".to_string(), Value::Array(values));
        }
        if let Some(crs) = self.crs.as_deref().filter(|c| !c.is_empty()) {
            object.insert("crs".to_string(), Value::String(crs.to_string()));
        }
        Value::Object(object)
    }
}

/// Set every metadata item on the default domain of `ds`
pub fn embed_tiff_metadata(ds: &mut Dataset, meta: &OutputMetadata) -> std::result::Result<(), GdalError> {
    for (key, value) in &meta.items {
        ds.set_metadata_item(key, value, "")?;
    }
    Ok(())
}

/// Write `<output>.json` next to the raster; returns the sidecar path
pub fn write_json_sidecar(output: &Path, meta: &OutputMetadata) -> Result<PathBuf> {
    let sidecar = output.with_extension("json");
    let text = serde_json::to_string_pretty(&meta.to_json())
        .map_err(|e| crate::error::Error::Processing(format!("sidecar JSON: {}", e)))?;
    std::fs::write(&sidecar, text)?;
    info!("Created metadata sidecar: {:?}", sidecar);
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_types_values() {
        let mut meta = OutputMetadata::default();
        meta.insert("BAND_NAME", "D04B2");
        meta.insert("LEVEL", 2);
        meta.insert("DETECTOR_ID", "04");
        meta.insert("WAVELENGTH", 492.7);
        meta.geotransform = Some([10.0, 0.1, 0.0, 50.0, 0.0, -0.1]);
        meta.crs = Some("EPSG:4326".into());

        let dir = tempfile::tempdir().unwrap();
        let path = write_json_sidecar(&dir.path().join("D04B2_L2.tif"), &meta).unwrap();
        assert_eq!(path.extension().unwrap(), "json");

        let json: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["band_name"], "D04B2");
        assert_eq!(json["level"], 2);
        assert_eq!(json["detector_id"], "04");
        assert_eq!(json["wavelength"], 492.7);
        assert_eq!(json["geotransform"].as_array().unwrap().len(), 6);
        assert_eq!(json["crs"], "EPSG:4326");
    }
}
