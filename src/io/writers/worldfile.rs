use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

fn world_file_extension(image: &Path) -> String {
    let ext = image
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "tif" | "tiff" => "tfw".to_string(),
        "png" => "pgw".to_string(),
        "jpg" | "jpeg" => "jgw".to_string(),
        "" => "wld".to_string(),
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.last()) {
                (Some(first), Some(last)) => format!("{}{}w", first, last),
                _ => "wld".to_string(),
            }
        }
    }
}

/// Write a world file next to the raster. World files use the pixel-center
/// convention, GDAL geotransforms the pixel-corner one.
pub fn write_world_file(output_image: &Path, geotransform: [f64; 6]) -> Result<PathBuf> {
    let world_path = output_image.with_extension(world_file_extension(output_image));

    let [x0, a, b, y0, d, e] = geotransform;
    let c = x0 + 0.5 * a + 0.5 * b;
    let f = y0 + 0.5 * d + 0.5 * e;

    let mut file = File::create(&world_path)?;
    for value in [a, d, b, e, c, f] {
        writeln!(file, "{:.12}", value)?;
    }
    Ok(world_path)
}

/// Write a .prj file with the projection (WKT or EPSG:XXXX)
pub fn write_prj_file(output_image: &Path, projection: &str) -> Result<PathBuf> {
    let prj_path = output_image.with_extension("prj");
    std::fs::write(&prj_path, projection.as_bytes())?;
    Ok(prj_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_file_shifts_to_pixel_center() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("D04B2_L0.tif");
        let path = write_world_file(&image, [10.0, 0.5, 0.0, 50.0, 0.0, -0.25]).unwrap();
        assert_eq!(path.extension().unwrap(), "tfw");

        let lines: Vec<f64> = std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.parse().unwrap())
            .collect();
        assert_eq!(lines, vec![0.5, 0.0, 0.0, -0.25, 10.25, 49.875]);
    }

    #[test]
    fn extension_fallbacks() {
        assert_eq!(world_file_extension(Path::new("a.TIF")), "tfw");
        assert_eq!(world_file_extension(Path::new("a.bmp")), "bpw");
        assert_eq!(world_file_extension(Path::new("a")), "wld");
    }
}
