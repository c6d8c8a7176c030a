use fast_image_resize::{PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result};

/// Nearest-neighbour rescale of a 16-bit raster to `cols` x `rows`.
///
/// Sample values are never interpolated, so background and sensor values
/// survive unchanged.
pub fn resize_nearest_u16(src: &Array2<u16>, cols: usize, rows: usize) -> Result<Array2<u16>> {
    let (src_rows, src_cols) = src.dim();
    if src_rows == rows && src_cols == cols {
        return Ok(src.clone());
    }
    if src_rows == 0 || src_cols == 0 || rows == 0 || cols == 0 {
        return Err(Error::Processing(format!(
            "cannot rescale {}x{} raster to {}x{}",
            src_cols, src_rows, cols, rows
        )));
    }
    debug!(
        "Nearest rescale: {}x{} -> {}x{}",
        src_cols, src_rows, cols, rows
    );

    // fast_image_resize takes U16 pixels as little-endian bytes
    let mut src_bytes = Vec::with_capacity(src.len() * 2);
    for &v in src.iter() {
        src_bytes.extend_from_slice(&v.to_le_bytes());
    }
    let src_image = Image::from_vec_u8(src_cols as u32, src_rows as u32, src_bytes, PixelType::U16)
        .map_err(|e| Error::Processing(format!("source image: {}", e)))?;
    let mut dst_image = Image::new(cols as u32, rows as u32, PixelType::U16);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Nearest);
    let mut resizer = Resizer::new();
    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| Error::Processing(format!("resize: {}", e)))?;

    let dst_bytes = dst_image.into_vec();
    let data: Vec<u16> = dst_bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Processing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn downscale_keeps_source_values_only() {
        let src = Array2::from_shape_fn((6, 9), |(r, c)| (r * 100 + c) as u16);
        let out = resize_nearest_u16(&src, 3, 2).unwrap();
        assert_eq!(out.dim(), (2, 3));
        let allowed: BTreeSet<u16> = src.iter().copied().collect();
        assert!(out.iter().all(|v| allowed.contains(v)));
    }

    #[test]
    fn constant_raster_stays_constant() {
        let src = Array2::from_elem((4, 4), 1234u16);
        let out = resize_nearest_u16(&src, 10, 7).unwrap();
        assert!(out.iter().all(|&v| v == 1234));
    }

    #[test]
    fn zero_target_is_rejected() {
        let src = Array2::from_elem((4, 4), 1u16);
        assert!(resize_nearest_u16(&src, 0, 4).is_err());
    }
}
