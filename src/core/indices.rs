//! NDI45 red-edge index over two assembled band levels.
use ndarray::{Array2, Zip};

use crate::error::{Error, Result};
use crate::io::metadata::SpectralBandInfo;

pub const NDI45_BAND_NAME: &str = "ndi45";
pub const NDI45_FLAGS_BAND_NAME: &str = "ndi45_flags";

/// Division produced NaN or infinity; the value was replaced by 0
pub const ARITHMETIC_FLAG: u8 = 1;
/// Value below 0
pub const LOW_FLAG: u8 = 2;
/// Value above 1
pub const HIGH_FLAG: u8 = 4;

/// Central-wavelength windows (nm) used to pick the input bands
pub const B4_WAVELENGTH_RANGE: (f64, f64) = (650.0, 680.0);
pub const B5_WAVELENGTH_RANGE: (f64, f64) = (698.0, 713.0);

/// `(f5*B5 - f4*B4) / (f5*B5 + f4*B4)` with per-pixel flags
pub fn ndi45(
    b4: &Array2<u16>,
    b5: &Array2<u16>,
    b4_factor: f32,
    b5_factor: f32,
) -> Result<(Array2<f32>, Array2<u8>)> {
    if b4.dim() != b5.dim() {
        return Err(Error::Processing(format!(
            "NDI45 inputs differ in shape: {:?} vs {:?}",
            b4.dim(),
            b5.dim()
        )));
    }
    let mut values = Array2::<f32>::zeros(b4.dim());
    let mut flags = Array2::<u8>::zeros(b4.dim());
    Zip::from(&mut values)
        .and(&mut flags)
        .and(b4)
        .and(b5)
        .par_for_each(|value, flag, &r4, &r5| {
            let red4 = b4_factor * r4 as f32;
            let red5 = b5_factor * r5 as f32;
            let mut v = (red5 - red4) / (red5 + red4);
            let mut f = 0;
            if !v.is_finite() {
                f |= ARITHMETIC_FLAG;
                v = 0.0;
            }
            if v < 0.0 {
                f |= LOW_FLAG;
            }
            if v > 1.0 {
                f |= HIGH_FLAG;
            }
            *value = v;
            *flag = f;
        });
    Ok((values, flags))
}

/// First band whose central wavelength lies in `[min, max]`
pub fn find_band_by_wavelength(
    bands: &[SpectralBandInfo],
    (min, max): (f64, f64),
) -> Option<&SpectralBandInfo> {
    bands
        .iter()
        .find(|b| b.wavelength_central >= min && b.wavelength_central <= max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn index_and_flags() {
        let b4 = array![[100u16, 0, 300]];
        let b5 = array![[300u16, 0, 100]];
        let (values, flags) = ndi45(&b4, &b5, 1.0, 1.0).unwrap();

        assert_abs_diff_eq!(values[[0, 0]], 0.5, epsilon = 1e-6);
        assert_eq!(flags[[0, 0]], 0);
        // 0/0
        assert_eq!(values[[0, 1]], 0.0);
        assert_eq!(flags[[0, 1]], ARITHMETIC_FLAG);
        assert_abs_diff_eq!(values[[0, 2]], -0.5, epsilon = 1e-6);
        assert_eq!(flags[[0, 2]], LOW_FLAG);
    }

    #[test]
    fn factors_can_push_above_one() {
        // 200 / 0
        let (values, flags) = ndi45(&array![[100u16]], &array![[100u16]], -1.0, 1.0).unwrap();
        assert_eq!(values[[0, 0]], 0.0);
        assert_eq!(flags[[0, 0]], ARITHMETIC_FLAG);

        let (values, flags) = ndi45(&array![[100u16]], &array![[300u16]], -1.0, 1.0).unwrap();
        assert_abs_diff_eq!(values[[0, 0]], 2.0, epsilon = 1e-6);
        assert_eq!(flags[[0, 0]], HIGH_FLAG);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(ndi45(&array![[1u16, 2]], &array![[1u16]], 1.0, 1.0).is_err());
    }

    #[test]
    fn bands_are_found_by_wavelength() {
        let bands = vec![
            SpectralBandInfo {
                band_id: 3,
                physical_band: "B4".into(),
                wavelength_central: 665.0,
                ..Default::default()
            },
            SpectralBandInfo {
                band_id: 4,
                physical_band: "B5".into(),
                wavelength_central: 705.0,
                ..Default::default()
            },
        ];
        assert_eq!(find_band_by_wavelength(&bands, B4_WAVELENGTH_RANGE).unwrap().band_id, 3);
        assert_eq!(find_band_by_wavelength(&bands, B5_WAVELENGTH_RANGE).unwrap().band_id, 4);
        assert!(find_band_by_wavelength(&bands, (400.0, 450.0)).is_none());
    }
}
