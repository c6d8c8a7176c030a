use ndarray::{Array2, ArrayView2, s};
use tracing::debug;

/// Fit `src` to exactly `width` x `height` anchored at the upper-left corner.
///
/// Missing columns/rows on the right and bottom replicate the nearest edge
/// sample; surplus columns/rows are cropped.
pub fn fit_border_copy(src: ArrayView2<'_, u16>, width: usize, height: usize) -> Array2<u16> {
    let (rows, cols) = src.dim();
    if rows == height && cols == width {
        return src.to_owned();
    }
    debug!(
        "Border-copy fit: {}x{} -> {}x{}",
        cols, rows, width, height
    );
    if rows == 0 || cols == 0 {
        return Array2::zeros((height, width));
    }

    let keep_rows = rows.min(height);
    let keep_cols = cols.min(width);
    let mut out = Array2::zeros((height, width));
    out.slice_mut(s![..keep_rows, ..keep_cols])
        .assign(&src.slice(s![..keep_rows, ..keep_cols]));

    // Extend each copied row rightwards with its last sample
    if keep_cols < width {
        for r in 0..keep_rows {
            let edge = out[[r, keep_cols - 1]];
            out.slice_mut(s![r, keep_cols..]).fill(edge);
        }
    }
    // Then extend the last full row downwards
    if keep_rows < height {
        let last = out.row(keep_rows - 1).to_owned();
        for r in keep_rows..height {
            out.row_mut(r).assign(&last);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pads_right_and_bottom_with_edge_samples() {
        let src = array![[1u16, 2], [3, 4]];
        let out = fit_border_copy(src.view(), 3, 3);
        assert_eq!(out, array![[1u16, 2, 2], [3, 4, 4], [3, 4, 4]]);
    }

    #[test]
    fn crops_surplus() {
        let src = array![[1u16, 2, 3], [4, 5, 6]];
        assert_eq!(fit_border_copy(src.view(), 2, 1), array![[1u16, 2]]);
    }

    #[test]
    fn same_size_is_identity() {
        let src = array![[9u16, 8], [7, 6]];
        assert_eq!(fit_border_copy(src.view(), 2, 2), src);
    }
}
