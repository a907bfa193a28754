//
// mask.rs
// Dicom-Deface
//
// Fixed lower-left redaction mask for sagittal head slices and the pixel-wise applicator.
//
// Thales Matheus Mendonça Santos - October 2026

use ndarray::{Array2, Zip};
use thiserror::Error;

/// `true` keeps a pixel, `false` redacts it.
pub type MaskMatrix = Array2<bool>;

/// Rows with index <= 150 are never redacted.
pub const MASK_START_ROW: usize = 150;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("pixel matrix is {pixels:?} but mask is {mask:?}")]
    ShapeMismatch {
        pixels: (usize, usize),
        mask: (usize, usize),
    },
}

/// Builds the redaction mask for a `rows x cols` slice.
///
/// Every row `y > 150` loses its first `y / 2` columns (clamped to the width);
/// everything else is kept. The rule is a fixed pixel-coordinate heuristic and
/// ignores pixel spacing.
pub fn generate_mask(rows: usize, cols: usize) -> MaskMatrix {
    Array2::from_shape_fn((rows, cols), |(y, x)| {
        !(y > MASK_START_ROW && x < (y / 2).min(cols))
    })
}

/// Returns a copy of `pixels` with every masked-out sample set to zero.
pub fn apply_mask<T>(pixels: &Array2<T>, mask: &MaskMatrix) -> Result<Array2<T>, MaskError>
where
    T: Copy + Default,
{
    if pixels.dim() != mask.dim() {
        return Err(MaskError::ShapeMismatch {
            pixels: pixels.dim(),
            mask: mask.dim(),
        });
    }

    Ok(Zip::from(pixels)
        .and(mask)
        .map_collect(|&value, &keep| if keep { value } else { T::default() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plane::{classify_plane, PlaneLabel, DEFAULT_THRESHOLD};

    #[test]
    fn short_images_are_left_untouched() {
        let mask = generate_mask(100, 50);
        assert_eq!(mask.dim(), (100, 50));
        assert!(mask.iter().all(|&keep| keep));

        assert!(generate_mask(151, 40).iter().all(|&keep| keep));
    }

    #[test]
    fn redaction_starts_after_row_150() {
        let mask = generate_mask(200, 100);

        assert!(mask.row(150).iter().all(|&keep| keep));

        let row = mask.row(151);
        assert!(row.iter().take(75).all(|&keep| !keep));
        assert!(row.iter().skip(75).all(|&keep| keep));

        let last = mask.row(199);
        assert!(last.iter().take(99).all(|&keep| !keep));
        assert!(last[99]);
    }

    #[test]
    fn cut_is_clamped_to_the_width() {
        let mask = generate_mask(300, 20);
        assert!(mask.row(299).iter().all(|&keep| !keep));
        assert!(mask.row(151).iter().all(|&keep| !keep));
    }

    #[test]
    fn zero_dimensions_give_an_empty_mask() {
        assert_eq!(generate_mask(0, 10).len(), 0);
        assert_eq!(generate_mask(300, 0).len(), 0);
        assert_eq!(generate_mask(0, 0).dim(), (0, 0));
    }

    #[test]
    fn apply_keeps_true_cells_and_zeroes_false_ones() {
        let pixels = Array2::from_shape_fn((4, 3), |(y, x)| (y * 3 + x + 1) as u16);
        let mask = Array2::from_shape_fn((4, 3), |(y, x)| (y + x) % 2 == 0);

        let out = apply_mask(&pixels, &mask).expect("same shape");
        for ((idx, &value), &keep) in out.indexed_iter().zip(mask.iter()) {
            if keep {
                assert_eq!(value, pixels[idx]);
            } else {
                assert_eq!(value, 0);
            }
        }
    }

    #[test]
    fn apply_does_not_touch_its_input() {
        let pixels = Array2::from_elem((200, 10), 7_u8);
        let before = pixels.clone();
        let _ = apply_mask(&pixels, &generate_mask(200, 10)).expect("same shape");
        assert_eq!(pixels, before);
    }

    #[test]
    fn apply_is_idempotent() {
        let pixels = Array2::from_shape_fn((220, 90), |(y, x)| ((y * 7 + x) % 251) as u8);
        let mask = generate_mask(220, 90);
        let once = apply_mask(&pixels, &mask).expect("once");
        let twice = apply_mask(&once, &mask).expect("twice");
        assert_eq!(once, twice);
    }

    #[test]
    fn apply_handles_empty_matrices() {
        let pixels: Array2<u16> = Array2::zeros((0, 0));
        let out = apply_mask(&pixels, &generate_mask(0, 0)).expect("empty");
        assert_eq!(out.dim(), (0, 0));
    }

    #[test]
    fn shape_mismatch_fails_loudly() {
        let pixels = Array2::from_elem((10, 10), 1_u16);
        let err = apply_mask(&pixels, &generate_mask(10, 11)).unwrap_err();
        assert_eq!(
            err,
            MaskError::ShapeMismatch {
                pixels: (10, 10),
                mask: (10, 11)
            }
        );
    }

    #[test]
    fn sagittal_slice_gets_its_lower_left_corner_removed() {
        let plane = classify_plane([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], DEFAULT_THRESHOLD);
        assert_eq!(plane, PlaneLabel::Sagittal);

        let pixels = Array2::from_elem((300, 200), 255_u16);
        let masked = apply_mask(&pixels, &generate_mask(300, 200)).expect("same shape");

        for ((y, x), &value) in masked.indexed_iter() {
            let expected = if y > 150 && x < y / 2 { 0 } else { 255 };
            assert_eq!(value, expected, "pixel ({y}, {x})");
        }
    }
}
