//! Square-matrix inversion over GF(16).
//!
//! The codec only ever inverts the 8x8 substituted generator matrices used by
//! the erasure decoder, so the dimension is fixed at [`DIM`].

use crate::error::{Error, Result};
use crate::gf;

/// Row/column count of every matrix the decoder inverts.
pub const DIM: usize = 8;

/// An 8x8 matrix of GF(16) symbols.
pub type Matrix = [[u8; DIM]; DIM];

/// The 8x8 identity matrix.
pub fn identity() -> Matrix {
    let mut m = [[0u8; DIM]; DIM];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1;
    }
    m
}

/// Invert `m` by Gauss-Jordan elimination on the augmented matrix `[M | I]`.
///
/// Pivot selection is deterministic: the first row with a non-zero entry in
/// the pivot column, scanning top-down. The input is not modified.
///
/// # Errors
/// * [`Error::Singular`] - if no pivot can be found for some column.
pub fn invert(m: &Matrix) -> Result<Matrix> {
    // Augmented matrix [M | I].
    let mut aug = [[0u8; 2 * DIM]; DIM];
    for i in 0..DIM {
        aug[i][..DIM].copy_from_slice(&m[i]);
        aug[i][DIM + i] = 1;
    }

    for i in 0..DIM {
        let Some(pivot_row) = (i..DIM).find(|&r| aug[r][i] != 0) else {
            return Err(Error::Singular);
        };
        if pivot_row != i {
            aug.swap(i, pivot_row);
        }

        // Scale the pivot row so the pivot becomes 1. The pivot is non-zero,
        // so the division cannot fail; a zero divisor would mean a singular
        // matrix either way.
        let pivot = aug[i][i];
        for j in 0..2 * DIM {
            aug[i][j] = gf::div(aug[i][j], pivot).map_err(|_| Error::Singular)?;
        }

        // Clear the pivot column in every other row.
        for k in 0..DIM {
            if k == i || aug[k][i] == 0 {
                continue;
            }
            let factor = aug[k][i];
            for j in 0..2 * DIM {
                aug[k][j] = gf::sub(aug[k][j], gf::mul(factor, aug[i][j]));
            }
        }
    }

    let mut out = [[0u8; DIM]; DIM];
    for i in 0..DIM {
        out[i].copy_from_slice(&aug[i][DIM..]);
    }
    Ok(out)
}

/// Matrix product over GF(16), used by the tests to check `inv * m == I`.
#[cfg(test)]
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let mut out = [[0u8; DIM]; DIM];
    for i in 0..DIM {
        for j in 0..DIM {
            let mut acc = 0;
            for (k, b_row) in b.iter().enumerate() {
                acc = gf::add(acc, gf::mul(a[i][k], b_row[j]));
            }
            out[i][j] = acc;
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identity_inverts_to_itself() {
        let id = identity();
        assert_eq!(invert(&id).unwrap(), id);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let mut m = identity();
        // Duplicate row makes the matrix rank-deficient.
        m[3] = m[2];
        assert!(matches!(invert(&m), Err(Error::Singular)));

        let zero = [[0u8; DIM]; DIM];
        assert!(matches!(invert(&zero), Err(Error::Singular)));
    }

    #[test]
    fn inverse_times_original_is_identity() {
        // A substituted generator: identity with rows 1 and 5 replaced by the
        // two parity rows, the exact shape the pattern table inverts.
        let mut m = identity();
        m[1] = [15, 11, 3, 3, 5, 2, 15, 7];
        m[5] = [1, 11, 2, 10, 11, 11, 9, 9];

        let inv = invert(&m).unwrap();
        assert_eq!(multiply(&inv, &m), identity());
        assert_eq!(multiply(&m, &inv), identity());
    }

    #[test]
    fn pivot_swap_path_is_exercised() {
        // Zero in the leading position forces a row swap on the first column.
        let mut m = identity();
        m[0] = [0, 1, 0, 0, 0, 0, 0, 0];
        m[1] = [1, 0, 0, 0, 0, 0, 0, 0];
        let inv = invert(&m).unwrap();
        assert_eq!(multiply(&inv, &m), identity());
    }
}
