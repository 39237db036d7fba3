//! Matrices over GF(2^8): Vandermonde/Cauchy construction, submatrix
//! extraction, multiply, and Gauss-Jordan inversion.
//!
//! A thin row-major `Vec<u8>` wrapper, generalized from the teacher's raw
//! `encode_matrix: Vec<u8>` field in `spdk::isal_codec::IsalCodec` into a
//! named type with the operations the RS codec needs to build generator
//! matrices and invert survivor submatrices.

use crate::error::{Error, Result};
use crate::gf::GaloisField;

/// A row-major matrix of GF(2^8) elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl Matrix {
    /// Builds a matrix from row-major data. `data.len()` must equal
    /// `rows * cols`.
    pub fn from_rows(rows: usize, cols: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), rows * cols, "matrix data length mismatch");
        Self { rows, cols, data }
    }

    /// A `rows x cols` zero matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0u8; rows * cols],
        }
    }

    /// The `n x n` identity matrix.
    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> u8 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: u8) {
        self.data[r * self.cols + c] = v;
    }

    /// Row `r` as a slice of `cols` elements.
    pub fn row(&self, r: usize) -> &[u8] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    fn row_mut(&mut self, r: usize) -> &mut [u8] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    /// Builds a Vandermonde matrix with `rows` rows and `cols` columns:
    /// `m[i][j] = g^(i*j mod 255)` for generator `g = 2`. Every entry of
    /// row 0 or column 0 is `g^0 = 1`, and every square submatrix is
    /// invertible.
    pub fn vandermonde(rows: usize, cols: usize) -> Self {
        let exp = &crate::gf::tables().exp;
        let mut m = Self::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                let power = (i * j) % 255;
                m.set(i, j, exp[power]);
            }
        }
        m
    }

    /// Builds an `rows x cols` Cauchy matrix over two disjoint point sets:
    /// `m[i][j] = 1 / (x_i XOR y_j)` with `x_i = i` for `i` in
    /// `[0, rows)` and `y_j = rows + j` for `j` in `[0, cols)`. The two
    /// sets are disjoint by construction, so `x_i XOR y_j` is never zero
    /// and every entry is defined; any square submatrix of a Cauchy
    /// matrix built this way is invertible.
    pub fn cauchy(rows: usize, cols: usize) -> Self {
        let gf = GaloisField::new();
        let mut m = Self::zeros(rows, cols);
        for i in 0..rows {
            let x = i as u8;
            for j in 0..cols {
                let y = (rows + j) as u8;
                let denom = x ^ y;
                m.set(i, j, gf.inv_byte(denom));
            }
        }
        m
    }

    /// Extracts the dense rectangular submatrix spanning rows `[r0, r1)`
    /// and columns `[c0, c1)`.
    pub fn sub_matrix(&self, r0: usize, c0: usize, r1: usize, c1: usize) -> Self {
        assert!(r0 <= r1 && r1 <= self.rows, "row range out of bounds");
        assert!(c0 <= c1 && c1 <= self.cols, "column range out of bounds");
        let mut out = Self::zeros(r1 - r0, c1 - c0);
        for (out_r, src_r) in (r0..r1).enumerate() {
            out.row_mut(out_r).copy_from_slice(&self.row(src_r)[c0..c1]);
        }
        out
    }

    /// Extracts the submatrix made of the given row indices (all
    /// columns), preserving order. Used to pick the `k` surviving rows of
    /// a generator matrix for decode.
    pub fn sub_matrix_rows(&self, row_indices: &[usize]) -> Self {
        let mut out = Self::zeros(row_indices.len(), self.cols);
        for (out_r, &src_r) in row_indices.iter().enumerate() {
            out.row_mut(out_r).copy_from_slice(self.row(src_r));
        }
        out
    }

    /// Matrix product `self * rhs` over GF(2^8).
    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.cols, rhs.rows, "matrix dimension mismatch");
        let gf = GaloisField::new();
        let mut out = Matrix::zeros(self.rows, rhs.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(i, k);
                if a == 0 {
                    continue;
                }
                for j in 0..rhs.cols {
                    let b = rhs.get(k, j);
                    let prod = gf.mul_byte(a, b);
                    let cur = out.get(i, j);
                    out.set(i, j, cur ^ prod);
                }
            }
        }
        out
    }

    /// Inverts a square matrix via Gauss-Jordan elimination with partial
    /// pivoting. The identity fast-path is checked explicitly first so
    /// the common "nothing lost" decode case is a no-op rather than
    /// running the full elimination just to rediscover the identity.
    pub fn invert(&self) -> Result<Matrix> {
        assert_eq!(self.rows, self.cols, "only square matrices are invertible");
        let n = self.rows;

        if *self == Matrix::identity(n) {
            return Ok(self.clone());
        }

        let gf = GaloisField::new();
        // Augment [self | I] then row-reduce the left half to I; the
        // right half becomes the inverse.
        let mut aug = Matrix::zeros(n, 2 * n);
        for r in 0..n {
            aug.row_mut(r)[..n].copy_from_slice(self.row(r));
            aug.set(r, n + r, 1);
        }

        for col in 0..n {
            // Partial pivot: find a row at or below `col` with a nonzero
            // entry in this column.
            let pivot_row = (col..n).find(|&r| aug.get(r, col) != 0).ok_or_else(|| {
                Error::NotInvertible(format!("column {col} has no nonzero pivot"))
            })?;
            if pivot_row != col {
                for c in 0..2 * n {
                    aug.data.swap(col * aug.cols + c, pivot_row * aug.cols + c);
                }
            }

            let pivot = aug.get(col, col);
            let inv_pivot = gf.inv_byte(pivot);
            if inv_pivot != 1 {
                let row = aug.row_mut(col);
                for v in row.iter_mut() {
                    *v = gf.mul_byte(*v, inv_pivot);
                }
            }

            for r in 0..n {
                if r == col {
                    continue;
                }
                let factor = aug.get(r, col);
                if factor == 0 {
                    continue;
                }
                for c in 0..2 * n {
                    let pivot_val = aug.get(col, c);
                    let cur = aug.get(r, c);
                    aug.set(r, c, cur ^ gf.mul_byte(factor, pivot_val));
                }
            }
        }

        let mut inv = Matrix::zeros(n, n);
        for r in 0..n {
            inv.row_mut(r).copy_from_slice(&aug.row(r)[n..]);
        }
        Ok(inv)
    }
}
