//! Preconditioners for Krylov methods.
//!
//! Each preconditioner is a [`LinearOperator`] that applies an approximation of `A^{-1}`.
use crate::operator::LinearOperator;
use nalgebra::{DVector, DVectorView, DVectorViewMut, RealField};
use nalgebra_sparse::CsrMatrix;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionerError {
    /// The matrix has no stored or a zero diagonal entry in the given row.
    ZeroDiagonal { row: usize },
    /// A pivot vanished during incomplete factorization.
    ZeroPivot { row: usize },
    NotSquare { nrows: usize, ncols: usize },
    InvalidRelaxation,
}

impl fmt::Display for PreconditionerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDiagonal { row } => write!(f, "Zero or missing diagonal entry in row {}.", row),
            Self::ZeroPivot { row } => write!(f, "Zero pivot in row {} during incomplete factorization.", row),
            Self::NotSquare { nrows, ncols } => write!(f, "Matrix is not square ({} x {}).", nrows, ncols),
            Self::InvalidRelaxation => write!(f, "SSOR relaxation parameter must lie in (0, 2)."),
        }
    }
}

impl Error for PreconditionerError {}

fn check_square<T>(matrix: &CsrMatrix<T>) -> Result<(), PreconditionerError> {
    if matrix.nrows() != matrix.ncols() {
        Err(PreconditionerError::NotSquare {
            nrows: matrix.nrows(),
            ncols: matrix.ncols(),
        })
    } else {
        Ok(())
    }
}

/// Returns the offset into the values array of the diagonal entry of each row.
fn diagonal_offsets<T: RealField + Copy>(matrix: &CsrMatrix<T>) -> Result<Vec<usize>, PreconditionerError> {
    check_square(matrix)?;
    let offsets = matrix.row_offsets();
    let indices = matrix.col_indices();
    let values = matrix.values();
    (0..matrix.nrows())
        .map(|i| {
            let row_indices = &indices[offsets[i]..offsets[i + 1]];
            row_indices
                .binary_search(&i)
                .ok()
                .map(|local| offsets[i] + local)
                .filter(|&idx| values[idx] != T::zero())
                .ok_or(PreconditionerError::ZeroDiagonal { row: i })
        })
        .collect()
}

/// Diagonal (point Jacobi) preconditioner `P = D^{-1}`.
#[derive(Debug, Clone)]
pub struct Jacobi<T: RealField> {
    inverse_diagonal: DVector<T>,
}

impl<T: RealField + Copy> Jacobi<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Result<Self, PreconditionerError> {
        let diag_offsets = diagonal_offsets(matrix)?;
        let values = matrix.values();
        let inverse_diagonal = DVector::from_iterator(
            diag_offsets.len(),
            diag_offsets.iter().map(|&idx| T::one() / values[idx]),
        );
        Ok(Self { inverse_diagonal })
    }

    pub fn inverse_diagonal(&self) -> &DVector<T> {
        &self.inverse_diagonal
    }
}

impl<T: RealField + Copy> LinearOperator<T> for Jacobi<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        y.component_mul_assign(&self.inverse_diagonal);
        Ok(())
    }
}

/// Symmetric successive over-relaxation preconditioner.
///
/// Applies the inverse of
/// `M = (D + ωL) D^{-1} (D + ωU) / (ω (2 - ω))`,
/// where `A = L + D + U`. `M` is symmetric positive definite whenever `A` is, so the
/// preconditioner may also be used with CG.
#[derive(Debug, Clone)]
pub struct Ssor<T: RealField> {
    matrix: CsrMatrix<T>,
    diag_offsets: Vec<usize>,
    omega: T,
}

impl<T: RealField + Copy> Ssor<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>, omega: T) -> Result<Self, PreconditionerError> {
        if omega <= T::zero() || omega >= T::one() + T::one() {
            return Err(PreconditionerError::InvalidRelaxation);
        }
        let diag_offsets = diagonal_offsets(matrix)?;
        Ok(Self {
            matrix: matrix.clone(),
            diag_offsets,
            omega,
        })
    }
}

impl<T: RealField + Copy> LinearOperator<T> for Ssor<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        let n = self.matrix.nrows();
        let offsets = self.matrix.row_offsets();
        let indices = self.matrix.col_indices();
        let values = self.matrix.values();
        let omega = self.omega;
        let two = T::one() + T::one();

        // Forward sweep: (D + ωL) w = ω (2 - ω) x
        let scale = omega * (two - omega);
        for i in 0..n {
            let diag = self.diag_offsets[i];
            let mut sum = T::zero();
            for idx in offsets[i]..diag {
                sum += values[idx] * y[indices[idx]];
            }
            y[i] = (scale * x[i] - omega * sum) / values[diag];
        }

        // w <- D w
        for i in 0..n {
            y[i] *= values[self.diag_offsets[i]];
        }

        // Backward sweep: (D + ωU) y = w
        for i in (0..n).rev() {
            let diag = self.diag_offsets[i];
            let mut sum = T::zero();
            for idx in diag + 1..offsets[i + 1] {
                sum += values[idx] * y[indices[idx]];
            }
            y[i] = (y[i] - omega * sum) / values[diag];
        }
        Ok(())
    }
}

/// Incomplete LU factorization with zero fill-in.
///
/// The factors share the sparsity pattern of the original matrix: the strictly lower part holds
/// `L` (with implicit unit diagonal) and the upper part including the diagonal holds `U`.
#[derive(Debug, Clone)]
pub struct Ilu0<T: RealField> {
    factors: CsrMatrix<T>,
    diag_offsets: Vec<usize>,
}

impl<T: RealField + Copy> Ilu0<T> {
    pub fn from_csr(matrix: &CsrMatrix<T>) -> Result<Self, PreconditionerError> {
        let diag_offsets = diagonal_offsets(matrix)?;
        let mut factors = matrix.clone();
        let n = factors.nrows();
        let offsets = matrix.row_offsets();
        let indices = matrix.col_indices();
        let values = factors.values_mut();

        for i in 0..n {
            let diag_i = diag_offsets[i];
            let row_end = offsets[i + 1];

            // Eliminate with the previous rows k < i present in the pattern of row i
            for k_idx in offsets[i]..diag_i {
                let k = indices[k_idx];
                let k_diag = diag_offsets[k];
                let pivot = values[k_diag];
                if pivot == T::zero() {
                    return Err(PreconditionerError::ZeroPivot { row: k });
                }

                let l_ik = values[k_idx] / pivot;
                values[k_idx] = l_ik;

                // a_ij -= l_ik * u_kj for j > k, restricted to the pattern of row i.
                // Column indices are sorted, so a merge suffices.
                let mut cursor = k_idx + 1;
                for kj_idx in k_diag + 1..offsets[k + 1] {
                    let j = indices[kj_idx];
                    while cursor < row_end && indices[cursor] < j {
                        cursor += 1;
                    }
                    if cursor == row_end {
                        break;
                    }
                    if indices[cursor] == j {
                        let u_kj = values[kj_idx];
                        values[cursor] -= l_ik * u_kj;
                    }
                }
            }

            if values[diag_i] == T::zero() {
                return Err(PreconditionerError::ZeroPivot { row: i });
            }
        }

        Ok(Self { factors, diag_offsets })
    }
}

impl<T: RealField + Copy> LinearOperator<T> for Ilu0<T> {
    fn apply(&self, mut y: DVectorViewMut<T>, x: DVectorView<T>) -> Result<(), Box<dyn Error>> {
        let n = self.factors.nrows();
        let offsets = self.factors.row_offsets();
        let indices = self.factors.col_indices();
        let values = self.factors.values();
        y.copy_from(&x);

        // L z = x
        for i in 0..n {
            let mut sum = T::zero();
            for idx in offsets[i]..self.diag_offsets[i] {
                sum += values[idx] * y[indices[idx]];
            }
            y[i] -= sum;
        }

        // U y = z
        for i in (0..n).rev() {
            let diag = self.diag_offsets[i];
            let mut sum = T::zero();
            for idx in diag + 1..offsets[i + 1] {
                sum += values[idx] * y[indices[idx]];
            }
            y[i] = (y[i] - sum) / values[diag];
        }
        Ok(())
    }
}
