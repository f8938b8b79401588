//! Pure-Rust divide-and-conquer singular value decomposition of bidiagonal matrices.
//!
//! The merge step follows Gu and Eisenstat's "A Divide-and-Conquer Algorithm for the Bidiagonal
//! SVD": the two halves of the problem are glued together by a rank-one update whose singular
//! values are the roots of a secular equation. Deflation removes numerically redundant
//! components before the roots are computed, and the singular vectors are recovered from a
//! corrected update vector so that they stay orthogonal to working precision.

pub mod bidiag_svd;
pub mod combine;
pub mod dc;
pub mod deflation;
pub mod givens;
pub mod norm;
pub mod packing;
pub mod perm;
pub mod secular;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LinalgError {
    #[error("Matrix is empty")]
    EmptyMatrix,
    #[error("Expected length {expected}, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("Expected matrix of shape {expected:?}, got {actual:?}")]
    WrongShape {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Block with {rows} rows and {cols} cols is neither square nor one column wider")]
    NotSquareOrWide { rows: usize, cols: usize },
    #[error("Index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Diagonal is not sorted in strictly ascending order")]
    NotSorted,
    #[error("Leading diagonal entry must be zero")]
    NonzeroLeadingDiagonal,
    #[error("Singular value {index} of the halves is negative or NaN")]
    NegativeSingularValue { index: usize },
    #[error("Coupling weight must be positive")]
    NonPositiveCoupling,
    #[error("Index map is not a permutation")]
    NotPermutation,
}

pub type Result<T> = std::result::Result<T, LinalgError>;

/// Ordering of singular values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Largest,
    Smallest,
}
