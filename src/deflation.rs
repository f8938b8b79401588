//! Deflation of the merged secular problem
//!
//! Before the secular equation is solved, entries of the update vector that are negligible, and
//! pairs of diagonal entries that are numerically equal, are removed from the problem. The
//! columns they correspond to are already singular vectors of the merged matrix, so they skip
//! the secular solve entirely.

use std::ops::AddAssign;

use ndarray::{Array1, ArrayBase, ArrayView1, ArrayViewMut1, ArrayViewMut2, DataMut, Ix2, NdFloat};
use num_traits::Float;

use crate::{givens::GivensRotation, perm::Permutation, LinalgError, Result};

/// Nonzero structure of a column of the merged singular vectors
///
/// The declaration order is the order in which columns are packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Only nonzero in the rows of the first subproblem
    FirstBlock,
    /// Only nonzero in the rows of the second subproblem
    SecondBlock,
    Dense,
    Deflated,
}

impl ColumnType {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        match self {
            ColumnType::FirstBlock => 0,
            ColumnType::SecondBlock => 1,
            ColumnType::Dense => 2,
            ColumnType::Deflated => 3,
        }
    }
}

/// Deflation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeflationInfo {
    pub num_deflations: usize,
    pub num_small_update_deflations: usize,
    pub num_close_diagonal_deflations: usize,
}

impl AddAssign for DeflationInfo {
    fn add_assign(&mut self, rhs: Self) {
        self.num_deflations += rhs.num_deflations;
        self.num_small_update_deflations += rhs.num_small_update_deflations;
        self.num_close_diagonal_deflations += rhs.num_close_diagonal_deflations;
    }
}

/// Outcome of [`deflate`]
#[derive(Debug, Clone)]
pub struct Deflation {
    /// Maps sorted indices to their position after deflation. Undeflated entries come first, in
    /// their sorted order, followed by the deflated ones.
    pub perm: Permutation,
    pub num_undeflated: usize,
    pub info: DeflationInfo,
}

impl Deflation {
    /// Gathers the undeflated entries of `values`, given in sorted order.
    pub fn undeflated<A: Clone>(&self, values: ArrayView1<A>) -> Array1<A> {
        (0..self.num_undeflated)
            .map(|pos| values[self.perm.preimage(pos)].clone())
            .collect()
    }
}

/// Singular vectors that deflation rotations are applied to
///
/// `columns[j]` is the column of `u` and `v` holding the vector of sorted index `j`.
pub struct SingularVectors<'a, A> {
    pub u: ArrayViewMut2<'a, A>,
    pub v: ArrayViewMut2<'a, A>,
    pub columns: &'a [usize],
}

fn signum<A: Float>(x: A) -> A {
    if x >= A::zero() {
        A::one()
    } else {
        -A::one()
    }
}

/// Makes sure the leading update entry is at least `tol` in magnitude, keeping its sign.
pub fn clamp_anchor<A: Float>(r0: A, tol: A) -> A {
    if r0.abs() < tol {
        signum(r0) * tol
    } else {
        r0
    }
}

/// Rotates the update entry of the extra column of a rectangular merge into the leading entry.
///
/// `v` is rotated in columns `anchor` and `extra` so that `extra` spans the null space of the
/// merged matrix. If both entries are negligible, the leading entry is clamped to `tol` instead
/// and `v` is left alone. Returns the new leading entry.
pub fn rotate_extra_column<A: NdFloat, S: DataMut<Elem = A>>(
    r0: A,
    rho_extra: A,
    tol: A,
    v: &mut ArrayBase<S, Ix2>,
    anchor: usize,
    extra: usize,
) -> A {
    let (rot, gamma) = GivensRotation::from_pair(r0, rho_extra);
    if gamma <= tol {
        return signum(r0) * tol;
    }
    if rot != GivensRotation::identity() {
        rot.rotate_cols(v, anchor, extra);
    }
    gamma
}

/// Sends sorted index `j` to the back of the deflation order.
fn retire(image: &mut [usize], j: usize, info: &mut DeflationInfo) -> usize {
    let pos = (image.len() - 1) - info.num_deflations;
    image[j] = pos;
    info.num_deflations += 1;
    pos
}

/// Classifies the sorted merged problem `(d, r)` and applies the deflating rotations.
///
/// `d` must be ascending with `d[0] == 0`; index 0 is never deflated. Deflated entries of `r`
/// are zeroed (or already negligible), and `types` is updated in place. Rotations that mix two
/// columns are applied to `r` and to the corresponding columns of `vectors`.
///
/// Fails if `d` is empty or if `r`, `types` and `vectors.columns` do not all match its length.
pub fn deflate<A: NdFloat>(
    d: ArrayView1<A>,
    mut r: ArrayViewMut1<A>,
    types: &mut [ColumnType],
    tol: A,
    vectors: &mut SingularVectors<A>,
    progress: bool,
) -> Result<Deflation> {
    let m = d.len();
    if m == 0 {
        return Err(LinalgError::EmptyMatrix);
    }
    for actual in [r.len(), types.len(), vectors.columns.len()] {
        if actual != m {
            return Err(LinalgError::WrongLength {
                expected: m,
                actual,
            });
        }
    }

    let mut image = vec![0; m];
    let mut info = DeflationInfo::default();
    let mut num_undeflated = 1;
    // Most recent index that survived the small update test. It is only finalized once the next
    // surviving index is known not to be close to it.
    let mut candidate: Option<usize> = None;

    for j in 1..m {
        if r[j].abs() <= tol {
            let pos = retire(&mut image, j, &mut info);
            types[j] = ColumnType::Deflated;
            info.num_small_update_deflations += 1;
            if progress {
                log::debug!("deflating {j} to {pos}: |r[{j}]| = {:e} <= {:e}", r[j].abs(), tol);
            }
            continue;
        }

        match candidate {
            None if d[j] <= tol => {
                // d[j] is indistinguishable from d[0] = 0, so fold r[j] into r[0]. Only the right
                // vectors mix, the left ones are unaffected up to the tolerance.
                let (rot, gamma) = GivensRotation::from_pair(r[0], r[j]);
                r[0] = gamma;
                r[j] = A::zero();
                rot.rotate_cols(
                    &mut vectors.v,
                    vectors.columns[0],
                    vectors.columns[j],
                );
                let pos = retire(&mut image, j, &mut info);
                types[j] = ColumnType::Deflated;
                info.num_close_diagonal_deflations += 1;
                if progress {
                    log::debug!("deflating {j} to {pos}: d[{j}] = {:e} <= {:e}", d[j], tol);
                }
            }
            None => candidate = Some(j),
            Some(prev) if d[j] - d[prev] <= tol => {
                let (rot, gamma) = GivensRotation::from_pair(r[j], r[prev]);
                r[j] = gamma;
                r[prev] = A::zero();
                let (x, y) = (vectors.columns[j], vectors.columns[prev]);
                rot.rotate_cols(&mut vectors.u, x, y);
                rot.rotate_cols(&mut vectors.v, x, y);
                let pos = retire(&mut image, prev, &mut info);
                if types[prev] != types[j] {
                    types[j] = ColumnType::Dense;
                }
                types[prev] = ColumnType::Deflated;
                info.num_close_diagonal_deflations += 1;
                if progress {
                    log::debug!(
                        "deflating {prev} to {pos}: d[{j}] - d[{prev}] = {:e} <= {:e}",
                        d[j] - d[prev],
                        tol
                    );
                }
                candidate = Some(j);
            }
            Some(prev) => {
                image[prev] = num_undeflated;
                if progress {
                    log::trace!("keeping {prev} at {num_undeflated}");
                }
                num_undeflated += 1;
                candidate = Some(j);
            }
        }
    }
    if let Some(prev) = candidate {
        image[prev] = num_undeflated;
        num_undeflated += 1;
    }
    debug_assert_eq!(num_undeflated + info.num_deflations, m);

    Ok(Deflation {
        perm: Permutation::from_images_unchecked(image),
        num_undeflated,
        info,
    })
}
