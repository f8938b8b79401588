//! Direct SVD of small upper bidiagonal matrices

use ndarray::{s, Array1, Array2, ArrayView1, NdFloat};

use crate::{givens::GivensRotation, norm::Norm, perm::Permutation, LinalgError, Order, Result};

/// Singular value decomposition `B = U diag(s) V^T` of an upper bidiagonal matrix
///
/// `B` is `m x n` with `n` either `m` or `m + 1`. `U` is `m x m` and `V` is `n x n`. If `B` has
/// an extra column, the last column of `V` spans its null space.
#[derive(Debug, Clone)]
pub struct BidiagSvdDecomp<A> {
    pub u: Array2<A>,
    pub s: Array1<A>,
    pub v: Array2<A>,
}

impl<A: NdFloat> BidiagSvdDecomp<A> {
    /// Sort the singular triplets by singular value
    ///
    /// The null space column of `V`, if there is one, stays last.
    pub fn sort_svd(self, order: Order) -> Self {
        let perm = Permutation::sorting(&self.s.to_vec());
        let mut idx = perm.preimages().to_vec();
        if order == Order::Largest {
            idx.reverse();
        }

        let s: Array1<A> = idx.iter().map(|&i| self.s[i]).collect();
        let mut u = Array2::zeros(self.u.raw_dim());
        let mut v = self.v.clone();
        for (j, &i) in idx.iter().enumerate() {
            u.column_mut(j).assign(&self.u.column(i));
            v.column_mut(j).assign(&self.v.column(i));
        }
        Self { u, s, v }
    }

    /// Multiplies the factors back together
    pub fn reconstruct(&self) -> Array2<A> {
        let m = self.s.len();
        let us = &self.u * &self.s;
        us.dot(&self.v.slice(s![.., ..m]).t())
    }
}

/// Shape of the upper bidiagonal matrix with the given diagonal lengths
pub(crate) fn bidiag_shape(main_len: usize, super_len: usize) -> Result<(usize, usize)> {
    let m = main_len;
    if m == 0 {
        Err(LinalgError::EmptyMatrix)
    } else if super_len + 1 == m {
        Ok((m, m))
    } else if super_len == m {
        Ok((m, m + 1))
    } else {
        Err(LinalgError::WrongLength {
            expected: m - 1,
            actual: super_len,
        })
    }
}

/// Forms the explicit upper bidiagonal matrix.
///
/// The matrix is square if `super_diag` is one shorter than `main_diag`, and has one extra
/// column if both have the same length.
pub fn bidiag_matrix<A: NdFloat>(
    main_diag: ArrayView1<A>,
    super_diag: ArrayView1<A>,
) -> Result<Array2<A>> {
    let (m, n) = bidiag_shape(main_diag.len(), super_diag.len())?;
    let mut b = Array2::zeros((m, n));
    for (i, &x) in main_diag.iter().enumerate() {
        b[(i, i)] = x;
    }
    for (i, &x) in super_diag.iter().enumerate() {
        b[(i, i + 1)] = x;
    }
    Ok(b)
}

/// Solver for the bidiagonal blocks at the bottom of the divide-and-conquer recursion
pub trait SmallBidiagSvd<A> {
    /// Computes the full SVD of the upper bidiagonal matrix with the given diagonals, including
    /// the null space column of `V` if the matrix has an extra column.
    fn bidiag_svd(
        &self,
        main_diag: ArrayView1<A>,
        super_diag: ArrayView1<A>,
    ) -> Result<BidiagSvdDecomp<A>>;
}

/// One-sided Jacobi SVD of the explicit bidiagonal matrix
#[derive(Debug, Clone)]
pub struct JacobiBidiagSvd {
    max_sweeps: usize,
}

impl Default for JacobiBidiagSvd {
    fn default() -> Self {
        Self { max_sweeps: 60 }
    }
}

impl JacobiBidiagSvd {
    /// Set the maximum number of sweeps over all column pairs
    pub fn max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }
}

impl<A: NdFloat> SmallBidiagSvd<A> for JacobiBidiagSvd {
    fn bidiag_svd(
        &self,
        main_diag: ArrayView1<A>,
        super_diag: ArrayView1<A>,
    ) -> Result<BidiagSvdDecomp<A>> {
        let b = bidiag_matrix(main_diag, super_diag)?;
        Ok(jacobi_bidiag_svd(b, self.max_sweeps))
    }
}

/// Computes the SVD of an upper bidiagonal matrix directly, without dividing it.
pub fn bidiag_svd<A: NdFloat>(
    main_diag: ArrayView1<A>,
    super_diag: ArrayView1<A>,
) -> Result<BidiagSvdDecomp<A>> {
    JacobiBidiagSvd::default().bidiag_svd(main_diag, super_diag)
}

/// Chases the extra column of an `m x (m+1)` matrix to zero with rotations from the right,
/// accumulating them into `g`.
fn fold_extra_column<A: NdFloat>(b: &mut Array2<A>, g: &mut Array2<A>) {
    let m = b.nrows();
    for j in (0..m).rev() {
        let (rot, _) = GivensRotation::from_pair(b[(j, j)], b[(j, m)]);
        rot.rotate_cols(b, j, m);
        rot.rotate_cols(g, j, m);
        b[(j, m)] = A::zero();
    }
}

fn jacobi_bidiag_svd<A: NdFloat>(b: Array2<A>, max_sweeps: usize) -> BidiagSvdDecomp<A> {
    let (m, n) = b.dim();
    let mut b = b;
    let amax = b.norm_max();
    if !amax.is_zero() {
        b.mapv_inplace(|x| x / amax);
    }

    let mut g = Array2::eye(n);
    if n > m {
        fold_extra_column(&mut b, &mut g);
    }
    let (u, mut sv, w) = jacobi_svd(b.slice(s![.., ..m]).to_owned(), max_sweeps);
    if !amax.is_zero() {
        sv.mapv_inplace(|x| x * amax);
    }

    let mut v = g.clone();
    v.slice_mut(s![.., ..m]).assign(&g.slice(s![.., ..m]).dot(&w));
    BidiagSvdDecomp { u, s: sv, v }
}

/// One-sided (Hestenes) Jacobi SVD of a square matrix, returning `(U, s, W)` with
/// `a = U diag(s) W^T`.
fn jacobi_svd<A: NdFloat>(mut a: Array2<A>, max_sweeps: usize) -> (Array2<A>, Array1<A>, Array2<A>) {
    let m = a.ncols();
    let eps = A::epsilon();
    let two = A::from(2.0).unwrap();
    let mut w = Array2::eye(m);

    for _ in 0..max_sweeps {
        let mut rotated = false;
        for p in 0..m {
            for q in p + 1..m {
                let alpha = a.column(p).dot(&a.column(p));
                let beta = a.column(q).dot(&a.column(q));
                let gamma = a.column(p).dot(&a.column(q));
                if gamma.is_zero() || gamma.abs() <= eps * alpha.sqrt() * beta.sqrt() {
                    continue;
                }
                rotated = true;

                let zeta = (beta - alpha) / (two * gamma);
                let t = if zeta >= A::zero() {
                    A::one() / (zeta + A::one().hypot(zeta))
                } else {
                    -A::one() / (-zeta + A::one().hypot(zeta))
                };
                let c = A::one() / A::one().hypot(t);
                let rot = GivensRotation::new(c, -(c * t));
                rot.rotate_cols(&mut a, p, q);
                rot.rotate_cols(&mut w, p, q);
            }
        }
        if !rotated {
            break;
        }
    }

    let sv: Array1<A> = a.columns().into_iter().map(|col| col.norm_l2()).collect();
    let smax = sv.norm_max();
    let mut u = Array2::zeros((m, m));
    let mut deficient = Vec::new();
    for (k, &sk) in sv.iter().enumerate() {
        if sk > smax * eps * eps {
            u.column_mut(k).assign(&a.column(k).mapv(|x| x / sk));
        } else {
            deficient.push(k);
        }
    }
    // Columns without a usable direction are completed to an orthonormal basis
    for k in deficient {
        let mut best = Array1::zeros(m);
        let mut best_norm = -A::one();
        for e in 0..m {
            let mut x = Array1::zeros(m);
            x[e] = A::one();
            for _ in 0..2 {
                for l in 0..m {
                    let proj = u.column(l).dot(&x);
                    x.scaled_add(-proj, &u.column(l));
                }
            }
            let norm = x.norm_l2();
            if norm > best_norm {
                best = x;
                best_norm = norm;
            }
        }
        u.column_mut(k).assign(&best.mapv(|x| x / best_norm));
    }

    (u, sv, w)
}
