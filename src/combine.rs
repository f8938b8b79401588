//! Merging of two bidiagonal SVDs through a rank-one coupling row
//!
//! The parent matrix
//! ```text
//! | B0           |
//! | alpha e^T  beta e^T |
//! |           B1 |
//! ```
//! with `B0 = U0 [S0 0] V0^T` (one extra column) and `B1 = U1 S1 V1^T` is rotated by
//! `blockdiag(U0, 1, U1)` and `blockdiag(V0, V1)` into a diagonal plus one dense row, whose SVD
//! is obtained from the secular equation.

use std::ops::Range;

use ndarray::{linalg::general_mat_mul, s, Array1, Array2, ArrayView1, ArrayView2, NdFloat};

use crate::{
    dc::{DcSvdCtrl, DcSvdInfo},
    deflation::{clamp_anchor, deflate, rotate_extra_column, ColumnType, SingularVectors},
    norm::Norm,
    packing::pack,
    perm::Permutation,
    secular::{all_roots, corrected_update, singular_vectors, Form},
    LinalgError, Result,
};

/// `out[rows, ..] += z[rows, cols] * q[cols, ..]`
fn accumulate<A: NdFloat>(
    out: &mut Array2<A>,
    z: ArrayView2<A>,
    q: ArrayView2<A>,
    rows: Range<usize>,
    cols: Range<usize>,
) {
    if rows.is_empty() || cols.is_empty() {
        return;
    }
    let mut block = out.slice_mut(s![rows.clone(), ..]);
    general_mat_mul(
        A::one(),
        &z.slice(s![rows, cols.clone()]),
        &q.slice(s![cols, ..]),
        A::one(),
        &mut block,
    );
}

/// Merges the SVDs of the two halves of a bidiagonal matrix split at a coupling row.
///
/// On entry `u` is `blockdiag(U0, 1, U1)` (`m x m` with `m = m0 + 1 + m1`) and `v` is
/// `blockdiag(V0, V1)` (`n x n`), where `s0` has length `m0` and the last column of `V0` spans
/// the null space of the left half. The right half is either square (`n = m`) or has an extra
/// column (`n = m + 1`). On exit `u` and `v` hold the singular vectors of the parent matrix,
/// and the returned singular values list the merged ones first in ascending order, followed
/// by the deflated ones. In the rectangular case the last column of `v` spans the null space.
///
/// The entries of `s0` and `s1` must be nonnegative; they are indexed consecutively, `s0`
/// first, in the error.
pub fn combine_bidiag_svd<A: NdFloat>(
    alpha: A,
    beta: A,
    s0: ArrayView1<A>,
    s1: ArrayView1<A>,
    u: &mut Array2<A>,
    v: &mut Array2<A>,
    ctrl: &DcSvdCtrl<A>,
) -> Result<(Array1<A>, DcSvdInfo)> {
    let (m0, m1) = (s0.len(), s1.len());
    let m = m0 + 1 + m1;
    let n0 = m0 + 1;
    if u.dim() != (m, m) {
        return Err(LinalgError::WrongShape {
            expected: (m, m),
            actual: u.dim(),
        });
    }
    let n = v.nrows();
    if v.ncols() != n {
        return Err(LinalgError::WrongShape {
            expected: (n, n),
            actual: v.dim(),
        });
    }
    let n1 = n.saturating_sub(n0);
    if n < n0 || (n1 != m1 && n1 != m1 + 1) {
        return Err(LinalgError::NotSquareOrWide { rows: m1, cols: n1 });
    }
    let rectangular = n1 == m1 + 1;
    if let Some(index) = s0.iter().chain(s1.iter()).position(|&x| !(x >= A::zero())) {
        return Err(LinalgError::NegativeSingularValue { index });
    }

    let tol = ctrl.deflation_fudge * A::epsilon();
    let mut scale = alpha
        .abs()
        .max(beta.abs())
        .max(s0.norm_max())
        .max(s1.norm_max());
    if scale.is_zero() {
        scale = A::one();
    }

    // The coupling row goes first, followed by the two halves
    let mut d_merged = vec![A::zero(); m];
    let mut r_merged = vec![A::zero(); m];
    r_merged[0] = alpha * v[(m0, m0)] / scale;
    for j in 0..m0 {
        d_merged[j + 1] = s0[j] / scale;
        r_merged[j + 1] = alpha * v[(m0, j)] / scale;
    }
    for j in 0..m1 {
        d_merged[n0 + j] = s1[j] / scale;
        r_merged[n0 + j] = beta * v[(n0, n0 + j)] / scale;
    }
    r_merged[0] = if rectangular {
        let rho_extra = beta * v[(n0, m)] / scale;
        rotate_extra_column(r_merged[0], rho_extra, tol, v, m0, m)
    } else {
        clamp_anchor(r_merged[0], tol)
    };

    let sort = Permutation::sorting(&d_merged);
    debug_assert_eq!(sort.preimage(0), 0);
    let d = Array1::from(sort.permute(&d_merged));
    let mut r = Array1::from(sort.permute(&r_merged));
    let mut types: Vec<ColumnType> = (0..m)
        .map(|j| match sort.preimage(j) {
            0 => ColumnType::Dense,
            pre if pre <= m0 => ColumnType::FirstBlock,
            _ => ColumnType::SecondBlock,
        })
        .collect();
    let columns: Vec<usize> = (0..m)
        .map(|j| {
            let pre = sort.preimage(j);
            if pre <= m0 {
                (pre + m0) % n0
            } else {
                pre
            }
        })
        .collect();

    let deflation = {
        let mut vectors = SingularVectors {
            u: u.view_mut(),
            v: v.view_mut(),
            columns: &columns,
        };
        deflate(
            d.view(),
            r.view_mut(),
            &mut types,
            tol,
            &mut vectors,
            ctrl.progress,
        )?
    };
    let dinfo = deflation.info;
    debug_assert_eq!(
        dinfo.num_deflations,
        dinfo.num_small_update_deflations + dinfo.num_close_diagonal_deflations
    );

    let packing = pack(&types, &deflation.perm, d.view(), u.view(), v.view(), &columns)?;
    let num_undeflated = deflation.num_undeflated;
    debug_assert_eq!(
        packing.counts[ColumnType::Deflated.index()],
        dinfo.num_deflations
    );
    if ctrl.progress {
        log::debug!(
            "merging {} + 1 + {} rows: {} undeflated, packed counts {:?}",
            m0,
            m1,
            num_undeflated,
            packing.counts
        );
    }

    let d_und = deflation.undeflated(d.view());
    let r_und = deflation.undeflated(r.view());
    let r_norm = r_und.norm_l2();
    let rho = r_norm * r_norm;
    let z = r_und.mapv(|x| x / r_norm);
    let (roots, gaps, secular) = all_roots(Form::Singular, d_und.view(), rho, z.view(), &ctrl.secular);
    let r_corrected = corrected_update(Form::Singular, d_und.view(), z.view(), &gaps);
    let (u_small, v_small) = singular_vectors(d_und.view(), r_corrected.view(), &gaps);

    // Rows of the small vectors follow the deflation order, rows of Q the packed order
    let mut qu = Array2::zeros((num_undeflated, num_undeflated));
    let mut qv = Array2::zeros((num_undeflated, num_undeflated));
    for i in 0..num_undeflated {
        let pos = packing.perm.preimage(i);
        qu.row_mut(i).assign(&u_small.row(pos));
        qv.row_mut(i).assign(&v_small.row(pos));
    }

    let zu = packing.u.slice(s![.., ..num_undeflated]);
    let zv = packing.v.slice(s![.., ..num_undeflated]);
    let mut u_merged = Array2::zeros((m, num_undeflated));
    let mut v_merged = Array2::zeros((n, num_undeflated));
    if ctrl.exploit_structure {
        let first = packing.range(ColumnType::FirstBlock);
        let second = packing.range(ColumnType::SecondBlock);
        let dense = packing.range(ColumnType::Dense);

        accumulate(&mut u_merged, zu, qu.view(), 0..m, dense.clone());
        accumulate(&mut u_merged, zu, qu.view(), 0..m0, first.clone());
        accumulate(&mut u_merged, zu, qu.view(), n0..m, second.clone());

        accumulate(&mut v_merged, zv, qv.view(), 0..n, dense);
        accumulate(&mut v_merged, zv, qv.view(), 0..n0, first);
        accumulate(&mut v_merged, zv, qv.view(), n0..n, second);
    } else {
        general_mat_mul(A::one(), &zu, &qu, A::zero(), &mut u_merged);
        general_mat_mul(A::one(), &zv, &qv, A::zero(), &mut v_merged);
    }

    u.slice_mut(s![.., ..num_undeflated]).assign(&u_merged);
    u.slice_mut(s![.., num_undeflated..])
        .assign(&packing.u.slice(s![.., num_undeflated..]));
    v.slice_mut(s![.., ..num_undeflated]).assign(&v_merged);
    v.slice_mut(s![.., num_undeflated..m])
        .assign(&packing.v.slice(s![.., num_undeflated..]));

    let mut values = Array1::zeros(m);
    values.slice_mut(s![..num_undeflated]).assign(&roots);
    values
        .slice_mut(s![num_undeflated..])
        .assign(&packing.d.slice(s![num_undeflated..]));
    values.mapv_inplace(|x| x * scale);

    Ok((
        values,
        DcSvdInfo {
            deflation: dinfo,
            secular,
        },
    ))
}
