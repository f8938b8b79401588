//! Divide-and-conquer SVD of upper bidiagonal matrices

use std::ops::AddAssign;

use ndarray::{s, Array2, ArrayView1, NdFloat};

use crate::{
    bidiag_svd::{bidiag_shape, BidiagSvdDecomp, JacobiBidiagSvd, SmallBidiagSvd},
    combine::combine_bidiag_svd,
    deflation::DeflationInfo,
    secular::{SecularCtrl, SecularInfo},
    Result,
};

/// Parameters of the divide-and-conquer SVD
#[derive(Debug, Clone)]
pub struct DcSvdCtrl<A> {
    pub secular: SecularCtrl,
    /// Deflation tolerance as a multiple of machine epsilon, relative to the scale of the merge
    pub deflation_fudge: A,
    /// Blocks with at most this many rows are solved directly. Values below 2 act as 2.
    pub cutoff: usize,
    /// Multiply only the nonzero blocks of the singular vectors when merging
    pub exploit_structure: bool,
    pub progress: bool,
}

impl<A: NdFloat> Default for DcSvdCtrl<A> {
    fn default() -> Self {
        Self {
            secular: SecularCtrl::default(),
            deflation_fudge: A::from(8.0).unwrap(),
            cutoff: 60,
            exploit_structure: true,
            progress: false,
        }
    }
}

impl<A: NdFloat> DcSvdCtrl<A> {
    pub fn secular(mut self, secular: SecularCtrl) -> Self {
        self.secular = secular;
        self
    }

    pub fn deflation_fudge(mut self, deflation_fudge: A) -> Self {
        self.deflation_fudge = deflation_fudge;
        self
    }

    pub fn cutoff(mut self, cutoff: usize) -> Self {
        self.cutoff = cutoff;
        self
    }

    pub fn exploit_structure(mut self, exploit_structure: bool) -> Self {
        self.exploit_structure = exploit_structure;
        self
    }

    /// Log the recursion and every merge through the `log` facade. Also sets
    /// `secular.progress`, so a later call to [`DcSvdCtrl::secular`] overrides the root tracing.
    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self.secular.progress = progress;
        self
    }
}

/// Diagnostics summed over every merge of the recursion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DcSvdInfo {
    pub deflation: DeflationInfo,
    pub secular: SecularInfo,
}

impl AddAssign for DcSvdInfo {
    fn add_assign(&mut self, rhs: Self) {
        self.deflation += rhs.deflation;
        self.secular += rhs.secular;
    }
}

/// Divide-and-conquer bidiagonal SVD
///
/// The matrix is split at its middle row into two bidiagonal halves, which are solved
/// recursively and merged by [`combine_bidiag_svd`]. Blocks of at most `cutoff` rows are handed
/// to the base solver `B`.
///
/// ```
/// use linfa_dcsvd::dc::{BidiagDcSvd, DcSvdCtrl};
/// use ndarray::Array1;
///
/// let main = Array1::linspace(1., 2., 10);
/// let sup = Array1::from_elem(9, 0.5);
/// let solver = BidiagDcSvd::new(DcSvdCtrl::default().cutoff(3));
/// let (svd, info) = solver.decompose(main.view(), sup.view()).unwrap();
/// assert_eq!(svd.s.len(), 10);
/// assert_eq!(info.secular.num_unconverged, 0);
/// ```
#[derive(Debug, Clone)]
pub struct BidiagDcSvd<A, B = JacobiBidiagSvd> {
    ctrl: DcSvdCtrl<A>,
    base: B,
}

impl<A: NdFloat> BidiagDcSvd<A> {
    pub fn new(ctrl: DcSvdCtrl<A>) -> Self {
        Self {
            ctrl,
            base: JacobiBidiagSvd::default(),
        }
    }
}

impl<A: NdFloat> Default for BidiagDcSvd<A> {
    fn default() -> Self {
        Self::new(DcSvdCtrl::default())
    }
}

impl<A: NdFloat, B: SmallBidiagSvd<A>> BidiagDcSvd<A, B> {
    /// Replace the solver used for blocks at or below the cutoff
    pub fn base_solver<C: SmallBidiagSvd<A>>(self, base: C) -> BidiagDcSvd<A, C> {
        BidiagDcSvd {
            ctrl: self.ctrl,
            base,
        }
    }

    pub fn ctrl(&self) -> &DcSvdCtrl<A> {
        &self.ctrl
    }

    /// Computes `B = U diag(s) V^T` for the upper bidiagonal `B` with the given diagonals.
    ///
    /// `super_diag` has length `m - 1` for a square `B` or `m` for an `m x (m+1)` one; in the
    /// latter case the last column of `V` spans the null space of `B`. The singular values come
    /// in no particular order, see [`BidiagSvdDecomp::sort_svd`].
    pub fn decompose(
        &self,
        main_diag: ArrayView1<A>,
        super_diag: ArrayView1<A>,
    ) -> Result<(BidiagSvdDecomp<A>, DcSvdInfo)> {
        bidiag_shape(main_diag.len(), super_diag.len())?;
        self.divide(main_diag, super_diag)
    }

    fn divide(
        &self,
        main_diag: ArrayView1<A>,
        super_diag: ArrayView1<A>,
    ) -> Result<(BidiagSvdDecomp<A>, DcSvdInfo)> {
        let m = main_diag.len();
        if m <= self.ctrl.cutoff.max(2) {
            let svd = self.base.bidiag_svd(main_diag, super_diag)?;
            return Ok((svd, DcSvdInfo::default()));
        }

        let split = m / 2;
        let (alpha, beta) = (main_diag[split], super_diag[split]);
        if self.ctrl.progress {
            log::debug!("dividing {} rows at row {}", m, split);
        }
        let (left, mut info) = self.divide(
            main_diag.slice(s![..split]),
            super_diag.slice(s![..split]),
        )?;
        let (right, right_info) = self.divide(
            main_diag.slice(s![split + 1..]),
            super_diag.slice(s![split + 1..]),
        )?;
        info += right_info;

        let n = super_diag.len() + 1;
        let n0 = split + 1;
        let mut u = Array2::zeros((m, m));
        u.slice_mut(s![..split, ..split]).assign(&left.u);
        u[(split, split)] = A::one();
        u.slice_mut(s![n0.., n0..]).assign(&right.u);
        let mut v = Array2::zeros((n, n));
        v.slice_mut(s![..n0, ..n0]).assign(&left.v);
        v.slice_mut(s![n0.., n0..]).assign(&right.v);

        let (sv, merge_info) = combine_bidiag_svd(
            alpha,
            beta,
            left.s.view(),
            right.s.view(),
            &mut u,
            &mut v,
            &self.ctrl,
        )?;
        info += merge_info;
        Ok((BidiagSvdDecomp { u, s: sv, v }, info))
    }
}

/// Divide-and-conquer SVD of an upper bidiagonal matrix with the default base solver
pub fn bidiag_dc_svd<A: NdFloat>(
    main_diag: ArrayView1<A>,
    super_diag: ArrayView1<A>,
    ctrl: &DcSvdCtrl<A>,
) -> Result<(BidiagSvdDecomp<A>, DcSvdInfo)> {
    BidiagDcSvd::new(ctrl.clone()).decompose(main_diag, super_diag)
}
