#![allow(unused)]

use std::ops::RangeInclusive;

use ndarray::prelude::*;
use proptest::prelude::*;
use proptest_derive::Arbitrary;

const FLOAT_RANGE: RangeInclusive<f64> = -100.0..=100.0;
const DIM_RANGE: RangeInclusive<usize> = 1..=40;

/// Whether the bidiagonal matrix has one more column than rows
#[derive(Debug, Clone, Copy, Arbitrary)]
pub enum Shape {
    Square,
    Wide,
}

impl Shape {
    pub fn super_len(self, dim: usize) -> usize {
        match self {
            Shape::Square => dim - 1,
            Shape::Wide => dim,
        }
    }
}

/// Perturbations that force deflation in the merges
#[derive(Debug, Arbitrary)]
struct Structure {
    repeat_diagonal: bool,
    tiny_coupling: bool,
    zero_middle: bool,
}

impl Structure {
    fn apply(&self, main: &mut Array1<f64>, sup: &mut Array1<f64>) {
        if self.repeat_diagonal {
            let first = main[0];
            main.fill(first);
        }
        if self.tiny_coupling {
            sup.mapv_inplace(|x| x * 1e-13);
        }
        if self.zero_middle && !sup.is_empty() {
            let mid = sup.len() / 2;
            sup[mid] = 0.;
        }
    }
}

prop_compose! {
    /// Main and super diagonal of a square or wide upper bidiagonal matrix
    pub fn bidiag()(dim in DIM_RANGE, shape in any::<Shape>())
        (main in prop::collection::vec(FLOAT_RANGE, dim),
         sup in prop::collection::vec(FLOAT_RANGE, shape.super_len(dim)),
         structure in any::<Structure>()) -> (Array1<f64>, Array1<f64>) {
        let (mut main, mut sup) = (Array1::from(main), Array1::from(sup));
        structure.apply(&mut main, &mut sup);
        (main, sup)
    }
}

prop_compose! {
    /// Poles `d` (strictly ascending, `d[0] = 0`), weight `rho` and unit update `z`
    pub fn secular_problem()(dim in 1..=20usize)
        (dim in Just(dim),
         gaps in prop::collection::vec(0.01..=10.0f64, dim - 1),
         mags in prop::collection::vec(1e-3..=1.0f64, dim),
         signs in prop::collection::vec(any::<bool>(), dim),
         rho in 0.1..=10.0f64) -> (Array1<f64>, f64, Array1<f64>) {
        let mut d = Array1::zeros(dim);
        for (i, gap) in gaps.into_iter().enumerate() {
            d[i + 1] = d[i] + gap;
        }
        let z: Array1<f64> = mags
            .into_iter()
            .zip(signs)
            .map(|(mag, neg)| if neg { -mag } else { mag })
            .collect();
        let norm = z.dot(&z).sqrt();
        (d, rho, z / norm)
    }
}

/// Checks `a = u diag(s) v^T` and the orthogonality of `u` and `v`.
///
/// `v` may have more columns than `s`; the extra ones must be orthogonal to the rest and lie in
/// the null space of `a`.
pub fn check_svd(a: &Array2<f64>, u: &Array2<f64>, s: &Array1<f64>, v: &Array2<f64>, tol: f64) {
    let k = s.len();
    assert!(s.iter().all(|&x| x >= 0.));
    assert_eq!(u.dim(), (a.nrows(), a.nrows()));
    assert_eq!(v.dim(), (a.ncols(), a.ncols()));
    approx::assert_abs_diff_eq!(u.t().dot(u), Array2::<f64>::eye(u.ncols()), epsilon = tol);
    approx::assert_abs_diff_eq!(v.t().dot(v), Array2::<f64>::eye(v.ncols()), epsilon = tol);
    let recon = (u * s).dot(&v.slice(s![.., ..k]).t());
    approx::assert_abs_diff_eq!(recon, a.view(), epsilon = tol);
    approx::assert_abs_diff_eq!(
        a.dot(&v.slice(s![.., k..])),
        Array2::<f64>::zeros((a.nrows(), v.ncols() - k)),
        epsilon = tol
    );
}
