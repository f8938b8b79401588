use approx::assert_abs_diff_eq;
use ndarray::prelude::*;
use proptest::prelude::*;

use linfa_dcsvd::secular::*;

mod common;

fn run_secular_svd_test(d: Array1<f64>, rho: f64, z: Array1<f64>, ctrl: &SecularCtrl) {
    let n = d.len();
    let (u, s, v, info) = secular_svd(d.view(), rho, z.view(), ctrl).unwrap();
    assert_eq!(info.num_unconverged, 0);

    // Arrow matrix with the update in the first row
    let mut a = Array2::from_diag(&d);
    a.row_mut(0).assign(&(&z * rho.sqrt()));
    common::check_svd(&a, &u, &s, &v, 1e-8);

    // Roots interlace with the poles
    for i in 0..n {
        assert!(s[i] >= d[i]);
        if i + 1 < n {
            assert!(s[i] <= d[i + 1]);
        }
    }

    // Single roots agree with the batch solve
    for i in 0..n {
        let root = singular_value(i, d.view(), rho, z.view(), ctrl).unwrap();
        assert!(root.result.converged);
        assert_abs_diff_eq!(root.result.value, s[i], epsilon = 1e-12 * s[n - 1]);
        let gaps = root.gaps();
        for k in 0..n {
            assert_abs_diff_eq!(gaps[k], d[k] * d[k] - s[i] * s[i], epsilon = 1e-8 * s[n - 1] * s[n - 1]);
        }
    }
}

fn run_secular_evd_test(d: Array1<f64>, rho: f64, z: Array1<f64>, ctrl: &SecularCtrl) {
    let n = d.len();
    let (vals, vecs, info) = secular_evd(d.view(), rho, z.view(), ctrl).unwrap();
    assert_eq!(info.num_unconverged, 0);

    let mut a = Array2::from_diag(&d);
    for i in 0..n {
        for j in 0..n {
            a[(i, j)] += rho * z[i] * z[j];
        }
    }
    assert_abs_diff_eq!(vecs.t().dot(&vecs), Array2::<f64>::eye(n), epsilon = 1e-8);
    assert_abs_diff_eq!(
        (&vecs * &vals).dot(&vecs.t()),
        a,
        epsilon = 1e-8 * (1. + vals[n - 1].abs())
    );

    for i in 0..n {
        assert!(vals[i] >= d[i]);
        if i + 1 < n {
            assert!(vals[i] <= d[i + 1]);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]
    #[test]
    fn secular_svd_test((d, rho, z) in common::secular_problem()) {
        run_secular_svd_test(d, rho, z, &SecularCtrl::default());
    }

    #[test]
    fn secular_svd_flip_test((d, rho, z) in common::secular_problem()) {
        let ctrl = SecularCtrl::default().negative_fix(NegativeFix::Flip);
        run_secular_svd_test(d, rho, z, &ctrl);
    }

    #[test]
    fn secular_evd_test((d, rho, z) in common::secular_problem()) {
        run_secular_evd_test(d, rho, z, &SecularCtrl::default());
    }
}

#[test]
fn secular_no_cubic() {
    let d = array![0., 1e-3, 2e-3, 1., 1.001, 5.];
    let z: Array1<f64> = array![0.5, 1e-3, 0.3, 0.5, 0.4, 0.5];
    let z = &z / z.dot(&z).sqrt();
    let ctrl = SecularCtrl::default().max_cubic_iterations(0);
    run_secular_svd_test(d, 3., z, &ctrl);
}
