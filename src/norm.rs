//! Norm of vectors

use ndarray::{prelude::*, Data};

/// Define norm as a metric linear space, treating the whole matrix as one big vector.
pub trait Norm {
    type Output;

    /// L-1 norm
    fn norm_l1(&self) -> Self::Output;
    /// L-2 norm, computed with scaling so that it neither overflows nor underflows
    fn norm_l2(&self) -> Self::Output;
    /// Maximum norm (L-infinite)
    fn norm_max(&self) -> Self::Output;
}

impl<A, S, D> Norm for ArrayBase<S, D>
where
    A: NdFloat,
    S: Data<Elem = A>,
    D: Dimension,
{
    type Output = A;

    fn norm_l1(&self) -> Self::Output {
        self.iter().fold(A::zero(), |acc, x| acc + x.abs())
    }

    fn norm_l2(&self) -> Self::Output {
        let scale = self.norm_max();
        if scale.is_zero() || !scale.is_finite() {
            return scale;
        }
        let sum_sq = self.iter().fold(A::zero(), |acc, &x| {
            let x = x / scale;
            acc + x * x
        });
        scale * sum_sq.sqrt()
    }

    fn norm_max(&self) -> Self::Output {
        self.iter().fold(A::zero(), |f, &val| val.abs().max(f))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn norms() {
        let a = array![[1.0f64, -3.], [2., -8.]];
        assert_abs_diff_eq!(a.norm_l1(), 14.);
        assert_abs_diff_eq!(a.norm_l2(), 78.0f64.sqrt(), epsilon = 1e-12);
        assert_abs_diff_eq!(a.norm_max(), 8.);

        let zeros = Array1::<f64>::zeros(3);
        assert_eq!(zeros.norm_l2(), 0.);
    }

    #[test]
    fn norm_l2_extreme() {
        let big = array![3e200f64, 4e200];
        assert_abs_diff_eq!(big.norm_l2() / 5e200, 1.0, epsilon = 1e-12);
        let small = array![3e-200f64, 4e-200];
        assert_abs_diff_eq!(small.norm_l2() / 5e-200, 1.0, epsilon = 1e-12);
    }
}
