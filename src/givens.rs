use ndarray::{s, ArrayBase, ArrayViewMut1, DataMut, Ix2, NdFloat};

/// A Givens Rotation
///
/// Applied to a pair `(x, y)` it produces `(c * x + s * y, c * y - s * x)`, which matches the
/// convention of the BLAS `rot` kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GivensRotation<A> {
    c: A,
    s: A,
}

impl<A: NdFloat> GivensRotation<A> {
    pub fn new(c: A, s: A) -> Self {
        Self { c, s }
    }

    pub fn identity() -> Self {
        Self {
            c: A::one(),
            s: A::zero(),
        }
    }

    /// Computes the rotation mapping `(f, g)` onto `(gamma, 0)`, where `gamma = |(f, g)|`.
    ///
    /// Returns the identity and a zero norm if both inputs are zero.
    pub fn from_pair(f: A, g: A) -> (Self, A) {
        let gamma = f.hypot(g);
        if gamma.is_zero() {
            (Self::identity(), gamma)
        } else {
            (
                Self {
                    c: f / gamma,
                    s: g / gamma,
                },
                gamma,
            )
        }
    }

    pub fn c(&self) -> A {
        self.c
    }
    pub fn s(&self) -> A {
        self.s
    }

    /// The inverse Givens rotation
    pub fn inverse(self) -> Self {
        Self {
            c: self.c,
            s: -self.s,
        }
    }

    /// Rotates the scalar pair `(x, y)`.
    pub fn apply(&self, x: A, y: A) -> (A, A) {
        (self.c * x + self.s * y, self.c * y - self.s * x)
    }

    /// Rotates two vectors in-place, elementwise.
    pub fn rotate(&self, mut x: ArrayViewMut1<A>, mut y: ArrayViewMut1<A>) {
        for (a, b) in x.iter_mut().zip(y.iter_mut()) {
            let (ra, rb) = self.apply(*a, *b);
            *a = ra;
            *b = rb;
        }
    }

    /// Rotates columns `i` and `j` of `mat` in-place.
    ///
    /// Panics if `i == j`.
    pub fn rotate_cols<S: DataMut<Elem = A>>(&self, mat: &mut ArrayBase<S, Ix2>, i: usize, j: usize) {
        let (x, y) = mat.multi_slice_mut((s![.., i], s![.., j]));
        self.rotate(x, y);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn from_pair() {
        let (rot, r) = GivensRotation::from_pair(1.0f64, 2.0);
        assert_abs_diff_eq!(r, 5.0_f64.sqrt());
        assert_abs_diff_eq!(rot.c(), 0.4472136, epsilon = 1e-5);
        assert_abs_diff_eq!(rot.s(), 0.8944272, epsilon = 1e-5);
        let (x, y) = rot.apply(1., 2.);
        assert_abs_diff_eq!(x, r, epsilon = 1e-12);
        assert_abs_diff_eq!(y, 0., epsilon = 1e-12);

        let (rot, r) = GivensRotation::from_pair(0.0f64, 0.);
        assert_eq!(rot, GivensRotation::identity());
        assert_eq!(r, 0.);
    }

    #[test]
    fn rotate_cols() {
        let (rot, _) = GivensRotation::from_pair(3.0f64, -4.0);
        let mat = array![[2., 7., 3.], [4., 1., 5.], [1., 0., 2.]];
        let mut out = mat.clone();
        rot.rotate_cols(&mut out, 0, 2);

        let g = array![[rot.c(), -rot.s()], [rot.s(), rot.c()]];
        let expected = array![[2., 3.], [4., 5.], [1., 2.]].dot(&g);
        assert_abs_diff_eq!(out.column(0), expected.column(0), epsilon = 1e-12);
        assert_abs_diff_eq!(out.column(2), expected.column(1), epsilon = 1e-12);
        assert_abs_diff_eq!(out.column(1), mat.column(1));

        // Rotations are orthogonal, so the inverse undoes them
        rot.inverse().rotate_cols(&mut out, 0, 2);
        assert_abs_diff_eq!(out, mat, epsilon = 1e-12);
    }
}
