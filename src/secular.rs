//! Secular equation solver
//!
//! Finds the roots of
//! ```text
//! f(sigma) = 1/rho + sum_k z_k^2 / (d_k^2 - sigma^2)
//! ```
//! which are the singular values of `| sqrt(rho) z^T ; diag(d) |` when `d[0] = 0`, or of the
//! eigenvalue form
//! ```text
//! f(lambda) = 1/rho + sum_k z_k^2 / (d_k - lambda)
//! ```
//! whose roots are the eigenvalues of `diag(d) + rho z z^T`.
//!
//! Each root is computed relative to the nearer of the two poles enclosing it, so the distances
//! from the root to every pole are known to full relative accuracy. Those distances are returned
//! with the root and are what the singular vectors are built from.

use std::ops::AddAssign;

use ndarray::{Array1, Array2, ArrayView1, NdFloat};
use num_traits::Float;

use crate::{norm::Norm, LinalgError, Result};

/// Repair applied to quantities that should be nonnegative but came out negative through
/// rounding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeFix {
    /// Use the absolute value
    Flip,
    /// Use zero
    Clip,
}

impl NegativeFix {
    fn apply<A: Float>(self, x: A) -> A {
        if x >= A::zero() {
            x
        } else {
            match self {
                NegativeFix::Flip => -x,
                NegativeFix::Clip => A::zero(),
            }
        }
    }
}

/// Parameters of the secular equation solver
#[derive(Debug, Clone)]
pub struct SecularCtrl {
    pub max_iterations: usize,
    pub max_cubic_iterations: usize,
    pub negative_fix: NegativeFix,
    pub progress: bool,
}

impl Default for SecularCtrl {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            max_cubic_iterations: 40,
            negative_fix: NegativeFix::Clip,
            progress: false,
        }
    }
}

impl SecularCtrl {
    /// Set the maximum number of evaluations of the secular equation per root
    ///
    /// A root that has not converged after this many iterations is returned as is, flagged as
    /// unconverged.
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the maximum number of Newton iterations spent on each three-pole model
    ///
    /// Zero disables the three-pole model.
    pub fn max_cubic_iterations(mut self, max_cubic_iterations: usize) -> Self {
        self.max_cubic_iterations = max_cubic_iterations;
        self
    }

    pub fn negative_fix(mut self, negative_fix: NegativeFix) -> Self {
        self.negative_fix = negative_fix;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

/// A single root of the secular equation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecularResult<A> {
    pub value: A,
    pub num_iterations: usize,
    pub num_alternations: usize,
    pub num_cubic_iterations: usize,
    pub num_cubic_failures: usize,
    pub converged: bool,
}

/// Accumulated solver statistics over many roots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecularInfo {
    pub num_iterations: usize,
    pub num_alternations: usize,
    pub num_cubic_iterations: usize,
    pub num_cubic_failures: usize,
    pub num_unconverged: usize,
}

impl SecularInfo {
    pub fn record<A>(&mut self, result: &SecularResult<A>) {
        self.num_iterations += result.num_iterations;
        self.num_alternations += result.num_alternations;
        self.num_cubic_iterations += result.num_cubic_iterations;
        self.num_cubic_failures += result.num_cubic_failures;
        if !result.converged {
            self.num_unconverged += 1;
        }
    }
}

impl AddAssign for SecularInfo {
    fn add_assign(&mut self, rhs: Self) {
        self.num_iterations += rhs.num_iterations;
        self.num_alternations += rhs.num_alternations;
        self.num_cubic_iterations += rhs.num_cubic_iterations;
        self.num_cubic_failures += rhs.num_cubic_failures;
        self.num_unconverged += rhs.num_unconverged;
    }
}

/// A root together with its distances to the poles
#[derive(Debug, Clone)]
pub struct SecularRoot<A> {
    pub result: SecularResult<A>,
    /// `d_k - sigma` (or `d_k - lambda`)
    pub minus_shift: Array1<A>,
    /// `d_k + sigma`, or all ones for the eigenvalue form
    pub plus_shift: Array1<A>,
}

impl<A: NdFloat> SecularRoot<A> {
    /// `d_k^2 - sigma^2` (or `d_k - lambda`), accurate to working precision relative to itself
    pub fn gaps(&self) -> Array1<A> {
        &self.minus_shift * &self.plus_shift
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Form {
    Singular,
    Eigen,
}

impl Form {
    /// `pole(a) - pole(b)`, where the pole of `d` is `d^2` or `d`
    fn pole_diff<A: NdFloat>(self, a: A, b: A) -> A {
        match self {
            Form::Singular => (a - b) * (a + b),
            Form::Eigen => a - b,
        }
    }
}

/// Secular function evaluated at one iterate
struct Evaluation<A> {
    f: A,
    df: A,
    err_bound: A,
}

/// Iterate of the solver, stored relative to `origin`
struct Secular<'a, A> {
    form: Form,
    d: ArrayView1<'a, A>,
    z: ArrayView1<'a, A>,
    rho_inv: A,
    negative_fix: NegativeFix,
    origin: A,
    minus: Array1<A>,
    plus: Array1<A>,
}

impl<'a, A: NdFloat> Secular<'a, A> {
    fn new(
        form: Form,
        d: ArrayView1<'a, A>,
        z: ArrayView1<'a, A>,
        rho: A,
        negative_fix: NegativeFix,
    ) -> Self {
        let n = d.len();
        Self {
            form,
            d,
            z,
            rho_inv: rho.recip(),
            negative_fix,
            origin: A::zero(),
            minus: Array1::zeros(n),
            plus: Array1::ones(n),
        }
    }

    /// Step in the squared variable corresponding to `tau`
    fn eta_from_tau(&self, tau: A) -> A {
        match self.form {
            Form::Singular => tau * (self.origin + self.origin + tau),
            Form::Eigen => tau,
        }
    }

    fn tau_from_eta(&self, eta: A) -> A {
        match self.form {
            Form::Eigen => eta,
            Form::Singular => {
                let radicand = self.negative_fix.apply(self.origin * self.origin + eta);
                let denom = self.origin + radicand.sqrt();
                if denom.is_zero() {
                    A::zero()
                } else {
                    eta / denom
                }
            }
        }
    }

    fn set_tau(&mut self, tau: A) {
        let origin = self.origin;
        let form = self.form;
        for ((minus, plus), &dk) in self
            .minus
            .iter_mut()
            .zip(self.plus.iter_mut())
            .zip(self.d.iter())
        {
            *minus = (dk - origin) - tau;
            if form == Form::Singular {
                *plus = (dk + origin) + tau;
            }
        }
    }

    fn gap(&self, k: usize) -> A {
        self.minus[k] * self.plus[k]
    }

    /// Evaluates the secular function, splitting the poles into those at or below `last_left`
    /// and those above it.
    fn evaluate(&self, last_left: usize, eta: A) -> Evaluation<A> {
        let (mut psi, mut phi, mut df) = (A::zero(), A::zero(), A::zero());
        for k in 0..self.d.len() {
            let t = self.z[k] / self.gap(k);
            let term = self.z[k] * t;
            df += t * t;
            if k <= last_left {
                psi += term;
            } else {
                phi += term;
            }
        }
        let eight = A::from(8.0).unwrap();
        Evaluation {
            f: self.rho_inv + psi + phi,
            df,
            err_bound: eight * (psi.abs() + phi.abs())
                + self.rho_inv
                + self.rho_inv
                + eta.abs() * df,
        }
    }

    /// Step from the rational model interpolating `f` with two poles `p1 < p2` at the current
    /// iterate.
    ///
    /// `weight` picks which pole keeps its exact residue; `None` fits both residues to the
    /// derivatives of the poles below and above the interval.
    fn two_pole_step(
        &self,
        p1: usize,
        p2: usize,
        weight: Option<usize>,
        eval: &Evaluation<A>,
    ) -> [Option<A>; 2] {
        let (f, df) = (eval.f, eval.df);
        let (del1, del2) = (self.gap(p1), self.gap(p2));
        let c = match weight {
            Some(p) if p == p1 => {
                let zr = self.z[p1] / del1;
                f - del2 * df - self.form.pole_diff(self.d[p1], self.d[p2]) * zr * zr
            }
            Some(_) => {
                let zr = self.z[p2] / del2;
                f - del1 * df - self.form.pole_diff(self.d[p2], self.d[p1]) * zr * zr
            }
            None => {
                let (mut dpsi, mut dphi) = (A::zero(), A::zero());
                for k in 0..self.d.len() {
                    let t = self.z[k] / self.gap(k);
                    if k <= p1 {
                        dpsi += t * t;
                    } else {
                        dphi += t * t;
                    }
                }
                f - del1 * dpsi - del2 * dphi
            }
        };
        let a = (del1 + del2) * f - del1 * del2 * df;
        let b = del1 * del2 * f;
        quadratic_roots(a, b, c, self.negative_fix)
    }

    /// Step from the single-pole model, exact when `f` has only one pole
    fn one_pole_step(&self, p: usize, eval: &Evaluation<A>) -> Option<A> {
        let del = self.gap(p);
        let s = del * del * eval.df;
        let c = eval.f - del * eval.df;
        if c.is_zero() {
            None
        } else {
            Some(del + s / c)
        }
    }

    /// Solves the model with three exact poles and a linear remainder by safeguarded Newton.
    ///
    /// The root is searched for in `(lower, upper)`, starting from `start`. Returns the step
    /// together with the number of Newton iterations, or the iterations spent if the model did
    /// not converge.
    fn cubic_step(
        &self,
        poles: [usize; 3],
        eval: &Evaluation<A>,
        mut lower: A,
        mut upper: A,
        start: A,
        max_iterations: usize,
    ) -> std::result::Result<(A, usize), usize> {
        let eps = A::epsilon();
        let two = A::from(2.0).unwrap();
        let eight = A::from(8.0).unwrap();

        let mut residue = [A::zero(); 3];
        let mut del = [A::zero(); 3];
        let (mut rest, mut drest) = (eval.f, eval.df);
        for (idx, &p) in poles.iter().enumerate() {
            residue[idx] = self.z[p] * self.z[p];
            del[idx] = self.gap(p);
            rest -= residue[idx] / del[idx];
            drest -= residue[idx] / (del[idx] * del[idx]);
        }
        let drest = drest.max(A::zero());

        let mut y = start;
        for iter in 1..=max_iterations {
            let (mut g, mut dg, mut scale) = (rest + drest * y, drest, rest.abs() + (drest * y).abs());
            for idx in 0..3 {
                let t = A::one() / (del[idx] - y);
                g += residue[idx] * t;
                dg += residue[idx] * t * t;
                scale += (residue[idx] * t).abs();
            }
            if g.abs() <= eight * eps * scale {
                return Ok((y, iter));
            }
            // A step below one ulp of the iterate cannot make progress
            let step = g / dg;
            if step.abs() <= two * eps * y.abs() || y - step == y {
                return Ok((y, iter));
            }
            // The model is increasing on the search interval
            if g < A::zero() {
                lower = y;
            } else {
                upper = y;
            }
            let mut next = y - step;
            if !(next > lower && next < upper) {
                next = (lower + upper) / two;
            }
            if (next - y).abs() <= two * eps * next.abs() {
                return Ok((next, iter));
            }
            y = next;
        }
        Err(max_iterations)
    }
}

/// Roots of `c y^2 - a y + b = 0`, computed without cancellation
fn quadratic_roots<A: Float>(a: A, b: A, c: A, fix: NegativeFix) -> [Option<A>; 2] {
    if c.is_zero() {
        return if a.is_zero() { [None, None] } else { [Some(b / a), None] };
    }
    let two = A::from(2.0).unwrap();
    let four = A::from(4.0).unwrap();
    let disc = fix.apply(a * a - four * b * c).sqrt();
    let q = if a >= A::zero() {
        (a + disc) / two
    } else {
        (a - disc) / two
    };
    if q.is_zero() {
        [Some(A::zero()), None]
    } else {
        [Some(q / c), Some(b / q)]
    }
}

/// The three consecutive poles nearest to the root between `d[i]` and `d[i+1]` (or beyond
/// `d[n-1]`), leaning towards `origin_pole`.
fn nearest_three(i: usize, origin_pole: usize, n: usize) -> Option<[usize; 3]> {
    if n < 3 {
        return None;
    }
    let start = if i + 1 >= n {
        n - 3
    } else if (origin_pole == i && i >= 1) || i + 2 >= n {
        i - 1
    } else {
        i
    };
    Some([start, start + 1, start + 2])
}

fn solve<A: NdFloat>(
    form: Form,
    i: usize,
    d: ArrayView1<A>,
    rho: A,
    z: ArrayView1<A>,
    ctrl: &SecularCtrl,
) -> SecularRoot<A> {
    let (d, z) = (d.reborrow(), z.reborrow());
    let n = d.len();
    let eps = A::epsilon();
    let two = A::from(2.0).unwrap();
    let four = A::from(4.0).unwrap();
    let eight = A::from(8.0).unwrap();
    let ten = A::from(10.0).unwrap();

    let mut result = SecularResult {
        value: A::zero(),
        num_iterations: 0,
        num_alternations: 0,
        num_cubic_iterations: 0,
        num_cubic_failures: 0,
        converged: false,
    };
    let mut sec = Secular::new(form, d, z, rho, ctrl.negative_fix);
    let is_last = i + 1 == n;

    // Pick the pole closer to the root as origin, and bracket the root in the squared variable
    let (origin_pole, mut lo, mut hi, mut eta) = if is_last {
        sec.origin = d[i];
        let hi = rho * z.dot(&z) * (A::one() + eight * eps);
        (i, A::zero(), hi, hi / two)
    } else {
        let h = (d[i + 1] - d[i]) / two;
        sec.origin = d[i];
        sec.set_tau(h);
        let eta_mid = sec.eta_from_tau(h);
        if sec.evaluate(i, eta_mid).f >= A::zero() {
            (i, A::zero(), eta_mid, eta_mid)
        } else {
            sec.origin = d[i + 1];
            let eta_mid = sec.eta_from_tau(-h);
            (i + 1, eta_mid, A::zero(), eta_mid)
        }
    };

    let mut weight = origin_pole;
    let mut f_prev: Option<A> = None;
    loop {
        let tau = sec.tau_from_eta(eta);
        sec.set_tau(tau);
        let eval = sec.evaluate(i, eta);
        result.num_iterations += 1;

        if eval.f.abs() <= eps * eval.err_bound {
            result.converged = true;
            break;
        }
        if eval.f < A::zero() {
            lo = eta;
        } else {
            hi = eta;
        }
        if hi - lo <= two * eps * lo.abs().max(hi.abs()) {
            result.converged = true;
            break;
        }
        if result.num_iterations >= ctrl.max_iterations {
            break;
        }

        // Keep the exact residue on the other pole if the last step made no real progress
        if !is_last {
            if let Some(fp) = f_prev {
                if fp * eval.f > A::zero() && eval.f.abs() > fp.abs() / ten {
                    weight = if weight == i { i + 1 } else { i };
                    result.num_alternations += 1;
                }
            }
        }
        f_prev = Some(eval.f);

        let (lower, upper) = (lo - eta, hi - eta);
        let inside = |y: &A| *y > lower && *y < upper;

        let candidates = if n == 1 {
            [sec.one_pole_step(0, &eval), None]
        } else if is_last {
            sec.two_pole_step(n - 2, n - 1, None, &eval)
        } else {
            sec.two_pole_step(i, i + 1, Some(weight), &eval)
        };
        let mut step = candidates
            .iter()
            .flatten()
            .copied()
            .filter(inside)
            .fold(None, |best: Option<A>, y| match best {
                Some(b) if b.abs() <= y.abs() => Some(b),
                _ => Some(y),
            });

        // Refine the two-pole step with the three nearest poles
        if ctrl.max_cubic_iterations > 0 {
            if let Some(poles) = nearest_three(i, weight, n) {
                let start = step.unwrap_or((lower + upper) / two);
                match sec.cubic_step(poles, &eval, lower, upper, start, ctrl.max_cubic_iterations) {
                    Ok((y, iters)) => {
                        result.num_cubic_iterations += iters;
                        if inside(&y) {
                            step = Some(y);
                        }
                    }
                    Err(iters) => {
                        result.num_cubic_iterations += iters;
                        result.num_cubic_failures += 1;
                    }
                }
            }
        }

        let next = match step {
            Some(y) => eta + y,
            None => (lo + hi) / two,
        };
        if (next - eta).abs() <= four * eps * eta.abs() {
            eta = next;
            result.converged = true;
            break;
        }
        eta = next;
    }

    let tau = sec.tau_from_eta(eta);
    sec.set_tau(tau);
    result.value = sec.origin + tau;

    if !result.converged {
        log::warn!(
            "secular equation for root {} of {} did not converge after {} iterations",
            i,
            n,
            result.num_iterations
        );
    } else if ctrl.progress {
        log::trace!(
            "root {} = {:e} after {} iterations ({} alternations, {} cubic iterations)",
            i,
            result.value,
            result.num_iterations,
            result.num_alternations,
            result.num_cubic_iterations
        );
    }

    SecularRoot {
        result,
        minus_shift: sec.minus,
        plus_shift: sec.plus,
    }
}

fn validate<A: NdFloat>(d: ArrayView1<A>, rho: A, z: ArrayView1<A>) -> Result<()> {
    if d.is_empty() {
        return Err(LinalgError::EmptyMatrix);
    }
    if z.len() != d.len() {
        return Err(LinalgError::WrongLength {
            expected: d.len(),
            actual: z.len(),
        });
    }
    if d.iter().zip(d.iter().skip(1)).any(|(a, b)| !(a < b)) {
        return Err(LinalgError::NotSorted);
    }
    if !(rho > A::zero()) {
        return Err(LinalgError::NonPositiveCoupling);
    }
    Ok(())
}

fn check_index(i: usize, n: usize) -> Result<()> {
    if i >= n {
        Err(LinalgError::IndexOutOfRange { index: i, len: n })
    } else {
        Ok(())
    }
}

/// Computes the `i`th smallest root of `1/rho + sum_k z_k^2 / (d_k^2 - sigma^2)`.
///
/// `d` must be nonnegative and strictly ascending, and `rho` positive. The root lies in
/// `(d[i], d[i+1])`, or above `d[n-1]` for the last index.
pub fn singular_value<A: NdFloat>(
    i: usize,
    d: ArrayView1<A>,
    rho: A,
    z: ArrayView1<A>,
    ctrl: &SecularCtrl,
) -> Result<SecularRoot<A>> {
    validate(d, rho, z)?;
    check_index(i, d.len())?;
    if d[0] < A::zero() {
        return Err(LinalgError::NotSorted);
    }
    Ok(solve(Form::Singular, i, d, rho, z, ctrl))
}

/// Computes the `i`th smallest root of `1/rho + sum_k z_k^2 / (d_k - lambda)`.
///
/// `d` must be strictly ascending, and `rho` positive.
pub fn eigenvalue<A: NdFloat>(
    i: usize,
    d: ArrayView1<A>,
    rho: A,
    z: ArrayView1<A>,
    ctrl: &SecularCtrl,
) -> Result<SecularRoot<A>> {
    validate(d, rho, z)?;
    check_index(i, d.len())?;
    Ok(solve(Form::Eigen, i, d, rho, z, ctrl))
}

/// Solves for every root, returning the roots and the matrix of gaps whose `(k, j)` entry is
/// `d_k^2 - sigma_j^2` (or `d_k - lambda_j`).
pub(crate) fn all_roots<A: NdFloat>(
    form: Form,
    d: ArrayView1<A>,
    rho: A,
    z: ArrayView1<A>,
    ctrl: &SecularCtrl,
) -> (Array1<A>, Array2<A>, SecularInfo) {
    let n = d.len();
    let mut values = Array1::zeros(n);
    let mut gaps = Array2::zeros((n, n));
    let mut info = SecularInfo::default();
    for j in 0..n {
        let root = solve(form, j, d, rho, z, ctrl);
        values[j] = root.result.value;
        info.record(&root.result);
        gaps.column_mut(j).assign(&root.gaps());
    }
    (values, gaps, info)
}

/// Recovers the update vector for which the computed roots are exact (Gu/Eisenstat).
///
/// The magnitudes come from the roots alone; the signs are those of `z`. The result is scaled
/// like `sqrt(rho) z`.
pub(crate) fn corrected_update<A: NdFloat>(
    form: Form,
    d: ArrayView1<A>,
    z: ArrayView1<A>,
    gaps: &Array2<A>,
) -> Array1<A> {
    let n = d.len();
    let mut rc: Array1<A> = Array1::ones(n);
    for j in 0..n {
        for k in 0..n {
            if k == j {
                rc[k] *= gaps[(k, j)];
            } else {
                rc[k] *= gaps[(k, j)] / form.pole_diff(d[j], d[k]);
            }
        }
    }
    for (rk, &zk) in rc.iter_mut().zip(z.iter()) {
        let mag = rk.abs().sqrt();
        *rk = if zk >= A::zero() { mag } else { -mag };
    }
    rc
}

/// Left and right singular vectors of `| r^T ; diag(d[1..]) |` from its corrected update vector
///
/// The left vectors have a positive entry in the first row.
pub(crate) fn singular_vectors<A: NdFloat>(
    d: ArrayView1<A>,
    r: ArrayView1<A>,
    gaps: &Array2<A>,
) -> (Array2<A>, Array2<A>) {
    let n = d.len();
    let mut u = Array2::zeros((n, n));
    let mut v = Array2::zeros((n, n));
    for j in 0..n {
        for i in 0..n {
            v[(i, j)] = -r[i] / gaps[(i, j)];
            u[(i, j)] = if i == 0 { A::one() } else { d[i] * v[(i, j)] };
        }
        let (un, vn) = (u.column(j).norm_l2(), v.column(j).norm_l2());
        u.column_mut(j).mapv_inplace(|x| x / un);
        v.column_mut(j).mapv_inplace(|x| x / vn);
    }
    (u, v)
}

fn eigenvectors<A: NdFloat>(r: ArrayView1<A>, gaps: &Array2<A>) -> Array2<A> {
    let n = r.len();
    let mut v = Array2::zeros((n, n));
    for j in 0..n {
        for k in 0..n {
            v[(k, j)] = r[k] / gaps[(k, j)];
        }
        let vn = v.column(j).norm_l2();
        v.column_mut(j).mapv_inplace(|x| x / vn);
    }
    v
}

/// Full SVD of `| sqrt(rho) z^T ; 0 diag(d[1..]) |`
///
/// `d` must be strictly ascending with `d[0] == 0`. Returns `(U, s, V, info)` with `s`
/// ascending.
pub fn secular_svd<A: NdFloat>(
    d: ArrayView1<A>,
    rho: A,
    z: ArrayView1<A>,
    ctrl: &SecularCtrl,
) -> Result<(Array2<A>, Array1<A>, Array2<A>, SecularInfo)> {
    validate(d, rho, z)?;
    if !d[0].is_zero() {
        return Err(LinalgError::NonzeroLeadingDiagonal);
    }
    let (s, gaps, info) = all_roots(Form::Singular, d, rho, z, ctrl);
    let r = corrected_update(Form::Singular, d, z, &gaps);
    let (u, v) = singular_vectors(d, r.view(), &gaps);
    Ok((u, s, v, info))
}

/// Eigendecomposition of `diag(d) + rho z z^T`
///
/// `d` must be strictly ascending. Returns `(eigvals, eigvecs, info)` with ascending
/// eigenvalues.
pub fn secular_evd<A: NdFloat>(
    d: ArrayView1<A>,
    rho: A,
    z: ArrayView1<A>,
    ctrl: &SecularCtrl,
) -> Result<(Array1<A>, Array2<A>, SecularInfo)> {
    validate(d, rho, z)?;
    let (vals, gaps, info) = all_roots(Form::Eigen, d, rho, z, ctrl);
    let r = corrected_update(Form::Eigen, d, z, &gaps);
    let vecs = eigenvectors(r.view(), &gaps);
    Ok((vals, vecs, info))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    use super::*;

    #[test]
    fn single_pole() {
        // 1/rho + z^2 / (d^2 - sigma^2) = 0  =>  sigma^2 = d^2 + rho z^2
        let d = array![3.0f64];
        let z = array![1.0];
        let root = singular_value(0, d.view(), 16., z.view(), &SecularCtrl::default()).unwrap();
        assert!(root.result.converged);
        assert_abs_diff_eq!(root.result.value, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(root.minus_shift[0], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(root.plus_shift[0], 8.0, epsilon = 1e-12);

        let root = eigenvalue(0, d.view(), 2., z.view(), &SecularCtrl::default()).unwrap();
        assert_abs_diff_eq!(root.result.value, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(root.gaps()[0], -2.0, epsilon = 1e-12);
    }

    #[test]
    fn roots_interlace() {
        let d = array![0.0f64, 0.5, 1.0, 1.7, 3.0];
        let z = array![0.4, -0.3, 0.5, 0.2, 0.6];
        let z = &z / z.norm_l2();
        let rho = 0.8;
        for ctrl in [
            SecularCtrl::default(),
            SecularCtrl::default().max_cubic_iterations(0),
            SecularCtrl::default().negative_fix(NegativeFix::Flip),
        ] {
            for i in 0..d.len() {
                let root = singular_value(i, d.view(), rho, z.view(), &ctrl).unwrap();
                let sigma = root.result.value;
                assert!(root.result.converged);
                assert!(sigma > d[i]);
                if i + 1 < d.len() {
                    assert!(sigma < d[i + 1]);
                } else {
                    assert!(sigma * sigma <= d[i] * d[i] + rho * 1.000001);
                }
                let f = 1. / rho
                    + d.iter()
                        .zip(z.iter())
                        .map(|(dk, zk)| zk * zk / (dk * dk - sigma * sigma))
                        .sum::<f64>();
                assert_abs_diff_eq!(f, 0.0, epsilon = 1e-8);
                assert_abs_diff_eq!(
                    root.gaps(),
                    d.mapv(|dk| dk * dk - sigma * sigma),
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    fn small_weight() {
        // A tiny weight pins the root against its pole; the gap must keep relative accuracy
        let d = array![0.0f64, 1.0, 2.0];
        let z = array![0.7, 1e-7, 0.7];
        let root = singular_value(1, d.view(), 1.0, z.view(), &SecularCtrl::default()).unwrap();
        assert!(root.result.converged);
        let gap = -root.gaps()[1];
        assert!(gap > 0.);
        assert!(gap < 1e-12);
        let sigma = root.result.value;
        let f = 1. + d
            .iter()
            .zip(z.iter())
            .enumerate()
            .map(|(k, (dk, zk))| {
                let g = if k == 1 { -gap } else { dk * dk - sigma * sigma };
                zk * zk / g
            })
            .sum::<f64>();
        assert!(f.abs() < 1e-6);
    }

    #[test]
    fn quadratic() {
        // 2 y^2 - 5 y + 2 = 0  =>  y = 2, 0.5
        let roots = quadratic_roots(5.0f64, 2.0, 2.0, NegativeFix::Clip);
        assert_abs_diff_eq!(roots[0].unwrap(), 2.0);
        assert_abs_diff_eq!(roots[1].unwrap(), 0.5);
        // Linear
        let roots = quadratic_roots(4.0f64, 2.0, 0.0, NegativeFix::Clip);
        assert_eq!(roots, [Some(0.5), None]);
        // Negative discriminant
        let roots = quadratic_roots(2.0f64, 1.0 + 1e-16, 1.0, NegativeFix::Clip);
        assert_abs_diff_eq!(roots[0].unwrap(), 1.0);
    }

    #[test]
    fn invalid() {
        let ctrl = SecularCtrl::default();
        let d = array![0.0f64, 1.0];
        let z = array![1.0, 1.0];
        assert!(matches!(
            singular_value(2, d.view(), 1.0, z.view(), &ctrl),
            Err(LinalgError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            singular_value(0, d.view(), 0.0, z.view(), &ctrl),
            Err(LinalgError::NonPositiveCoupling)
        ));
        assert!(matches!(
            singular_value(0, d.view(), 1.0, array![1.0].view(), &ctrl),
            Err(LinalgError::WrongLength { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            eigenvalue(0, array![1.0, 1.0].view(), 1.0, z.view(), &ctrl),
            Err(LinalgError::NotSorted)
        ));
        assert!(matches!(
            secular_svd(array![1.0, 2.0].view(), 1.0, z.view(), &ctrl),
            Err(LinalgError::NonzeroLeadingDiagonal)
        ));
    }

    #[test]
    fn svd_small() {
        let d = array![0.0f64, 1.0, 2.5];
        let z = array![0.6, 1e-3, 0.8];
        let rho = 2.0;
        let (u, s, v, info) = secular_svd(d.view(), rho, z.view(), &SecularCtrl::default()).unwrap();
        assert_eq!(info.num_unconverged, 0);

        let mut m = Array2::<f64>::zeros((3, 3));
        m.row_mut(0).assign(&(&z * rho.sqrt()));
        m[(1, 1)] = 1.0;
        m[(2, 2)] = 2.5;
        assert_abs_diff_eq!(u.t().dot(&u), Array2::eye(3), epsilon = 1e-12);
        assert_abs_diff_eq!(v.t().dot(&v), Array2::eye(3), epsilon = 1e-12);
        assert_abs_diff_eq!(u.dot(&Array2::from_diag(&s)).dot(&v.t()), m, epsilon = 1e-12);
        assert!(u.row(0).iter().all(|&x| x > 0.));
    }

    #[test]
    fn cubic_even_poles() {
        // Newton on the three-pole model stops once its step drops below one ulp
        let n = 41;
        let d = Array1::linspace(0.0f64, 40.0, n);
        let z = Array1::from_elem(n, 1.0 / (n as f64).sqrt());
        let (_, s, _, info) = secular_svd(d.view(), 1.0, z.view(), &SecularCtrl::default()).unwrap();
        assert_eq!(info.num_unconverged, 0);
        assert_eq!(info.num_cubic_failures, 0);
        assert!(info.num_cubic_iterations > 0);
        for i in 0..n - 1 {
            assert!(s[i] > d[i] && s[i] < d[i + 1]);
        }
    }
}
