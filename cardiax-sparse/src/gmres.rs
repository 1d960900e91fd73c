//! Restarted GMRES(m) with right preconditioning.
//!
//! The least-squares problem for the Hessenberg matrix is solved incrementally with Givens
//! rotations, so the residual norm of the current iterate is available at every step without
//! forming the iterate.
use crate::operator::{apply_operator, IdentityOperator, LinearOperator, SolveError, SolveErrorKind, SolveOutput};
use log::debug;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, RealField};

const METHOD: &str = "GMRES";

#[derive(Debug)]
pub struct Gmres<A, P, T> {
    operator: A,
    preconditioner: P,
    restart: usize,
    tolerance: T,
    max_iter: Option<usize>,
}

impl Gmres<(), IdentityOperator, f64> {
    pub fn new() -> Self {
        Self {
            operator: (),
            preconditioner: IdentityOperator,
            restart: 30,
            tolerance: 1e-8,
            max_iter: None,
        }
    }
}

impl Default for Gmres<(), IdentityOperator, f64> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, T> Gmres<(), P, T> {
    pub fn with_operator<A>(self, operator: A) -> Gmres<A, P, T> {
        Gmres {
            operator,
            preconditioner: self.preconditioner,
            restart: self.restart,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }
}

impl<A, P, T> Gmres<A, P, T> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> Gmres<A, P2, T> {
        Gmres {
            operator: self.operator,
            preconditioner,
            restart: self.restart,
            tolerance: self.tolerance,
            max_iter: self.max_iter,
        }
    }

    /// Sets the dimension of the Krylov subspace before the method restarts.
    pub fn with_restart(self, restart: usize) -> Self {
        assert!(restart > 0, "Restart length must be positive");
        Self { restart, ..self }
    }

    /// Sets the relative residual tolerance `||b - Ax|| <= tol * ||b||`.
    pub fn with_tolerance<T2>(self, tolerance: T2) -> Gmres<A, P, T2> {
        Gmres {
            operator: self.operator,
            preconditioner: self.preconditioner,
            restart: self.restart,
            tolerance,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

/// Computes `(c, s, r)` such that `[c s; -s c] [a; b] = [r; 0]`.
fn givens_rotation<T: RealField + Copy>(a: T, b: T) -> (T, T, T) {
    if b == T::zero() {
        (T::one(), T::zero(), a)
    } else if b.abs() > a.abs() {
        let tau = a / b;
        let s = T::one() / (T::one() + tau * tau).sqrt();
        let c = s * tau;
        (c, s, b / s)
    } else {
        let tau = b / a;
        let c = T::one() / (T::one() + tau * tau).sqrt();
        let s = c * tau;
        (c, s, a / c)
    }
}

impl<A, P, T> Gmres<A, P, T>
where
    T: RealField + Copy,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
{
    pub fn solve_with_guess<'b>(
        &self,
        b: impl Into<DVectorView<'b, T>>,
        x: impl Into<DVectorViewMut<'b, T>>,
    ) -> Result<SolveOutput<T>, SolveError<T>> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(&self, b: DVectorView<T>, mut x: DVectorViewMut<T>) -> Result<SolveOutput<T>, SolveError<T>> {
        use SolveErrorKind::*;
        assert_eq!(b.len(), x.len());
        let n = b.len();
        let m = self.restart;

        let b_norm = b.norm();
        let mut output = SolveOutput::new(b_norm);
        if b_norm == T::zero() {
            x.fill(T::zero());
            output.residual_norm = T::zero();
            return Ok(output);
        }
        let target = self.tolerance * b_norm;

        let mut r = DVector::zeros(n);
        let mut w = DVector::zeros(n);
        let mut z = DVector::zeros(n);
        let mut basis: Vec<DVector<T>> = (0..=m).map(|_| DVector::zeros(n)).collect();
        let mut h = DMatrix::zeros(m + 1, m);
        let mut g = DVector::zeros(m + 1);
        let mut cs = vec![T::zero(); m];
        let mut sn = vec![T::zero(); m];

        loop {
            // r = b - Ax
            if let Err(err) = apply_operator(&mut r, &self.operator, &x) {
                return Err(SolveError::new(METHOD, output, OperatorError(err)));
            }
            r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - *ax_i);
            let r_norm = r.norm();
            output.residual_norm = r_norm;

            if r_norm <= target {
                break;
            }
            if let Some(max_iter) = self.max_iter {
                if output.num_iterations >= max_iter {
                    return Err(SolveError::new(METHOD, output, MaxIterationsReached { max_iter }));
                }
            }

            basis[0].copy_from(&r);
            basis[0] /= r_norm;
            h.fill(T::zero());
            g.fill(T::zero());
            g[0] = r_norm;

            let mut k = 0;
            for j in 0..m {
                if self.max_iter.map(|max_iter| output.num_iterations >= max_iter).unwrap_or(false) {
                    break;
                }

                // w = A P v_j
                if let Err(err) = apply_operator(&mut z, &self.preconditioner, &basis[j]) {
                    return Err(SolveError::new(METHOD, output, PreconditionerError(err)));
                }
                if let Err(err) = apply_operator(&mut w, &self.operator, &z) {
                    return Err(SolveError::new(METHOD, output, OperatorError(err)));
                }

                // Modified Gram-Schmidt
                for i in 0..=j {
                    let h_ij = basis[i].dot(&w);
                    h[(i, j)] = h_ij;
                    w.axpy(-h_ij, &basis[i], T::one());
                }
                let h_next = w.norm();
                h[(j + 1, j)] = h_next;
                if h_next != T::zero() {
                    basis[j + 1].copy_from(&w);
                    basis[j + 1] /= h_next;
                }

                // Apply previous rotations to the new column
                for i in 0..j {
                    let tmp = cs[i] * h[(i, j)] + sn[i] * h[(i + 1, j)];
                    h[(i + 1, j)] = -sn[i] * h[(i, j)] + cs[i] * h[(i + 1, j)];
                    h[(i, j)] = tmp;
                }

                let (c, s, rho) = givens_rotation(h[(j, j)], h[(j + 1, j)]);
                cs[j] = c;
                sn[j] = s;
                h[(j, j)] = rho;
                h[(j + 1, j)] = T::zero();

                g[j + 1] = -s * g[j];
                g[j] = c * g[j];

                k = j + 1;
                output.num_iterations += 1;
                output.residual_norm = g[k].abs();

                // A vanishing subdiagonal means the Krylov space is invariant
                if output.residual_norm <= target || h_next == T::zero() {
                    break;
                }
            }

            if k == 0 {
                continue;
            }

            // Back substitution for the upper triangular system H y = g
            let mut y = DVector::zeros(k);
            for i in (0..k).rev() {
                let mut sum = g[i];
                for l in (i + 1)..k {
                    sum -= h[(i, l)] * y[l];
                }
                if h[(i, i)] == T::zero() {
                    return Err(SolveError::new(METHOD, output, Breakdown));
                }
                y[i] = sum / h[(i, i)];
            }

            // x <- x + P V y
            w.fill(T::zero());
            for l in 0..k {
                w.axpy(y[l], &basis[l], T::one());
            }
            if let Err(err) = apply_operator(&mut z, &self.preconditioner, &w) {
                return Err(SolveError::new(METHOD, output, PreconditionerError(err)));
            }
            x += &z;

            debug!(
                "GMRES restart cycle finished after {} iterations, estimated residual {}",
                output.num_iterations, output.residual_norm
            );
        }

        Ok(output)
    }
}
