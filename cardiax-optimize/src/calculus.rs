use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, RealField, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;

pub trait VectorFunction<T>
where
    T: Scalar,
{
    fn dimension(&self) -> usize;
    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>);
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        X::eval_into(self, f, x)
    }
}

/// A vector function whose Jacobian system can be solved, as needed by Newton's method.
pub trait DifferentiableVectorFunction<T>: VectorFunction<T>
where
    T: Scalar,
{
    /// Solve `J(x) sol = rhs`.
    ///
    /// The `iteration` is the zero-based Newton iteration the solve belongs to. Functions with
    /// constrained unknowns use it to tell the first (full constraint value) solve apart from
    /// the later (zero increment) ones.
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
        iteration: usize,
    ) -> Result<(), Box<dyn Error>>;

    /// Called whenever `x` has been modified outside of `eval_into`, i.e. before the very first
    /// evaluation and after every Newton update.
    fn synchronize(&mut self, _x: &DVectorView<T>) {}
}

impl<T, X> DifferentiableVectorFunction<T> for &mut X
where
    T: Scalar,
    X: DifferentiableVectorFunction<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
        iteration: usize,
    ) -> Result<(), Box<dyn Error>> {
        X::solve_jacobian_system(self, sol, x, rhs, iteration)
    }

    fn synchronize(&mut self, x: &DVectorView<T>) {
        X::synchronize(self, x)
    }
}

/// Approximates the $m \times n$ Jacobian $J_{ij} = \partial f_i / \partial x_j$ of
/// $f: \mathbb{R}^n \rightarrow \mathbb{R}^m$ at `x` by centered differences with step `h`.
///
/// `f(x, out)` writes $f(x)$ into `out`. The entries of `x` are perturbed in place one at a
/// time and hold their original values again on return.
#[replace_float_literals(T::from_f64(literal).unwrap())]
pub fn approximate_jacobian_fd<'a, T>(
    m: usize,
    mut f: impl FnMut(DVectorView<T>, DVectorViewMut<T>),
    x: impl Into<DVectorViewMut<'a, T>>,
    h: T,
) -> DMatrix<T>
where
    T: RealField + Copy,
{
    let mut x = x.into();
    let mut jacobian = DMatrix::zeros(m, x.len());
    let mut f_plus = DVector::zeros(m);
    let mut f_minus = DVector::zeros(m);

    for (j, mut column) in jacobian.column_iter_mut().enumerate() {
        let x_j = x[j];
        x[j] = x_j + h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_plus));
        x[j] = x_j - h;
        f(DVectorView::from(&x), DVectorViewMut::from(&mut f_minus));
        x[j] = x_j;

        column.copy_from(&f_plus);
        column -= &f_minus;
        column /= 2.0 * h;
    }
    jacobian
}
