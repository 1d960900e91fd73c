use cardiax_optimize::calculus::{DifferentiableVectorFunction, VectorFunction};
use cardiax_optimize::newton::*;
use nalgebra::{DVector, DVectorView, DVectorViewMut, Matrix3, Vector3};
use numeric_literals::replace_numeric_literals;
use std::error::Error;

struct MockLinearVectorFunction;

impl VectorFunction<f64> for MockLinearVectorFunction {
    fn dimension(&self) -> usize {
        3
    }

    #[replace_numeric_literals(f64::from(literal))]
    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let b = Vector3::new(1, 2, 3);
        let r = a * x - b;
        f.copy_from(&r);
    }
}

impl DifferentiableVectorFunction<f64> for MockLinearVectorFunction {
    #[replace_numeric_literals(f64::from(literal))]
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        _x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
        _iteration: usize,
    ) -> Result<(), Box<dyn Error>> {
        let a = Matrix3::new(5, 1, 2, 1, 4, 2, 2, 2, 4);
        let a_inv = a.try_inverse().unwrap();
        sol.copy_from(&(a_inv * rhs));
        Ok(())
    }
}

/// f(x) = x^3 - 8 component-wise, with root x = 2.
struct Cubic {
    synchronized: Vec<DVector<f64>>,
    fail_linear_solve: bool,
}

impl VectorFunction<f64> for Cubic {
    fn dimension(&self) -> usize {
        2
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
        for i in 0..2 {
            f[i] = x[i] * x[i] * x[i] - 8.0;
        }
    }
}

impl DifferentiableVectorFunction<f64> for Cubic {
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<f64>,
        x: &DVectorView<f64>,
        rhs: &DVectorView<f64>,
        _iteration: usize,
    ) -> Result<(), Box<dyn Error>> {
        if self.fail_linear_solve {
            return Err(Box::from("singular"));
        }
        for i in 0..2 {
            sol[i] = rhs[i] / (3.0 * x[i] * x[i]);
        }
        Ok(())
    }

    fn synchronize(&mut self, x: &DVectorView<f64>) {
        self.synchronized.push(x.clone_owned());
    }
}

fn cubic() -> Cubic {
    Cubic {
        synchronized: Vec::new(),
        fail_linear_solve: false,
    }
}

#[test]
fn newton_converges_in_single_iteration_for_linear_system() {
    let expected_solution = Vector3::new(-0.125, 0.16666667, 0.72916667);

    let settings = NewtonSettings::new(Vector3::new(1.0, 2.0, 3.0).norm() * 1e-6).with_max_iterations(2);

    let mut x = DVector::zeros(3);
    let output = newton(MockLinearVectorFunction, &mut x, settings).expect("Newton iterations must succeed");
    let diff = x - expected_solution;
    assert!(diff.norm() < 1e-6);
    assert_eq!(output.iterations, 1);
}

#[test]
fn newton_from_converged_state_performs_no_iterations() {
    let settings = NewtonSettings::new(1e-10).with_max_iterations(5);
    let mut x = DVector::from_element(2, 2.0);
    let mut solver = NewtonSolver::new(cubic(), settings);
    let output = solver.solve(&mut x).unwrap();

    assert_eq!(output.iterations, 0);
    assert_eq!(solver.state(), NewtonState::Converged);
    assert_eq!(x, DVector::from_element(2, 2.0));
}

#[test]
fn newton_state_machine_visits_states_in_order() {
    let settings = NewtonSettings::new(1e-12).with_max_iterations(50);
    let mut x = DVector::from_element(2, 3.0);
    let mut solver = NewtonSolver::new(cubic(), settings);
    solver.reset(&DVectorView::from(&x));

    let mut states = vec![solver.state()];
    loop {
        let state = solver.advance(&mut x).unwrap();
        states.push(state);
        if state.is_terminal() {
            break;
        }
    }

    assert_eq!(
        &states[..4],
        &[
            NewtonState::Assembling,
            NewtonState::LinearSolve,
            NewtonState::Updating,
            NewtonState::Assembling
        ]
    );
    assert_eq!(states.last(), Some(&NewtonState::Converged));
    assert!((x[0] - 2.0).abs() < 1e-10);
    assert!((x[1] - 2.0).abs() < 1e-10);
    // One synchronization from reset plus one per update
    assert_eq!(solver.function().synchronized.len(), solver.iterations() + 1);
}

#[test]
fn newton_reports_maximum_iterations() {
    let settings = NewtonSettings::new(1e-14).with_max_iterations(1);
    let mut x = DVector::from_element(2, 10.0);
    let mut solver = NewtonSolver::new(cubic(), settings);
    let err = solver.solve(&mut x).unwrap_err();

    assert!(matches!(err, NewtonError::MaximumIterationsReached(1)));
    assert_eq!(solver.state(), NewtonState::Diverged);
}

#[test]
fn newton_reports_linear_solve_failure() {
    let settings = NewtonSettings::new(1e-14).with_max_iterations(10);
    let mut x = DVector::from_element(2, 10.0);
    let function = Cubic {
        synchronized: Vec::new(),
        fail_linear_solve: true,
    };
    let err = newton(function, &mut x, settings).unwrap_err();
    assert!(matches!(err, NewtonError::JacobianError(_)));
}

#[test]
fn newton_reports_non_finite_residual() {
    let settings = NewtonSettings::new(1e-14).with_max_iterations(10);
    let mut x = DVector::from_element(2, f64::NAN);
    let err = newton(cubic(), &mut x, settings).unwrap_err();
    assert!(matches!(err, NewtonError::NonFiniteResidual { iteration: 0 }));
}

#[test]
fn newton_relative_tolerance_terminates_early() {
    let absolute_only = NewtonSettings::new(1e-12).with_max_iterations(50);
    let relative = absolute_only.with_relative_tolerance(1e-2);

    let mut x_abs = DVector::from_element(2, 5.0);
    let mut x_rel = DVector::from_element(2, 5.0);
    let out_abs = newton(cubic(), &mut x_abs, absolute_only).unwrap();
    let out_rel = newton(cubic(), &mut x_rel, relative).unwrap();

    assert!(out_rel.iterations < out_abs.iterations);
    assert!(out_rel.residual_norm <= 1e-2 * out_rel.initial_residual_norm);
}
