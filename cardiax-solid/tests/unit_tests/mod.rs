use nalgebra::{matrix, Matrix3};

mod fiber;
mod guccione;
mod kinematics;

fn displacement_gradient() -> Matrix3<f64> {
    // Note: this is deliberately chosen so that det(I + H) > 0
    matrix![0.10, -0.05, 0.02;
            0.03,  0.08, -0.04;
           -0.02,  0.06, 0.12]
}
