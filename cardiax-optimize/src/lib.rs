/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Newton's method as an explicit state machine
pub mod newton;
