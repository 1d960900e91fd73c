//! Solver configuration, read once from a JSON document.
//!
//! Every section has defaults, so an empty document `{}` is a valid configuration.
//!
//! ```json
//! {
//!     "material": { "c": 2000.0, "b_f": 8.0 },
//!     "pressure": { "boundary_value": 4.0 },
//!     "boundaries": { "neumann": [0], "dirichlet": [2] },
//!     "linear_solver": { "method": "gmres", "preconditioner": { "type": "ilu0" } }
//! }
//! ```
use crate::error::ConfigError;
use crate::linear_solver::{LinearSolverSettings, PreconditionerKind};
use crate::mesh::BoundaryId;
use cardiax_optimize::newton::NewtonSettings;
use cardiax_solid::fiber::ProlateSpheroid;
use cardiax_solid::guccione::GuccioneParameters;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscretizationConfig {
    /// Polynomial degree of the displacement field. Only linear elements are supported.
    pub polynomial_degree: usize,
    /// Number of in-process ranks that assemble disjoint parts of the mesh.
    pub num_ranks: usize,
}

impl Default for DiscretizationConfig {
    fn default() -> Self {
        Self {
            polynomial_degree: 1,
            num_ranks: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Pressure applied on Neumann boundaries.
    pub boundary_value: f64,
    /// Active tension $T_a$ along the fiber direction.
    pub fiber_value: f64,
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            boundary_value: 4.0,
            fiber_value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundariesConfig {
    pub neumann: Vec<BoundaryId>,
    pub dirichlet: Vec<BoundaryId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonConfig {
    /// Absolute tolerance on the Euclidean norm of the residual.
    pub tolerance: f64,
    pub relative_tolerance: Option<f64>,
    pub increment_tolerance: Option<f64>,
    pub max_iterations: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            relative_tolerance: None,
            increment_tolerance: None,
            max_iterations: 50,
        }
    }
}

impl NewtonConfig {
    pub fn settings(&self) -> NewtonSettings<f64> {
        let mut settings = NewtonSettings::new(self.tolerance).with_max_iterations(self.max_iterations);
        if let Some(tol) = self.relative_tolerance {
            settings = settings.with_relative_tolerance(tol);
        }
        if let Some(tol) = self.increment_tolerance {
            settings = settings.with_increment_tolerance(tol);
        }
        settings
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoissonConfig {
    /// Boundaries where the transmural coordinate is `0`.
    pub endocardium: Vec<BoundaryId>,
    /// Boundaries where the transmural coordinate is `1`.
    pub epicardium: Vec<BoundaryId>,
    /// Constant source term $f$.
    pub source: f64,
    pub linear_solver: LinearSolverSettings,
}

impl Default for PoissonConfig {
    fn default() -> Self {
        Self {
            endocardium: vec![0],
            epicardium: vec![1],
            source: 0.0,
            linear_solver: LinearSolverSettings::symmetric_positive_definite(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discretization: DiscretizationConfig,
    pub material: GuccioneParameters,
    pub pressure: PressureConfig,
    pub boundaries: BoundariesConfig,
    pub newton: NewtonConfig,
    pub linear_solver: LinearSolverSettings,
    pub fiber: ProlateSpheroid,
    pub poisson: PoissonConfig,
}

impl Config {
    /// Parses and validates a configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discretization.polynomial_degree != 1 {
            return Err(ConfigError::invalid(
                "discretization.polynomial_degree",
                format!("only degree 1 is supported, got {}", self.discretization.polynomial_degree),
            ));
        }
        if self.discretization.num_ranks == 0 {
            return Err(ConfigError::invalid("discretization.num_ranks", "need at least one rank"));
        }

        let material = &self.material;
        if !(material.c > 0.0) {
            return Err(ConfigError::invalid("material.c", format!("must be positive, got {}", material.c)));
        }
        for (field, value) in [("material.b_f", material.b_f), ("material.b_t", material.b_t), ("material.b_fs", material.b_fs)] {
            if !(value >= 0.0) {
                return Err(ConfigError::invalid(field, format!("must be non-negative, got {}", value)));
            }
        }
        for (field, value) in [
            ("pressure.boundary_value", self.pressure.boundary_value),
            ("pressure.fiber_value", self.pressure.fiber_value),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::invalid(field, "must be finite"));
            }
        }

        if let Some(&boundary_id) = self
            .boundaries
            .neumann
            .iter()
            .find(|id| self.boundaries.dirichlet.contains(id))
        {
            return Err(ConfigError::OverlappingBoundary { boundary_id });
        }

        let newton = &self.newton;
        check_positive("newton.tolerance", newton.tolerance)?;
        if let Some(tol) = newton.relative_tolerance {
            check_positive("newton.relative_tolerance", tol)?;
        }
        if let Some(tol) = newton.increment_tolerance {
            check_positive("newton.increment_tolerance", tol)?;
        }

        validate_linear_solver("linear_solver", &self.linear_solver)?;
        validate_linear_solver("poisson.linear_solver", &self.poisson.linear_solver)?;

        let fiber = &self.fiber;
        check_positive("fiber.focal_distance", fiber.focal_distance)?;
        if !(fiber.nu_endo > 0.0 && fiber.nu_epi > fiber.nu_endo) {
            return Err(ConfigError::invalid("fiber", "need 0 < nu_endo < nu_epi"));
        }

        Ok(())
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be positive, got {}", value)))
    }
}

fn validate_linear_solver(field: &'static str, settings: &LinearSolverSettings) -> Result<(), ConfigError> {
    check_positive(field, settings.relative_tolerance)?;
    if settings.max_iterations == 0 {
        return Err(ConfigError::invalid(field, "max_iterations must be positive"));
    }
    if settings.restart == 0 {
        return Err(ConfigError::invalid(field, "restart must be positive"));
    }
    if let PreconditionerKind::Ssor { omega } = settings.preconditioner {
        if !(omega > 0.0 && omega < 2.0) {
            return Err(ConfigError::invalid(field, format!("SSOR omega must lie in (0, 2), got {}", omega)));
        }
    }
    Ok(())
}
