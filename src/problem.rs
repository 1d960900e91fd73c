//! Concrete cardiac mechanics problems.
//!
//! A problem decides which boundaries are loaded and which are clamped, and provides the
//! material, the pressure and optionally a fiber field, all as functions of the load factor.
use crate::boundary::{homogeneous_dirichlet, BoundaryClassification, DirichletFunction};
use crate::config::Config;
use crate::error::BoundaryError;
use crate::mesh::procedural::{LV_BASE, LV_ENDOCARDIUM};
use crate::mesh::BoundaryId;
use cardiax_solid::active::ActiveFiberStress;
use cardiax_solid::fiber::{FiberField, ProlateSpheroid};
use cardiax_solid::guccione::GuccioneMaterial;
use cardiax_solid::StressLaw;
use nalgebra::Point3;

pub trait CardiacProblem: Send + Sync {
    type Material: StressLaw + Sync;

    /// Classifies the boundary ids of the problem as Neumann or Dirichlet boundaries.
    ///
    /// Ids that are left unclassified are traction-free.
    fn initialise_boundaries_tag(&self, classification: &mut BoundaryClassification) -> Result<(), BoundaryError>;

    /// The material at the given load factor in `[0, 1]`.
    fn material(&self, load_factor: f64) -> Self::Material;

    /// Pressure acting on the Neumann boundaries at a point of the reference configuration.
    fn pressure(&self, x: &Point3<f64>, load_factor: f64) -> f64;

    /// A fiber field, if the material needs fiber directions. The transmural coordinate it is
    /// evaluated with comes from an auxiliary diffusion solve.
    fn fiber_field(&self) -> Option<&(dyn FiberField + Sync)> {
        None
    }
}

/// Idealized left ventricle with fibers from a prolate spheroidal rule, loaded by an
/// endocardial pressure and an active fiber tension.
#[derive(Debug, Clone, PartialEq)]
pub struct IdealizedLvFiber {
    material: GuccioneMaterial,
    fiber: ProlateSpheroid,
    pressure: f64,
    tension: f64,
    neumann: Vec<BoundaryId>,
    dirichlet: Vec<BoundaryId>,
}

impl IdealizedLvFiber {
    /// Boundaries not listed in the configuration default to the endocardium for the pressure
    /// and the base for the clamp.
    pub fn from_config(config: &Config) -> Self {
        let neumann = if config.boundaries.neumann.is_empty() {
            vec![LV_ENDOCARDIUM]
        } else {
            config.boundaries.neumann.clone()
        };
        let dirichlet = if config.boundaries.dirichlet.is_empty() {
            vec![LV_BASE]
        } else {
            config.boundaries.dirichlet.clone()
        };
        Self {
            material: config.material.into(),
            fiber: config.fiber,
            pressure: config.pressure.boundary_value,
            tension: config.pressure.fiber_value,
            neumann,
            dirichlet,
        }
    }

    pub fn fiber(&self) -> &ProlateSpheroid {
        &self.fiber
    }
}

impl CardiacProblem for IdealizedLvFiber {
    type Material = ActiveFiberStress<GuccioneMaterial>;

    fn initialise_boundaries_tag(&self, classification: &mut BoundaryClassification) -> Result<(), BoundaryError> {
        for &id in &self.neumann {
            classification.add_neumann(id)?;
        }
        for &id in &self.dirichlet {
            classification.add_dirichlet(id, homogeneous_dirichlet())?;
        }
        Ok(())
    }

    fn material(&self, load_factor: f64) -> Self::Material {
        ActiveFiberStress::new(self.material, self.tension * load_factor)
    }

    fn pressure(&self, _x: &Point3<f64>, load_factor: f64) -> f64 {
        self.pressure * load_factor
    }

    fn fiber_field(&self) -> Option<&(dyn FiberField + Sync)> {
        Some(&self.fiber)
    }
}

/// A block of tissue with a constant pressure on its Neumann boundaries and prescribed
/// displacements on its Dirichlet boundaries. No fiber field is used.
#[derive(Clone)]
pub struct BoxProblem<M = GuccioneMaterial> {
    material: M,
    pressure: f64,
    neumann: Vec<BoundaryId>,
    dirichlet: Vec<(BoundaryId, DirichletFunction)>,
}

impl<M: std::fmt::Debug> std::fmt::Debug for BoxProblem<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxProblem")
            .field("material", &self.material)
            .field("pressure", &self.pressure)
            .field("neumann", &self.neumann)
            .field(
                "dirichlet",
                &self.dirichlet.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<M> BoxProblem<M> {
    pub fn new(material: M) -> Self {
        Self {
            material,
            pressure: 0.0,
            neumann: Vec::new(),
            dirichlet: Vec::new(),
        }
    }

    pub fn with_pressure(self, pressure: f64) -> Self {
        Self { pressure, ..self }
    }

    pub fn with_neumann(mut self, boundary_id: BoundaryId) -> Self {
        self.neumann.push(boundary_id);
        self
    }

    pub fn with_dirichlet(mut self, boundary_id: BoundaryId, function: DirichletFunction) -> Self {
        self.dirichlet.push((boundary_id, function));
        self
    }
}

impl BoxProblem<GuccioneMaterial> {
    /// Passive material, pressure and boundaries from the configuration. Dirichlet boundaries
    /// are clamped.
    pub fn from_config(config: &Config) -> Self {
        let mut problem = Self::new(config.material.into()).with_pressure(config.pressure.boundary_value);
        for &id in &config.boundaries.neumann {
            problem = problem.with_neumann(id);
        }
        for &id in &config.boundaries.dirichlet {
            problem = problem.with_dirichlet(id, homogeneous_dirichlet());
        }
        problem
    }
}

impl<M> CardiacProblem for BoxProblem<M>
where
    M: StressLaw + Clone + Send + Sync,
{
    type Material = M;

    fn initialise_boundaries_tag(&self, classification: &mut BoundaryClassification) -> Result<(), BoundaryError> {
        for &id in &self.neumann {
            classification.add_neumann(id)?;
        }
        for (id, function) in &self.dirichlet {
            classification.add_dirichlet(*id, function.clone())?;
        }
        Ok(())
    }

    fn material(&self, _load_factor: f64) -> M {
        self.material.clone()
    }

    fn pressure(&self, _x: &Point3<f64>, load_factor: f64) -> f64 {
        self.pressure * load_factor
    }
}
