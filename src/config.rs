//! Run configuration: serde tree, validation, and builders.
//!
//! The whole run is described by one immutable `RunConfig` handed to
//! `Simulation::from_config`; there is no process-wide mutable state.
//! Validation happens eagerly, before any integration step runs.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::bias::MetaDynamics;
use crate::error::{MdError, Result};
use crate::potential::{DoubleWell, Harmonic, LennardJones, Potential};
use crate::simulation::{ReactionCoordinate, State};
use crate::thermostat::{kinetic_temperature, Thermostat};

/// Full description of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub system: SystemConfig,
    pub potential: PotentialConfig,
    #[serde(default)]
    pub thermostat: ThermostatConfig,
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub metadynamics: Option<MetadynamicsConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Seed for every stochastic component (Langevin noise,
    /// Maxwell-Boltzmann initialization). Required whenever one is enabled.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Spatial dimensionality (1-3)
    pub dim: usize,
    /// Initial position of each particle, `dim` components apiece
    pub positions: Vec<Vec<f64>>,
    pub velocities: VelocityConfig,
    pub masses: MassConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VelocityConfig {
    Explicit { velocities: Vec<Vec<f64>> },
    /// Seeded Maxwell-Boltzmann draw at the given temperature, with
    /// center-of-mass motion removed and an exact rescale to the target.
    MaxwellBoltzmann { temperature: f64 },
    Zero,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MassConfig {
    /// Single mass shared by all particles
    Uniform(f64),
    /// One mass per particle
    Individual(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PotentialConfig {
    Harmonic {
        k: f64,
        #[serde(default)]
        x0: f64,
    },
    DoubleWell {
        a: f64,
        b: f64,
        #[serde(default)]
        c: f64,
        #[serde(default)]
        d: f64,
    },
    LennardJones {
        epsilon: f64,
        sigma: f64,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThermostatConfig {
    #[default]
    None,
    VelocityRescaling {
        target_temperature: f64,
        coupling_time: f64,
    },
    Langevin {
        target_temperature: f64,
        friction: f64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub time_step: f64,
    pub total_steps: usize,
    /// Boltzmann constant; 1.0 selects reduced units
    #[serde(default = "default_kb")]
    pub k_boltzmann: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadynamicsConfig {
    pub hill_height: f64,
    pub hill_width: f64,
    /// Steps between hill depositions
    pub deposition_stride: usize,
    /// Well-tempered bias temperature; omit for constant-height hills
    #[serde(default)]
    pub bias_temperature: Option<f64>,
    #[serde(default)]
    pub coordinate: ReactionCoordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Steps between recorded trajectory frames
    #[serde(default = "default_sample_interval")]
    pub sample_interval: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            sample_interval: default_sample_interval(),
        }
    }
}

fn default_kb() -> f64 {
    1.0
}

fn default_sample_interval() -> usize {
    1
}

impl RunConfig {
    /// Load a run configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: RunConfig = serde_yml::from_str(&content)?;
        Ok(config)
    }

    /// Save the configuration to a YAML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn n_particles(&self) -> usize {
        self.system.positions.len()
    }

    fn requires_seed(&self) -> bool {
        matches!(self.thermostat, ThermostatConfig::Langevin { .. })
            || matches!(
                self.system.velocities,
                VelocityConfig::MaxwellBoltzmann { .. }
            )
    }

    /// Checks every parameter before the run is assembled.
    pub fn validate(&self) -> Result<()> {
        let n = self.n_particles();
        let dim = self.system.dim;

        if !(1..=3).contains(&dim) {
            return Err(MdError::invalid(format!(
                "dimensionality must be 1, 2, or 3, got {dim}"
            )));
        }
        if n == 0 {
            return Err(MdError::invalid("at least one particle is required"));
        }
        for (i, pos) in self.system.positions.iter().enumerate() {
            if pos.len() != dim {
                return Err(MdError::invalid(format!(
                    "position of particle {i} has {} components, expected {dim}",
                    pos.len()
                )));
            }
        }

        if let VelocityConfig::Explicit { velocities } = &self.system.velocities {
            if velocities.len() != n {
                return Err(MdError::invalid(format!(
                    "{} velocities for {n} particles",
                    velocities.len()
                )));
            }
            for (i, vel) in velocities.iter().enumerate() {
                if vel.len() != dim {
                    return Err(MdError::invalid(format!(
                        "velocity of particle {i} has {} components, expected {dim}",
                        vel.len()
                    )));
                }
            }
        }
        if let VelocityConfig::MaxwellBoltzmann { temperature } = &self.system.velocities {
            if *temperature <= 0.0 {
                return Err(MdError::invalid(
                    "Maxwell-Boltzmann temperature must be positive",
                ));
            }
        }

        match &self.system.masses {
            MassConfig::Uniform(mass) => {
                if *mass <= 0.0 {
                    return Err(MdError::invalid("mass must be positive"));
                }
            }
            MassConfig::Individual(masses) => {
                if masses.len() != n {
                    return Err(MdError::invalid(format!(
                        "{} masses for {n} particles",
                        masses.len()
                    )));
                }
                if masses.iter().any(|&m| m <= 0.0) {
                    return Err(MdError::invalid("all masses must be positive"));
                }
            }
        }

        if self.integration.time_step <= 0.0 || !self.integration.time_step.is_finite() {
            return Err(MdError::invalid("time step must be positive and finite"));
        }
        if self.integration.total_steps == 0 {
            return Err(MdError::invalid("total steps must be positive"));
        }
        if self.integration.k_boltzmann <= 0.0 {
            return Err(MdError::invalid("Boltzmann constant must be positive"));
        }

        match &self.potential {
            PotentialConfig::Harmonic { k, .. } => {
                if *k <= 0.0 {
                    return Err(MdError::invalid("harmonic spring constant must be positive"));
                }
            }
            PotentialConfig::DoubleWell { a, b, .. } => {
                if *a <= 0.0 || *b <= 0.0 {
                    return Err(MdError::invalid(
                        "double-well coefficients a and b must be positive",
                    ));
                }
            }
            PotentialConfig::LennardJones { epsilon, sigma } => {
                if *epsilon <= 0.0 {
                    return Err(MdError::invalid("Lennard-Jones epsilon must be positive"));
                }
                if *sigma <= 0.0 {
                    return Err(MdError::invalid("Lennard-Jones sigma must be positive"));
                }
            }
        }

        match &self.thermostat {
            ThermostatConfig::None => {}
            ThermostatConfig::VelocityRescaling {
                target_temperature,
                coupling_time,
            } => {
                if *target_temperature <= 0.0 {
                    return Err(MdError::invalid("target temperature must be positive"));
                }
                if *coupling_time <= 0.0 {
                    return Err(MdError::invalid("coupling time must be positive"));
                }
            }
            ThermostatConfig::Langevin {
                target_temperature,
                friction,
            } => {
                if *target_temperature <= 0.0 {
                    return Err(MdError::invalid("target temperature must be positive"));
                }
                if *friction <= 0.0 {
                    return Err(MdError::invalid("friction coefficient must be positive"));
                }
            }
        }

        if let Some(meta) = &self.metadynamics {
            if meta.hill_height <= 0.0 {
                return Err(MdError::invalid("hill height must be positive"));
            }
            if meta.hill_width <= 0.0 {
                return Err(MdError::invalid("hill width must be positive"));
            }
            if meta.deposition_stride == 0 {
                return Err(MdError::invalid("deposition stride must be positive"));
            }
            if let Some(delta_t) = meta.bias_temperature {
                if delta_t <= 0.0 {
                    return Err(MdError::invalid("bias temperature must be positive"));
                }
            }
            if meta.coordinate.particle >= n {
                return Err(MdError::invalid(format!(
                    "reaction coordinate selects particle {} of {n}",
                    meta.coordinate.particle
                )));
            }
            if meta.coordinate.axis >= dim {
                return Err(MdError::invalid(format!(
                    "reaction coordinate selects axis {} in a {dim}-dimensional run",
                    meta.coordinate.axis
                )));
            }
        }

        if self.output.sample_interval == 0 {
            return Err(MdError::invalid("sample interval must be positive"));
        }

        if self.requires_seed() && self.seed.is_none() {
            return Err(MdError::MissingSeed);
        }

        Ok(())
    }

    /// Builds the initial state (positions, velocities, masses).
    pub fn build_state(&self) -> Result<State> {
        let n = self.n_particles();
        let dim = self.system.dim;

        let positions: Vec<Vector3<f64>> = self
            .system
            .positions
            .iter()
            .map(|coords| padded_vector(coords))
            .collect();
        let masses = match &self.system.masses {
            MassConfig::Uniform(mass) => vec![*mass; n],
            MassConfig::Individual(masses) => masses.clone(),
        };
        let velocities = self.build_velocities(n, dim, &masses)?;

        Ok(State::new(positions, velocities, masses, dim))
    }

    fn build_velocities(&self, n: usize, dim: usize, masses: &[f64]) -> Result<Vec<Vector3<f64>>> {
        match &self.system.velocities {
            VelocityConfig::Explicit { velocities } => {
                Ok(velocities.iter().map(|comps| padded_vector(comps)).collect())
            }
            VelocityConfig::Zero => Ok(vec![Vector3::zeros(); n]),
            VelocityConfig::MaxwellBoltzmann { temperature } => {
                let seed = self.seed.ok_or(MdError::MissingSeed)?;
                let mut rng = StdRng::seed_from_u64(stream_seed(seed, VELOCITY_STREAM));
                let k_b = self.integration.k_boltzmann;

                let mut velocities: Vec<Vector3<f64>> = masses
                    .iter()
                    .map(|&m| {
                        let scale = (k_b * temperature / m).sqrt();
                        let mut v = Vector3::zeros();
                        for axis in 0..dim {
                            let xi: f64 = rng.sample(StandardNormal);
                            v[axis] = scale * xi;
                        }
                        v
                    })
                    .collect();

                // remove center-of-mass drift, then rescale to the exact
                // target (a single particle keeps its raw draw)
                if n > 1 {
                    let total_mass: f64 = masses.iter().sum();
                    let v_cm: Vector3<f64> = velocities
                        .iter()
                        .zip(masses)
                        .map(|(v, &m)| v * m)
                        .sum::<Vector3<f64>>()
                        / total_mass;
                    for v in &mut velocities {
                        *v -= v_cm;
                    }

                    let current = kinetic_temperature(&velocities, masses, dim, k_b);
                    if current > 0.0 {
                        let factor = (temperature / current).sqrt();
                        for v in &mut velocities {
                            *v *= factor;
                        }
                    }
                }

                Ok(velocities)
            }
        }
    }

    pub fn build_potential(&self) -> Box<dyn Potential> {
        match self.potential {
            PotentialConfig::Harmonic { k, x0 } => Box::new(Harmonic::new(k, x0, self.system.dim)),
            PotentialConfig::DoubleWell { a, b, c, d } => {
                Box::new(DoubleWell::with_asymmetry(a, b, c, d))
            }
            PotentialConfig::LennardJones { epsilon, sigma } => {
                Box::new(LennardJones::new(epsilon, sigma))
            }
        }
    }

    pub fn build_thermostat(&self) -> Result<Thermostat> {
        match self.thermostat {
            ThermostatConfig::None => Ok(Thermostat::None),
            ThermostatConfig::VelocityRescaling {
                target_temperature,
                coupling_time,
            } => Ok(Thermostat::VelocityRescaling {
                target_temp: target_temperature,
                coupling_time,
            }),
            ThermostatConfig::Langevin {
                target_temperature,
                friction,
            } => {
                let seed = self.seed.ok_or(MdError::MissingSeed)?;
                Ok(Thermostat::Langevin {
                    target_temp: target_temperature,
                    friction,
                    rng: StdRng::seed_from_u64(stream_seed(seed, THERMOSTAT_STREAM)),
                })
            }
        }
    }

    pub fn build_bias(&self) -> Option<MetaDynamics> {
        self.metadynamics.as_ref().map(|meta| {
            MetaDynamics::new(
                meta.hill_height,
                meta.hill_width,
                meta.deposition_stride,
                meta.bias_temperature,
                self.integration.k_boltzmann,
            )
        })
    }

    pub fn reaction_coordinate(&self) -> ReactionCoordinate {
        self.metadynamics
            .as_ref()
            .map(|meta| meta.coordinate)
            .unwrap_or_default()
    }
}

/// RNG stream identifiers for the stochastic components. Each component
/// derives its own stream from the single run seed so the Langevin noise
/// never replays the values drawn for the initial velocities.
const VELOCITY_STREAM: u64 = 0;
const THERMOSTAT_STREAM: u64 = 1;

fn stream_seed(seed: u64, stream: u64) -> u64 {
    seed.wrapping_add(stream.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

fn padded_vector(components: &[f64]) -> Vector3<f64> {
    let mut v = Vector3::zeros();
    for (axis, &c) in components.iter().enumerate().take(3) {
        v[axis] = c;
    }
    v
}
