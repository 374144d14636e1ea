//! Simulation state and the run loop.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::Result;
use crate::integrate::VelocityVerlet;
use crate::potential::Potential;
use crate::thermostat::{kinetic_energy, kinetic_temperature};

/// Mutable state of the particle system. Positions and velocities are
/// nalgebra vectors; components at index >= `dim` stay zero for 1D/2D runs.
#[derive(Debug, Clone)]
pub struct State {
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub masses: Vec<f64>,
    /// Active spatial dimensions (1-3)
    pub dim: usize,
    /// Completed integration steps
    pub step: usize,
    /// Simulation time; always step * dt
    pub time: f64,
}

impl State {
    pub fn new(
        positions: Vec<Vector3<f64>>,
        velocities: Vec<Vector3<f64>>,
        masses: Vec<f64>,
        dim: usize,
    ) -> Self {
        State {
            positions,
            velocities,
            masses,
            dim,
            step: 0,
            time: 0.0,
        }
    }

    pub fn n_particles(&self) -> usize {
        self.positions.len()
    }

    pub fn kinetic_energy(&self) -> f64 {
        kinetic_energy(&self.velocities, &self.masses)
    }

    pub fn kinetic_temperature(&self, k_b: f64) -> f64 {
        kinetic_temperature(&self.velocities, &self.masses, self.dim, k_b)
    }
}

/// Projection of the configuration onto the scalar reaction coordinate:
/// one axis of one particle. For a 1D single-particle system this is just
/// the particle position.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ReactionCoordinate {
    #[serde(default)]
    pub particle: usize,
    #[serde(default)]
    pub axis: usize,
}

impl ReactionCoordinate {
    pub fn project(&self, state: &State) -> f64 {
        state.positions[self.particle][self.axis]
    }
}

/// One recorded trajectory sample.
#[derive(Debug, Clone)]
pub struct Frame {
    pub step: usize,
    pub time: f64,
    pub positions: Vec<Vector3<f64>>,
    pub velocities: Vec<Vector3<f64>>,
    pub potential_energy: f64,
    pub kinetic_energy: f64,
    pub bias_energy: f64,
}

impl Frame {
    pub fn total_energy(&self) -> f64 {
        self.potential_energy + self.kinetic_energy
    }
}

pub type Trajectory = Vec<Frame>;

/// Orchestrates the full run: repeated Velocity Verlet steps, periodic hill
/// deposition, and trajectory recording. The core performs no file or
/// console output of its own; the caller consumes the returned trajectory.
pub struct Simulation {
    integrator: VelocityVerlet<Box<dyn Potential>>,
    n_steps: usize,
    sample_interval: usize,
}

impl Simulation {
    /// Validates the configuration and assembles the simulation. All
    /// `InvalidConfiguration` and `MissingSeed` failures surface here,
    /// before any step runs.
    pub fn from_config(config: &RunConfig) -> Result<Self> {
        config.validate()?;
        let state = config.build_state()?;
        let potential = config.build_potential();
        let thermostat = config.build_thermostat()?;
        let bias = config.build_bias();
        let coordinate = config.reaction_coordinate();
        let integrator = VelocityVerlet::new(
            state,
            potential,
            bias,
            thermostat,
            coordinate,
            config.integration.time_step,
            config.integration.k_boltzmann,
        )?;
        Ok(Simulation {
            integrator,
            n_steps: config.integration.total_steps,
            sample_interval: config.output.sample_interval,
        })
    }

    pub fn state(&self) -> &State {
        &self.integrator.state
    }

    /// Number of hills deposited so far.
    pub fn hill_count(&self) -> usize {
        self.integrator.bias().map_or(0, |b| b.hills().len())
    }

    /// Runs the fixed number of steps and returns the recorded trajectory.
    /// Aborts on the first numerical instability; there is no partial-result
    /// recovery.
    pub fn run(&mut self) -> Result<Trajectory> {
        info!(
            particles = self.integrator.state.n_particles(),
            dim = self.integrator.state.dim,
            steps = self.n_steps,
            dt = self.integrator.dt(),
            "starting simulation"
        );

        let mut trajectory = Vec::with_capacity(self.n_steps / self.sample_interval + 1);
        for step in 0..self.n_steps {
            self.integrator.step()?;
            if self.integrator.deposition_due(step) {
                self.integrator.deposit_hill(step);
                debug!(step, s = self.integrator.coordinate(), "deposited hill");
            }
            if step % self.sample_interval == 0 {
                trajectory.push(self.frame());
            }
        }

        info!(
            frames = trajectory.len(),
            hills = self.hill_count(),
            "simulation finished"
        );
        Ok(trajectory)
    }

    fn frame(&self) -> Frame {
        let state = &self.integrator.state;
        Frame {
            step: state.step,
            time: state.time,
            positions: state.positions.clone(),
            velocities: state.velocities.clone(),
            potential_energy: self.integrator.potential_energy(),
            kinetic_energy: state.kinetic_energy(),
            bias_energy: self.integrator.bias_energy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        IntegrationConfig, MassConfig, MetadynamicsConfig, OutputConfig, PotentialConfig,
        RunConfig, SystemConfig, ThermostatConfig, VelocityConfig,
    };
    use crate::error::MdError;
    use approx::assert_relative_eq;

    fn harmonic_nve_config(dt: f64, steps: usize) -> RunConfig {
        RunConfig {
            system: SystemConfig {
                dim: 1,
                positions: vec![vec![1.5]],
                velocities: VelocityConfig::Explicit {
                    velocities: vec![vec![0.2]],
                },
                masses: MassConfig::Uniform(1.0),
            },
            potential: PotentialConfig::Harmonic { k: 1.0, x0: 0.0 },
            thermostat: ThermostatConfig::None,
            integration: IntegrationConfig {
                time_step: dt,
                total_steps: steps,
                k_boltzmann: 1.0,
            },
            metadynamics: None,
            output: OutputConfig::default(),
            seed: None,
        }
    }

    fn max_relative_energy_drift(trajectory: &Trajectory) -> f64 {
        let e0 = trajectory[0].total_energy();
        trajectory
            .iter()
            .map(|frame| ((frame.total_energy() - e0) / e0).abs())
            .fold(0.0, f64::max)
    }

    #[test]
    fn nve_harmonic_conserves_energy() {
        let config = harmonic_nve_config(0.002, 10_000);
        let trajectory = Simulation::from_config(&config).unwrap().run().unwrap();
        assert!(max_relative_energy_drift(&trajectory) < 1e-3);
    }

    #[test]
    fn energy_drift_scales_quadratically_with_dt() {
        let coarse = Simulation::from_config(&harmonic_nve_config(0.02, 5_000))
            .unwrap()
            .run()
            .unwrap();
        let fine = Simulation::from_config(&harmonic_nve_config(0.01, 10_000))
            .unwrap()
            .run()
            .unwrap();
        let ratio = max_relative_energy_drift(&coarse) / max_relative_energy_drift(&fine);
        // halving dt should roughly quarter the drift
        assert!(ratio > 2.0 && ratio < 8.0, "drift ratio {}", ratio);
    }

    #[test]
    fn trajectory_time_matches_step_index() {
        let config = harmonic_nve_config(0.002, 100);
        let trajectory = Simulation::from_config(&config).unwrap().run().unwrap();
        assert_eq!(trajectory.len(), 100);
        for frame in &trajectory {
            assert_relative_eq!(frame.time, frame.step as f64 * 0.002, epsilon = 1e-12);
        }
    }

    #[test]
    fn sample_interval_thins_the_trajectory() {
        let mut config = harmonic_nve_config(0.002, 100);
        config.output.sample_interval = 10;
        let trajectory = Simulation::from_config(&config).unwrap().run().unwrap();
        assert_eq!(trajectory.len(), 10);
    }

    fn langevin_double_well_config(seed: Option<u64>) -> RunConfig {
        RunConfig {
            system: SystemConfig {
                dim: 1,
                positions: vec![vec![-1.0]],
                velocities: VelocityConfig::Zero,
                masses: MassConfig::Uniform(1.0),
            },
            potential: PotentialConfig::DoubleWell {
                a: 1.0,
                b: 2.0,
                c: 0.0,
                d: 0.0,
            },
            thermostat: ThermostatConfig::Langevin {
                target_temperature: 0.5,
                friction: 1.0,
            },
            integration: IntegrationConfig {
                time_step: 0.005,
                total_steps: 2_000,
                k_boltzmann: 1.0,
            },
            metadynamics: None,
            output: OutputConfig::default(),
            seed,
        }
    }

    #[test]
    fn seeded_langevin_runs_are_bit_identical() {
        let config = langevin_double_well_config(Some(42));
        let a = Simulation::from_config(&config).unwrap().run().unwrap();
        let b = Simulation::from_config(&config).unwrap().run().unwrap();
        assert_eq!(a.len(), b.len());
        for (fa, fb) in a.iter().zip(&b) {
            assert_eq!(fa.positions, fb.positions);
            assert_eq!(fa.velocities, fb.velocities);
        }
    }

    #[test]
    fn langevin_without_seed_is_rejected() {
        let config = langevin_double_well_config(None);
        assert!(matches!(
            Simulation::from_config(&config),
            Err(MdError::MissingSeed)
        ));
    }

    #[test]
    fn metadynamics_deposits_expected_hill_count() {
        let mut config = harmonic_nve_config(0.002, 1_000);
        config.metadynamics = Some(MetadynamicsConfig {
            hill_height: 0.05,
            hill_width: 0.1,
            deposition_stride: 100,
            bias_temperature: None,
            coordinate: ReactionCoordinate::default(),
        });
        let mut simulation = Simulation::from_config(&config).unwrap();
        simulation.run().unwrap();
        // deposits at steps 0, 100, ..., 900
        assert_eq!(simulation.hill_count(), 10);
    }

    #[test]
    fn velocity_rescaling_reaches_target_temperature() {
        // 8 particles in 3D give enough degrees of freedom for the
        // time-averaged kinetic temperature to settle close to the target
        let config = RunConfig {
            system: SystemConfig {
                dim: 3,
                positions: (0..8)
                    .map(|i| {
                        vec![
                            (i % 2) as f64 * 0.8,
                            ((i / 2) % 2) as f64 * 0.8,
                            (i / 4) as f64 * 0.8,
                        ]
                    })
                    .collect(),
                velocities: VelocityConfig::MaxwellBoltzmann { temperature: 0.4 },
                masses: MassConfig::Uniform(1.0),
            },
            potential: PotentialConfig::Harmonic { k: 1.0, x0: 0.0 },
            thermostat: ThermostatConfig::VelocityRescaling {
                target_temperature: 1.0,
                coupling_time: 0.02,
            },
            integration: IntegrationConfig {
                time_step: 0.005,
                total_steps: 40_000,
                k_boltzmann: 1.0,
            },
            metadynamics: None,
            output: OutputConfig::default(),
            seed: Some(7),
        };
        let trajectory = Simulation::from_config(&config).unwrap().run().unwrap();
        let tail = &trajectory[10_000..];
        let dof = 8.0 * 3.0;
        let mean_temp = tail
            .iter()
            .map(|frame| 2.0 * frame.kinetic_energy / dof)
            .sum::<f64>()
            / tail.len() as f64;
        assert!(
            (mean_temp - 1.0).abs() < 0.05,
            "mean temperature {}",
            mean_temp
        );
    }

    fn double_well_escape_config() -> RunConfig {
        // V = x^4 - 2 x^2 (barrier height 1), starting in the left minimum
        // with a small kick: KE = 0.005, far below the barrier, so only the
        // accumulated bias can produce a crossing. Starting exactly at rest
        // at the minimum would pin the dynamics forever: the well force is
        // zero there and every hill deposited at s = -1 exerts zero force
        // at its own center.
        RunConfig {
            system: SystemConfig {
                dim: 1,
                positions: vec![vec![-1.0]],
                velocities: VelocityConfig::Explicit {
                    velocities: vec![vec![0.1]],
                },
                masses: MassConfig::Uniform(1.0),
            },
            potential: PotentialConfig::DoubleWell {
                a: 1.0,
                b: 2.0,
                c: 0.0,
                d: 0.0,
            },
            thermostat: ThermostatConfig::None,
            integration: IntegrationConfig {
                time_step: 0.005,
                total_steps: 200_000,
                k_boltzmann: 1.0,
            },
            metadynamics: Some(MetadynamicsConfig {
                hill_height: 0.1,
                hill_width: 0.2,
                deposition_stride: 500,
                bias_temperature: None,
                coordinate: ReactionCoordinate::default(),
            }),
            output: OutputConfig::default(),
            seed: None,
        }
    }

    #[test]
    fn metadynamics_drives_double_well_escape() {
        // hills of 0.1 every 500 steps must push the particle across x = 0
        let config = double_well_escape_config();
        let trajectory = Simulation::from_config(&config).unwrap().run().unwrap();
        let crossed = trajectory.iter().any(|frame| frame.positions[0].x > 0.0);
        assert!(crossed, "particle never crossed the barrier");
    }

    #[test]
    fn double_well_stays_trapped_without_bias() {
        // the same sub-barrier kick alone cannot cross: only the bias can
        let mut config = double_well_escape_config();
        config.metadynamics = None;
        let trajectory = Simulation::from_config(&config).unwrap().run().unwrap();
        assert!(trajectory.iter().all(|frame| frame.positions[0].x < 0.0));
    }
}
