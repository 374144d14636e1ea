//! Velocity Verlet integration.

use itertools::izip;
use nalgebra::Vector3;

use crate::bias::MetaDynamics;
use crate::error::{MdError, Result};
use crate::potential::Potential;
use crate::simulation::{ReactionCoordinate, State};
use crate::thermostat::Thermostat;

/// Velocity Verlet stepper.
///
/// Owns the mutable simulation state together with the force contributors
/// (potential, optional metadynamics bias, thermostat) and advances them one
/// fixed time step at a time. Forces at the current state are cached between
/// steps, so each configuration is evaluated exactly once.
pub struct VelocityVerlet<P: Potential> {
    pub state: State,
    potential: P,
    bias: Option<MetaDynamics>,
    thermostat: Thermostat,
    coordinate: ReactionCoordinate,
    forces: Vec<Vector3<f64>>,
    potential_energy: f64,
    inv_masses: Vec<f64>,
    dt: f64,
    k_b: f64,
}

impl<P: Potential> VelocityVerlet<P> {
    /// Builds the integrator and evaluates the initial forces. A non-finite
    /// initial energy or force (e.g. overlapping Lennard-Jones particles in
    /// the starting configuration) is rejected here, before any step runs.
    pub fn new(
        state: State,
        potential: P,
        bias: Option<MetaDynamics>,
        thermostat: Thermostat,
        coordinate: ReactionCoordinate,
        dt: f64,
        k_b: f64,
    ) -> Result<Self> {
        let inv_masses = state.masses.iter().map(|&m| 1.0 / m).collect();
        let mut integrator = VelocityVerlet {
            state,
            potential,
            bias,
            thermostat,
            coordinate,
            forces: Vec::new(),
            potential_energy: 0.0,
            inv_masses,
            dt,
            k_b,
        };
        integrator.refresh_forces();
        if !integrator.potential_energy.is_finite() || !all_finite(&integrator.forces) {
            return Err(MdError::invalid(
                "initial configuration produces a non-finite energy or force",
            ));
        }
        Ok(integrator)
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Current value of the reaction coordinate.
    pub fn coordinate(&self) -> f64 {
        self.coordinate.project(&self.state)
    }

    /// Potential energy at the current state (cached from the last force
    /// evaluation).
    pub fn potential_energy(&self) -> f64 {
        self.potential_energy
    }

    /// Bias energy at the current reaction-coordinate value; 0 when
    /// metadynamics is disabled.
    pub fn bias_energy(&self) -> f64 {
        match &self.bias {
            Some(bias) => bias.bias_energy(self.coordinate()),
            None => 0.0,
        }
    }

    pub fn bias(&self) -> Option<&MetaDynamics> {
        self.bias.as_ref()
    }

    /// Whether the bias accumulator is enabled and due to deposit at `step`.
    pub fn deposition_due(&self, step: usize) -> bool {
        self.bias.as_ref().is_some_and(|bias| bias.due(step))
    }

    /// Deposits a hill at the current coordinate value.
    pub fn deposit_hill(&mut self, step: usize) {
        let s = self.coordinate();
        if let Some(bias) = &mut self.bias {
            bias.deposit(s, step);
        }
    }

    /// Advances the state by one time step:
    /// half-kick, drift, force recomputation, half-kick, then deterministic
    /// thermostat rescaling. Any non-finite value produced by the step
    /// aborts with the entry step index and the state before the step.
    pub fn step(&mut self) -> Result<()> {
        let entry_step = self.state.step;
        let snapshot = self.state.clone();
        let half_dt = 0.5 * self.dt;

        // v(t + dt/2) = v(t) + F(t)/(2m) dt
        for (v, f, &inv_m) in izip!(&mut self.state.velocities, &self.forces, &self.inv_masses) {
            *v += f * (inv_m * half_dt);
        }

        // x(t + dt) = x(t) + v(t + dt/2) dt
        for (x, v) in izip!(&mut self.state.positions, &self.state.velocities) {
            *x += v * self.dt;
        }

        // F(t + dt)
        self.refresh_forces();

        // v(t + dt) = v(t + dt/2) + F(t + dt)/(2m) dt
        for (v, f, &inv_m) in izip!(&mut self.state.velocities, &self.forces, &self.inv_masses) {
            *v += f * (inv_m * half_dt);
        }

        self.thermostat.rescale(
            &mut self.state.velocities,
            &self.state.masses,
            self.state.dim,
            self.dt,
            self.k_b,
        );

        self.state.step += 1;
        self.state.time = self.state.step as f64 * self.dt;

        self.check_finite(entry_step, snapshot)
    }

    /// Recomputes the cached forces and potential energy at the current
    /// state: potential forces, plus the bias force on the projected
    /// coordinate, plus the stochastic thermostat contribution.
    fn refresh_forces(&mut self) {
        self.potential_energy = self.potential.energy(&self.state.positions);
        let mut forces = self.potential.forces(&self.state.positions);
        if let Some(bias) = &self.bias {
            let s = self.coordinate.project(&self.state);
            forces[self.coordinate.particle][self.coordinate.axis] += bias.bias_force(s);
        }
        if let Some(adjustment) = self.thermostat.force_adjustment(
            &self.state.velocities,
            self.state.dim,
            self.dt,
            self.k_b,
        ) {
            for (f, adj) in izip!(&mut forces, adjustment) {
                *f += adj;
            }
        }
        self.forces = forces;
    }

    fn check_finite(&self, step: usize, snapshot: State) -> Result<()> {
        let detail = if !all_finite(&self.state.positions) {
            "non-finite position"
        } else if !all_finite(&self.state.velocities) {
            "non-finite velocity"
        } else if !all_finite(&self.forces) {
            "non-finite force"
        } else if !self.potential_energy.is_finite() {
            "non-finite potential energy"
        } else {
            return Ok(());
        };
        Err(MdError::NumericalInstability {
            step,
            detail: detail.to_string(),
            last_state: Box::new(snapshot),
        })
    }
}

fn all_finite(vectors: &[Vector3<f64>]) -> bool {
    vectors.iter().all(|v| v.iter().all(|c| c.is_finite()))
}
