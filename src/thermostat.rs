//! Temperature control for NVT runs.

use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Heat-bath coupling applied by the integrator. `None` leaves the dynamics
/// microcanonical (NVE).
pub enum Thermostat {
    None,
    /// Weak-coupling (Berendsen-style) relaxation toward `target_temp`:
    /// after each full step, velocities are rescaled by
    /// sqrt(1 + (dt/coupling_time) (target_temp/T_inst - 1)).
    VelocityRescaling { target_temp: f64, coupling_time: f64 },
    /// Langevin dynamics: friction drag plus a stochastic kick folded into
    /// the force at every evaluation. The noise stream is seeded once at
    /// construction; the same seed reproduces the same trajectory.
    Langevin {
        target_temp: f64,
        friction: f64,
        rng: StdRng,
    },
}

impl Thermostat {
    pub fn is_stochastic(&self) -> bool {
        matches!(self, Thermostat::Langevin { .. })
    }

    /// Per-particle force adjustment for stochastic thermostats, applied at
    /// every force evaluation. For Langevin this is -gamma v plus a normal
    /// random force with per-degree-of-freedom variance
    /// 2 gamma k_B T / dt. Returns `None` for the deterministic variants.
    pub fn force_adjustment(
        &mut self,
        velocities: &[Vector3<f64>],
        dim: usize,
        dt: f64,
        k_b: f64,
    ) -> Option<Vec<Vector3<f64>>> {
        match self {
            Thermostat::Langevin {
                target_temp,
                friction,
                rng,
            } => {
                let noise_scale = (2.0 * *friction * k_b * *target_temp / dt).sqrt();
                let adjustments = velocities
                    .iter()
                    .map(|v| {
                        let mut f = Vector3::zeros();
                        for axis in 0..dim {
                            let xi: f64 = rng.sample(StandardNormal);
                            f[axis] = -*friction * v[axis] + noise_scale * xi;
                        }
                        f
                    })
                    .collect();
                Some(adjustments)
            }
            _ => None,
        }
    }

    /// Deterministic velocity rescaling applied after the second half-kick.
    /// Skipped when the instantaneous temperature is zero (nothing to
    /// rescale).
    pub fn rescale(
        &self,
        velocities: &mut [Vector3<f64>],
        masses: &[f64],
        dim: usize,
        dt: f64,
        k_b: f64,
    ) {
        if let Thermostat::VelocityRescaling {
            target_temp,
            coupling_time,
        } = self
        {
            let t_inst = kinetic_temperature(velocities, masses, dim, k_b);
            if t_inst <= 0.0 {
                return;
            }
            let factor = (1.0 + dt / coupling_time * (target_temp / t_inst - 1.0)).sqrt();
            for v in velocities.iter_mut() {
                *v *= factor;
            }
        }
    }
}

pub fn kinetic_energy(velocities: &[Vector3<f64>], masses: &[f64]) -> f64 {
    velocities
        .iter()
        .zip(masses)
        .map(|(v, &m)| 0.5 * m * v.dot(v))
        .sum()
}

/// Instantaneous kinetic temperature T = 2 KE / (dof k_B) with
/// dof = n_particles * dim.
pub fn kinetic_temperature(
    velocities: &[Vector3<f64>],
    masses: &[f64],
    dim: usize,
    k_b: f64,
) -> f64 {
    let dof = velocities.len() * dim;
    2.0 * kinetic_energy(velocities, masses) / (dof as f64 * k_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn kinetic_temperature_of_known_velocities() {
        // one particle, 1D, m = 2, v = 3: KE = 9, T = 2*9 / (1*1) = 18
        let velocities = vec![Vector3::new(3.0, 0.0, 0.0)];
        let masses = vec![2.0];
        assert_relative_eq!(
            kinetic_temperature(&velocities, &masses, 1, 1.0),
            18.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn none_makes_no_adjustment() {
        let mut thermostat = Thermostat::None;
        let velocities = vec![Vector3::new(1.0, 0.0, 0.0)];
        assert!(thermostat
            .force_adjustment(&velocities, 1, 0.01, 1.0)
            .is_none());
    }

    #[test]
    fn rescaling_moves_temperature_toward_target() {
        let thermostat = Thermostat::VelocityRescaling {
            target_temp: 1.0,
            coupling_time: 0.1,
        };
        let masses = vec![1.0];
        let mut velocities = vec![Vector3::new(3.0, 0.0, 0.0)]; // T_inst = 9
        let before = kinetic_temperature(&velocities, &masses, 1, 1.0);
        thermostat.rescale(&mut velocities, &masses, 1, 0.01, 1.0);
        let after = kinetic_temperature(&velocities, &masses, 1, 1.0);
        assert!(after < before);
        assert!(after > 1.0);
    }

    #[test]
    fn rescaling_skips_frozen_system() {
        let thermostat = Thermostat::VelocityRescaling {
            target_temp: 1.0,
            coupling_time: 0.1,
        };
        let masses = vec![1.0];
        let mut velocities = vec![Vector3::zeros()];
        thermostat.rescale(&mut velocities, &masses, 1, 0.01, 1.0);
        assert_eq!(velocities[0], Vector3::zeros());
    }

    #[test]
    fn langevin_noise_is_reproducible() {
        let velocities = vec![Vector3::new(0.5, 0.0, 0.0); 4];
        let mut a = Thermostat::Langevin {
            target_temp: 1.0,
            friction: 2.0,
            rng: StdRng::seed_from_u64(42),
        };
        let mut b = Thermostat::Langevin {
            target_temp: 1.0,
            friction: 2.0,
            rng: StdRng::seed_from_u64(42),
        };
        let fa = a.force_adjustment(&velocities, 1, 0.01, 1.0).unwrap();
        let fb = b.force_adjustment(&velocities, 1, 0.01, 1.0).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn langevin_only_kicks_active_dimensions() {
        let velocities = vec![Vector3::new(0.5, 0.5, 0.5)];
        let mut thermostat = Thermostat::Langevin {
            target_temp: 1.0,
            friction: 2.0,
            rng: StdRng::seed_from_u64(7),
        };
        let f = thermostat
            .force_adjustment(&velocities, 1, 0.01, 1.0)
            .unwrap();
        assert_eq!(f[0].y, 0.0);
        assert_eq!(f[0].z, 0.0);
    }
}
