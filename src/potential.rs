use nalgebra::Vector3;

/// Potential energy surface evaluated over the full particle configuration.
///
/// Implementations are pure: the same positions always yield the same energy
/// and forces, with no side effects.
pub trait Potential {
    /// Total potential energy of the configuration.
    fn energy(&self, positions: &[Vector3<f64>]) -> f64;

    /// Force on each particle (negative gradient of `energy`).
    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>>;
}

impl<P: Potential + ?Sized> Potential for Box<P> {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        (**self).energy(positions)
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        (**self).forces(positions)
    }
}

/// Harmonic well V(x) = 1/2 k (x - x0)^2 applied independently to each
/// active dimension of every particle.
pub struct Harmonic {
    pub k: f64,
    pub x0: f64,
    /// Active spatial dimensions (1-3); components beyond `dim` stay zero.
    pub dim: usize,
}

impl Harmonic {
    pub fn new(k: f64, x0: f64, dim: usize) -> Self {
        Harmonic { k, x0, dim }
    }
}

impl Potential for Harmonic {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        let mut energy = 0.0;
        for pos in positions {
            for axis in 0..self.dim {
                let dx = pos[axis] - self.x0;
                energy += 0.5 * self.k * dx * dx;
            }
        }
        energy
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        positions
            .iter()
            .map(|pos| {
                let mut f = Vector3::zeros();
                for axis in 0..self.dim {
                    f[axis] = -self.k * (pos[axis] - self.x0);
                }
                f
            })
            .collect()
    }
}

/// Double-well potential V(x) = a x^4 - b x^2 + c x + d along the x axis of
/// the first particle. With c = d = 0 and a, b > 0 the wells sit
/// symmetrically at x = +-sqrt(b / 2a); c tilts one well relative to the
/// other. This is the canonical rare-event system for metadynamics.
pub struct DoubleWell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl DoubleWell {
    pub fn new(a: f64, b: f64) -> Self {
        DoubleWell { a, b, c: 0.0, d: 0.0 }
    }

    pub fn with_asymmetry(a: f64, b: f64, c: f64, d: f64) -> Self {
        DoubleWell { a, b, c, d }
    }
}

impl Potential for DoubleWell {
    /// Zero for an empty configuration.
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        let Some(first) = positions.first() else {
            return 0.0;
        };
        let x = first.x;
        self.a * x.powi(4) - self.b * x * x + self.c * x + self.d
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        let Some(first) = positions.first() else {
            return Vec::new();
        };
        let x = first.x;
        let mut forces = vec![Vector3::zeros(); positions.len()];
        forces[0].x = -(4.0 * self.a * x.powi(3) - 2.0 * self.b * x + self.c);
        forces
    }
}

/// Pairwise Lennard-Jones potential, summed over all unordered pairs.
///
/// There is no short-range clamp: overlapping particles (r -> 0) produce
/// non-finite forces, which the run loop surfaces as a numerical-instability
/// failure. Callers choose a time step small enough to keep particles apart.
pub struct LennardJones {
    pub epsilon: f64,
    pub sigma: f64,
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        LennardJones { epsilon, sigma }
    }
}

impl Potential for LennardJones {
    fn energy(&self, positions: &[Vector3<f64>]) -> f64 {
        let n = positions.len();
        let sigma2 = self.sigma * self.sigma;
        let mut energy = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let r2 = (positions[i] - positions[j]).norm_squared();
                let inv_r2 = sigma2 / r2;
                let inv_r6 = inv_r2 * inv_r2 * inv_r2;
                energy += 4.0 * self.epsilon * (inv_r6 * inv_r6 - inv_r6);
            }
        }
        energy
    }

    fn forces(&self, positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
        let n = positions.len();
        let sigma2 = self.sigma * self.sigma;
        let mut forces = vec![Vector3::zeros(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                let rij = positions[i] - positions[j];
                let r2 = rij.norm_squared();
                let inv_r2 = sigma2 / r2;
                let inv_r6 = inv_r2 * inv_r2 * inv_r2;
                let f_mag = 48.0 * self.epsilon * inv_r6 * (inv_r6 - 0.5) / r2;
                let fij = rij * f_mag;
                forces[i] += fij;
                forces[j] -= fij;
            }
        }
        forces
    }
}
