//! Metadynamics bias accumulator.
//!
//! Maintains the append-only history of Gaussian hills deposited along the
//! reaction coordinate and evaluates the cumulative bias potential and force
//! at any coordinate value. `bias_energy` and `bias_force` are pure
//! functions of (s, history-so-far): same history and same s give
//! bit-identical results.

/// A single deposited Gaussian hill. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Hill {
    /// Reaction-coordinate value at deposition
    pub center: f64,
    /// Gaussian amplitude
    pub height: f64,
    /// Gaussian width (standard deviation)
    pub width: f64,
    /// Integrator step at which the hill was deposited
    pub step: usize,
}

/// History-dependent bias along a scalar reaction coordinate.
///
/// Hills are deposited at a fixed stride with constant height, or, in the
/// well-tempered variant, with a height damped by the bias already present
/// at the deposition point.
pub struct MetaDynamics {
    hills: Vec<Hill>,
    initial_height: f64,
    width: f64,
    stride: usize,
    /// Well-tempered bias temperature dT; `None` selects constant-height
    /// deposition.
    bias_temperature: Option<f64>,
    k_b: f64,
}

impl MetaDynamics {
    pub fn new(
        initial_height: f64,
        width: f64,
        stride: usize,
        bias_temperature: Option<f64>,
        k_b: f64,
    ) -> Self {
        MetaDynamics {
            hills: Vec::new(),
            initial_height,
            width,
            stride,
            bias_temperature,
            k_b,
        }
    }

    /// Cumulative bias potential at coordinate `s`. O(hills deposited).
    pub fn bias_energy(&self, s: f64) -> f64 {
        self.hills
            .iter()
            .map(|hill| {
                let ds = s - hill.center;
                hill.height * (-ds * ds / (2.0 * hill.width * hill.width)).exp()
            })
            .sum()
    }

    /// Bias force -dV_bias/ds at coordinate `s`, in closed form.
    pub fn bias_force(&self, s: f64) -> f64 {
        self.hills
            .iter()
            .map(|hill| {
                let ds = s - hill.center;
                let w2 = hill.width * hill.width;
                hill.height * ds / w2 * (-ds * ds / (2.0 * w2)).exp()
            })
            .sum()
    }

    /// Appends a hill centered at `s`. In the well-tempered variant the
    /// height is damped by exp(-V_bias(s) / (k_B dT)), so later hills in an
    /// already-filled basin are progressively smaller.
    pub fn deposit(&mut self, s: f64, step: usize) {
        let height = match self.bias_temperature {
            Some(delta_t) => {
                self.initial_height * (-self.bias_energy(s) / (self.k_b * delta_t)).exp()
            }
            None => self.initial_height,
        };
        self.hills.push(Hill {
            center: s,
            height,
            width: self.width,
            step,
        });
    }

    /// Whether `step` falls on the deposition stride. A stride of zero is
    /// never due.
    pub fn due(&self, step: usize) -> bool {
        self.stride != 0 && step % self.stride == 0
    }

    /// Deposited hills in deposition order.
    pub fn hills(&self) -> &[Hill] {
        &self.hills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_history_is_unbiased() {
        let bias = MetaDynamics::new(0.1, 0.2, 500, None, 1.0);
        assert_eq!(bias.bias_energy(0.3), 0.0);
        assert_eq!(bias.bias_force(0.3), 0.0);
    }

    #[test]
    fn single_hill_profile() {
        let mut bias = MetaDynamics::new(0.5, 0.2, 1, None, 1.0);
        bias.deposit(-1.0, 0);

        // full height at the center, zero slope
        assert_relative_eq!(bias.bias_energy(-1.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(bias.bias_force(-1.0), 0.0, epsilon = 1e-12);

        // one width away: h * exp(-1/2)
        let expected = 0.5 * (-0.5f64).exp();
        assert_relative_eq!(bias.bias_energy(-0.8), expected, epsilon = 1e-12);

        // force is the negative derivative of the energy
        let h = 1e-6;
        let grad = (bias.bias_energy(-0.8 + h) - bias.bias_energy(-0.8 - h)) / (2.0 * h);
        assert_relative_eq!(bias.bias_force(-0.8), -grad, epsilon = 1e-6);
    }

    #[test]
    fn zero_stride_is_never_due() {
        let bias = MetaDynamics::new(0.1, 0.2, 0, None, 1.0);
        assert!(!bias.due(0));
        assert!(!bias.due(500));
    }

    #[test]
    fn history_grows_monotonically_in_order() {
        let mut bias = MetaDynamics::new(0.1, 0.2, 500, None, 1.0);
        let centers = [-1.0, -0.9, -0.7, -0.4];
        for (k, &center) in centers.iter().enumerate() {
            bias.deposit(center, k * 500);
        }
        assert_eq!(bias.hills().len(), centers.len());
        for (k, hill) in bias.hills().iter().enumerate() {
            assert_eq!(hill.center, centers[k]);
            assert_eq!(hill.height, 0.1);
            assert_eq!(hill.width, 0.2);
            assert_eq!(hill.step, k * 500);
        }
    }

    #[test]
    fn evaluation_is_pure() {
        let mut bias = MetaDynamics::new(0.1, 0.2, 500, None, 1.0);
        for k in 0..20 {
            bias.deposit(-1.0 + 0.05 * k as f64, k);
        }
        let e1 = bias.bias_energy(0.123);
        let f1 = bias.bias_force(0.123);
        for _ in 0..5 {
            assert_eq!(bias.bias_energy(0.123), e1);
            assert_eq!(bias.bias_force(0.123), f1);
        }
    }

    #[test]
    fn well_tempered_heights_decay() {
        let mut bias = MetaDynamics::new(0.1, 0.2, 1, Some(2.0), 1.0);
        for k in 0..10 {
            bias.deposit(0.0, k);
        }
        let hills = bias.hills();
        assert_eq!(hills[0].height, 0.1);
        for pair in hills.windows(2) {
            assert!(pair[1].height < pair[0].height);
        }
    }

    #[test]
    fn constant_height_ignores_accumulated_bias() {
        let mut bias = MetaDynamics::new(0.1, 0.2, 1, None, 1.0);
        for k in 0..10 {
            bias.deposit(0.0, k);
        }
        assert!(bias.hills().iter().all(|h| h.height == 0.1));
    }
}
