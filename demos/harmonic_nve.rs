// NVE harmonic oscillator
//
// Runs a single particle in a harmonic well without a thermostat and prints
// the relative energy drift, the primary correctness check for Velocity
// Verlet: the drift stays bounded and scales as O(dt^2).

use metadyn::{
    IntegrationConfig, MassConfig, OutputConfig, PotentialConfig, RunConfig, Simulation,
    SystemConfig, ThermostatConfig, VelocityConfig,
};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    for &dt in &[0.004, 0.002, 0.001] {
        let config = RunConfig {
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
                total_steps: (20.0 / dt) as usize,
                k_boltzmann: 1.0,
            },
            metadynamics: None,
            output: OutputConfig::default(),
            seed: None,
        };

        let trajectory = Simulation::from_config(&config)?.run()?;
        let e0 = trajectory[0].total_energy();
        let max_drift = trajectory
            .iter()
            .map(|frame| ((frame.total_energy() - e0) / e0).abs())
            .fold(0.0, f64::max);
        println!("dt = {:.4}: max relative energy drift = {:.3e}", dt, max_drift);
    }

    Ok(())
}
