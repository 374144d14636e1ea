// Metadynamics escape from a double well
//
// A particle starts in the left minimum of V = x^4 - 2 x^2 (barrier
// height 1) with a small kick (KE = 0.005, far below the barrier).
// Gaussian hills deposited every 500 steps gradually fill the well until
// the accumulated bias pushes the particle over the barrier; plain NVE
// dynamics with that kick would stay trapped forever. The kick matters:
// exactly at rest at the minimum, both the well force and the force of
// every hill deposited there vanish, and nothing ever moves.

use metadyn::{
    IntegrationConfig, MassConfig, MetadynamicsConfig, OutputConfig, PotentialConfig,
    ReactionCoordinate, RunConfig, Simulation, SystemConfig, ThermostatConfig, VelocityConfig,
};

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config = RunConfig {
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
        output: OutputConfig {
            sample_interval: 10,
        },
        seed: None,
    };

    let mut simulation = Simulation::from_config(&config)?;
    let trajectory = simulation.run()?;

    match trajectory.iter().find(|frame| frame.positions[0].x > 0.0) {
        Some(frame) => println!(
            "crossed the barrier at step {} (t = {:.1}) after {} hills",
            frame.step,
            frame.time,
            simulation.hill_count()
        ),
        None => println!(
            "no crossing within {} steps ({} hills deposited)",
            200_000,
            simulation.hill_count()
        ),
    }

    Ok(())
}
