//! Command-line front end: loads a YAML run configuration, runs the
//! simulation, and writes the trajectory as CSV. All file output lives
//! here; the engine itself only returns data.

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::info;

use metadyn::{RunConfig, Simulation, Trajectory};

/// Molecular dynamics with optional metadynamics biasing
#[derive(Parser, Debug)]
#[command(name = "metadyn")]
#[command(about = "Runs an MD simulation described by a YAML configuration", long_about = None)]
struct Args {
    /// Path to the YAML run configuration
    #[arg(short, long)]
    config: String,

    /// Trajectory CSV output path
    #[arg(short, long, default_value = "trajectory.csv")]
    output: String,

    /// Log deposition and progress events
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("reading configuration from {}", args.config);
    let config = RunConfig::from_file(&args.config)
        .wrap_err_with(|| format!("unable to load configuration from {}", args.config))?;

    let mut simulation = Simulation::from_config(&config).wrap_err("invalid run configuration")?;
    let trajectory = simulation.run().wrap_err("simulation aborted")?;

    write_trajectory(&trajectory, &args.output)
        .wrap_err_with(|| format!("unable to write trajectory to {}", args.output))?;
    info!(
        frames = trajectory.len(),
        hills = simulation.hill_count(),
        "trajectory written to {}",
        args.output
    );

    if let Some(last) = trajectory.last() {
        info!(
            time = last.time,
            potential = last.potential_energy,
            kinetic = last.kinetic_energy,
            bias = last.bias_energy,
            "final state"
        );
    }

    Ok(())
}

fn write_trajectory(trajectory: &Trajectory, path: &str) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(
        writer,
        "step,time,potential_energy,kinetic_energy,total_energy,bias_energy,position,velocity"
    )?;
    for frame in trajectory {
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            frame.step,
            frame.time,
            frame.potential_energy,
            frame.kinetic_energy,
            frame.total_energy(),
            frame.bias_energy,
            frame.positions[0].x,
            frame.velocities[0].x,
        )?;
    }
    writer.flush()
}
